//! Phase-cancellation spectrogram extraction.
//!
//! Cancels an original recording out of a modified one and renders the
//! residual as a calibrated spectrogram image.

pub mod audio;
pub mod config;
pub mod ensemble;
pub mod mosaic;
pub mod pipeline;
pub mod render;
pub mod spectrogram;
pub mod types;
