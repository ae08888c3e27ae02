pub mod align;
pub mod cancel;
pub mod decoder;
pub mod encoder;
pub mod resample;
