//! Sample-accurate alignment of the puzzlified and unpuzzlified recordings
//!
//! The puzzlified recording defines the reference sample rate. The
//! unpuzzlified one is resampled, gain corrected, then both are zero padded
//! so the requested window is always addressable, including windows that
//! start before the nominal track start.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use super::decoder::decode_audio;
use super::resample::resample;
use crate::types::{AlignedAudioPair, AudioData, TimeWindow, TrackDescriptor};

/// Convert a decibel gain to a linear amplitude factor
pub fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Decode both source recordings for one track
pub fn load_sources(puzzlified: &Path, unpuzzlified: &Path) -> Result<(AudioData, AudioData)> {
    let puzzlified_audio = decode_audio(puzzlified).with_context(|| {
        format!(
            "Failed to load puzzlified audio {}",
            puzzlified.display()
        )
    })?;
    let unpuzzlified_audio = decode_audio(unpuzzlified).with_context(|| {
        format!(
            "Failed to load unpuzzlified audio {}",
            unpuzzlified.display()
        )
    })?;
    Ok((puzzlified_audio, unpuzzlified_audio))
}

#[derive(Debug, Clone, Copy)]
pub struct AudioAligner {
    db_delta: f64,
    window: TimeWindow,
}

impl AudioAligner {
    pub fn new(db_delta: f64, window: TimeWindow) -> Self {
        Self { db_delta, window }
    }

    pub fn for_track(track: &TrackDescriptor) -> Self {
        Self::new(track.db_delta, track.window)
    }

    pub fn align(&self, puzzlified: &AudioData, unpuzzlified: &AudioData) -> Result<AlignedAudioPair> {
        let sample_rate = puzzlified.sample_rate;

        let mut reference = puzzlified.samples.clone();
        let mut original = resample(&unpuzzlified.samples, unpuzzlified.sample_rate, sample_rate)
            .with_context(|| {
                format!(
                    "Failed to resample unpuzzlified audio from {} Hz to {} Hz",
                    unpuzzlified.sample_rate, sample_rate
                )
            })?;

        // Gain must be applied before padding so padded samples stay exactly zero.
        let gain = db_to_amplitude(self.db_delta) as f32;
        if gain != 1.0 {
            original.iter_mut().for_each(|s| *s *= gain);
        }

        let requested_end = self.window.end_sample(sample_rate).max(0) as usize;
        let target_len = reference.len().max(original.len()).max(requested_end);
        pad_tail(&mut reference, target_len);
        pad_tail(&mut original, target_len);

        let mut window = self.window;
        let mut offset = 0.0;
        let start_sample = window.start_sample(sample_rate);
        if start_sample < 0 {
            let lead = start_sample.unsigned_abs() as usize;
            pad_front(&mut reference, lead);
            pad_front(&mut original, lead);
            offset = window.start;
            window = window.shifted(offset);

            // Rounding the shifted end can land one sample past the padded tail.
            let shifted_end = window.end_sample(sample_rate).max(0) as usize;
            let len = reference.len().max(shifted_end);
            pad_tail(&mut reference, len);
            pad_tail(&mut original, len);
        } else if window.start < 0.0 {
            // Rounds to sample 0; nothing to prepend.
            window.start = 0.0;
        }

        debug!(
            sample_rate,
            len = reference.len(),
            offset,
            gain,
            "aligned source recordings"
        );

        Ok(AlignedAudioPair {
            puzzlified: reference,
            unpuzzlified: original,
            sample_rate,
            window,
            offset,
        })
    }
}

fn pad_tail(samples: &mut Vec<f32>, len: usize) {
    if samples.len() < len {
        samples.resize(len, 0.0);
    }
}

fn pad_front(samples: &mut Vec<f32>, count: usize) {
    if count > 0 {
        samples.splice(0..0, std::iter::repeat(0.0).take(count));
    }
}
