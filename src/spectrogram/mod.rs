//! Magnitude spectrogram with perceptual gain shaping
//!
//! Frames start only where a full FFT frame fits (no edge padding). The
//! analysis window is a periodic Blackman of `window_size` samples centred
//! inside each `fft_size` frame.

use std::f32::consts::PI;

use anyhow::{Context, Result};
use ndarray::Array2;
use rand::Rng;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::types::{ExtractedSignal, SpectrogramFrame, StftParams};

/// Gain applied to the DC row
pub const LOW_BIN_GAIN: f32 = 1.0;
/// Gain applied to the Nyquist row
pub const HIGH_BIN_GAIN: f32 = 4.0;
/// Fraction of the global maximum kept before clipping
pub const HEADROOM: f32 = 0.6;
/// Maximum per-parameter deviation used by the averaging mode
pub const PARAM_JITTER: usize = 256;

pub fn compute_spectrogram(signal: &ExtractedSignal, params: &StftParams) -> Result<SpectrogramFrame> {
    params.validate().context("Invalid STFT parameters")?;

    let mut magnitudes = stft_magnitudes(&signal.samples, params);
    apply_frequency_gain(&mut magnitudes);
    clip_dynamic_range(&mut magnitudes);

    let bin_width = signal.sample_rate as f64 / params.fft_size as f64;
    let frequencies = (0..params.bin_count())
        .map(|bin| bin as f64 * bin_width)
        .collect();
    let duration = if signal.sample_rate == 0 {
        0.0
    } else {
        (magnitudes.ncols() * params.hop_size) as f64 / signal.sample_rate as f64
    };

    Ok(SpectrogramFrame {
        magnitudes,
        frequencies,
        sample_rate: signal.sample_rate,
        params: *params,
        duration,
    })
}

/// Number of full frames that fit in `len` samples
pub fn frame_count(len: usize, params: &StftParams) -> usize {
    if len < params.fft_size {
        0
    } else {
        1 + (len - params.fft_size) / params.hop_size
    }
}

/// |STFT| with shape `(fft_size / 2 + 1, frames)`
pub fn stft_magnitudes(samples: &[f32], params: &StftParams) -> Array2<f32> {
    let n_fft = params.fft_size;
    let bins = params.bin_count();
    let frames = frame_count(samples.len(), params);
    let mut magnitudes = Array2::zeros((bins, frames));
    if frames == 0 {
        return magnitudes;
    }

    let window = centred_window(params);
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];
    let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

    for frame in 0..frames {
        let offset = frame * params.hop_size;
        let segment = &samples[offset..offset + n_fft];
        for (slot, (&sample, &weight)) in buffer.iter_mut().zip(segment.iter().zip(&window)) {
            *slot = Complex::new(sample * weight, 0.0);
        }
        fft.process_with_scratch(&mut buffer, &mut scratch);
        for (cell, value) in magnitudes.column_mut(frame).iter_mut().zip(&buffer[..bins]) {
            *cell = value.norm();
        }
    }

    magnitudes
}

/// Periodic Blackman window of `length` samples
pub fn blackman_window(length: usize) -> Vec<f32> {
    let m = length as f32;
    (0..length)
        .map(|n| {
            let phase = 2.0 * PI * n as f32 / m;
            0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
        })
        .collect()
}

/// Blackman window zero padded on both sides to the FFT size
fn centred_window(params: &StftParams) -> Vec<f32> {
    let mut window = vec![0.0; params.fft_size];
    let lead = (params.fft_size - params.window_size) / 2;
    window[lead..lead + params.window_size].copy_from_slice(&blackman_window(params.window_size));
    window
}

/// Linear per-row multiplier from `LOW_BIN_GAIN` to `HIGH_BIN_GAIN`
pub fn frequency_gain(bins: usize) -> Vec<f32> {
    match bins {
        0 => Vec::new(),
        1 => vec![LOW_BIN_GAIN],
        _ => {
            let step = (HIGH_BIN_GAIN - LOW_BIN_GAIN) / (bins - 1) as f32;
            (0..bins)
                .map(|bin| LOW_BIN_GAIN + step * bin as f32)
                .collect()
        }
    }
}

pub fn apply_frequency_gain(magnitudes: &mut Array2<f32>) {
    let gain = frequency_gain(magnitudes.nrows());
    for (mut row, factor) in magnitudes.rows_mut().into_iter().zip(gain) {
        row.mapv_inplace(|v| v * factor);
    }
}

/// Clamp every value to `[0, HEADROOM * max]`, returning the bound used.
///
/// A silent or non-finite frame gets a bound of zero.
pub fn clip_dynamic_range(magnitudes: &mut Array2<f32>) -> f32 {
    let max = magnitudes
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0_f32, f32::max);
    let bound = if max > 0.0 { max * HEADROOM } else { 0.0 };
    magnitudes.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, bound) });
    bound
}

/// Draw each parameter uniformly within `±jitter` of `base`.
///
/// The window is clamped to the drawn FFT size and every size stays positive.
pub fn jittered_params<R: Rng + ?Sized>(rng: &mut R, base: &StftParams, jitter: usize) -> StftParams {
    let fft_size = draw_around(rng, base.fft_size, jitter);
    let window_size = draw_around(rng, base.window_size, jitter).min(fft_size);
    let hop_size = draw_around(rng, base.hop_size, jitter);
    StftParams::new(fft_size, window_size, hop_size)
}

fn draw_around<R: Rng + ?Sized>(rng: &mut R, centre: usize, jitter: usize) -> usize {
    let low = centre.saturating_sub(jitter).max(1);
    let high = (centre + jitter).max(low);
    rng.gen_range(low..=high)
}
