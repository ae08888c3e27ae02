use anyhow::{ensure, Result};
use dasp::interpolate::linear::Linear;
use dasp::{signal, Signal};

/// Resample `samples` from `source_rate` to `target_rate`.
///
/// Output length is `ceil(len * target_rate / source_rate)`; the first output
/// sample coincides with the first input sample, so equal-rate signals stay
/// sample-aligned.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    ensure!(source_rate > 0, "source sample rate must be positive");
    ensure!(target_rate > 0, "target sample rate must be positive");
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let output_len = resampled_len(samples.len(), source_rate, target_rate);
    if samples.len() == 1 {
        return Ok(vec![samples[0]; output_len]);
    }

    // Hold the final sample so the tail does not fade toward silence.
    let last = samples[samples.len() - 1];
    let mut source = signal::from_iter(samples.iter().copied().chain(std::iter::repeat(last)));
    let left = source.next();
    let right = source.next();
    let converted = source.from_hz_to_hz(
        Linear::new(left, right),
        source_rate as f64,
        target_rate as f64,
    );
    Ok(converted.take(output_len).collect())
}

pub fn resampled_len(len: usize, source_rate: u32, target_rate: u32) -> usize {
    ((len as f64) * target_rate as f64 / source_rate as f64).ceil() as usize
}
