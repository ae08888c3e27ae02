use crate::types::{AlignedAudioPair, ExtractedSignal};

/// Subtract the unpuzzlified recording from the puzzlified one and keep the
/// aligned window.
///
/// Window edges are clamped to the residual, so a window that overshoots the
/// signal by a rounding sample is silently truncated.
pub fn extract_residual(pair: &AlignedAudioPair) -> ExtractedSignal {
    let len = pair.puzzlified.len().min(pair.unpuzzlified.len());
    let start = clamp_index(pair.window.start_sample(pair.sample_rate), len);
    let end = clamp_index(pair.window.end_sample(pair.sample_rate), len).max(start);

    let samples = pair.puzzlified[start..end]
        .iter()
        .zip(&pair.unpuzzlified[start..end])
        .map(|(p, u)| p - u)
        .collect();

    ExtractedSignal {
        samples,
        sample_rate: pair.sample_rate,
    }
}

fn clamp_index(index: i64, len: usize) -> usize {
    index.clamp(0, len as i64) as usize
}
