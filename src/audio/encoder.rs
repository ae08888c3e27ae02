use crate::types::ExtractedSignal;
use anyhow::{Context, Result};
use std::path::Path;

/// Write an extracted signal as a mono 32-bit float WAV file.
///
/// Float samples keep the faint residual intact; 16-bit quantization would
/// bury most of it in rounding noise.
pub fn encode_signal<P: AsRef<Path>>(signal: &ExtractedSignal, path: P) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: signal.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    for &sample in &signal.samples {
        writer
            .write_sample(sample)
            .context("Failed to write audio sample")?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;

    Ok(())
}
