//! Averaging many renders made with jittered STFT framing
//!
//! Framing artifacts differ from one parameter set to the next while the
//! hidden image does not, so the pixel-wise mean keeps the image and washes
//! the artifacts out.

use std::path::Path;

use anyhow::{ensure, Result};
use image::{Rgb, RgbImage};
use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::render::glyphs::GlyphRasterizer;
use crate::render::{save_image, SpectrogramRenderer, TrackLabel, CANVAS_SIZE};
use crate::spectrogram::{compute_spectrogram, jittered_params, PARAM_JITTER};
use crate::types::{ExtractedSignal, StftParams};

pub const DEFAULT_RUNS: usize = 200;

#[derive(Debug, Clone, Copy)]
pub struct EnsembleConfig {
    pub runs: usize,
    pub base: StftParams,
    pub jitter: usize,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            runs: DEFAULT_RUNS,
            base: StftParams::default(),
            jitter: PARAM_JITTER,
        }
    }
}

impl EnsembleConfig {
    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }
}

/// Per-channel running sums for a fixed-size RGB raster
#[derive(Debug, Clone)]
pub struct PixelAccumulator {
    width: u32,
    height: u32,
    sums: Vec<u32>,
    count: u32,
}

impl PixelAccumulator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sums: vec![0; (width * height * 3) as usize],
            count: 0,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn add(&mut self, image: &RgbImage) {
        debug_assert_eq!(image.dimensions(), (self.width, self.height));
        for (sum, &value) in self.sums.iter_mut().zip(image.as_raw()) {
            *sum += value as u32;
        }
        self.count += 1;
    }

    pub fn merge(mut self, other: Self) -> Self {
        for (sum, value) in self.sums.iter_mut().zip(other.sums) {
            *sum += value;
        }
        self.count += other.count;
        self
    }

    /// Rounded pixel-wise mean; an empty accumulator yields black
    pub fn mean(&self) -> RgbImage {
        if self.count == 0 {
            return RgbImage::from_pixel(self.width, self.height, Rgb([0, 0, 0]));
        }
        let count = self.count;
        let raw = self
            .sums
            .iter()
            .map(|&sum| ((sum + count / 2) / count).min(255) as u8)
            .collect();
        RgbImage::from_raw(self.width, self.height, raw)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

/// Render `config.runs` jittered spectrograms and return their mean.
///
/// Parameters are drawn up front from `rng`, so a seeded source reproduces
/// the result regardless of how the renders are scheduled.
pub fn render_ensemble<G, R>(
    signal: &ExtractedSignal,
    label: &TrackLabel,
    renderer: &SpectrogramRenderer<G>,
    config: &EnsembleConfig,
    rng: &mut R,
) -> Result<RgbImage>
where
    G: GlyphRasterizer,
    R: Rng + ?Sized,
{
    ensure!(config.runs > 0, "Ensemble size must be at least 1");
    config.base.validate()?;

    let draws: Vec<StftParams> = (0..config.runs)
        .map(|_| jittered_params(rng, &config.base, config.jitter))
        .collect();
    info!(
        track = %label.name,
        runs = config.runs,
        jitter = config.jitter,
        "rendering ensemble"
    );

    let accumulator = draws
        .par_iter()
        .try_fold(
            || PixelAccumulator::new(CANVAS_SIZE, CANVAS_SIZE),
            |mut acc, params| -> Result<PixelAccumulator> {
                let frame = compute_spectrogram(signal, params)?;
                acc.add(&renderer.render(&frame, label));
                debug!(
                    fft = params.fft_size,
                    window = params.window_size,
                    hop = params.hop_size,
                    "ensemble run rendered"
                );
                Ok(acc)
            },
        )
        .try_reduce(
            || PixelAccumulator::new(CANVAS_SIZE, CANVAS_SIZE),
            |a, b| Ok(a.merge(b)),
        )?;

    Ok(accumulator.mean())
}

pub fn render_ensemble_to_file<G, R>(
    signal: &ExtractedSignal,
    label: &TrackLabel,
    renderer: &SpectrogramRenderer<G>,
    config: &EnsembleConfig,
    rng: &mut R,
    path: &Path,
) -> Result<()>
where
    G: GlyphRasterizer,
    R: Rng + ?Sized,
{
    let image = render_ensemble(signal, label, renderer, config, rng)?;
    save_image(&image, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::glyphs::BlockGlyphs;
    use crate::render::RenderStyle;
    use crate::types::TimeWindow;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn label() -> TrackLabel {
        TrackLabel {
            name: "Puzzle".to_string(),
            index: 1,
            total: 1,
            min_freq: 50.0,
            max_freq: 4000.0,
            window: TimeWindow::new(0.0, 0.5),
        }
    }

    fn noise_signal(seed: u64) -> ExtractedSignal {
        let mut rng = StdRng::seed_from_u64(seed);
        ExtractedSignal {
            samples: (0..8000).map(|_| rng.gen_range(-0.5..0.5)).collect(),
            sample_rate: 8000,
        }
    }

    fn small_config(runs: usize) -> EnsembleConfig {
        EnsembleConfig {
            runs,
            base: StftParams::new(512, 256, 64),
            jitter: 32,
        }
    }

    #[test]
    fn accumulator_mean_rounds() {
        let mut acc = PixelAccumulator::new(1, 1);
        acc.add(&RgbImage::from_pixel(1, 1, Rgb([10, 0, 255])));
        acc.add(&RgbImage::from_pixel(1, 1, Rgb([11, 1, 255])));
        assert_eq!(acc.count(), 2);
        assert_eq!(*acc.mean().get_pixel(0, 0), Rgb([11, 1, 255]));
    }

    #[test]
    fn merge_combines_partial_sums() {
        let mut a = PixelAccumulator::new(1, 1);
        a.add(&RgbImage::from_pixel(1, 1, Rgb([30, 30, 30])));
        let mut b = PixelAccumulator::new(1, 1);
        b.add(&RgbImage::from_pixel(1, 1, Rgb([0, 60, 90])));
        b.add(&RgbImage::from_pixel(1, 1, Rgb([0, 0, 0])));
        let merged = a.merge(b);
        assert_eq!(merged.count(), 3);
        assert_eq!(*merged.mean().get_pixel(0, 0), Rgb([10, 30, 40]));
    }

    #[test]
    fn seeded_ensembles_are_reproducible() {
        let renderer = SpectrogramRenderer::new(BlockGlyphs, RenderStyle::default());
        let signal = noise_signal(3);
        let first = render_ensemble(
            &signal,
            &label(),
            &renderer,
            &small_config(4),
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();
        let second = render_ensemble(
            &signal,
            &label(),
            &renderer,
            &small_config(4),
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn single_run_without_jitter_matches_plain_render() {
        let renderer = SpectrogramRenderer::new(BlockGlyphs, RenderStyle::default());
        let signal = noise_signal(9);
        let config = EnsembleConfig {
            jitter: 0,
            ..small_config(1)
        };
        let averaged = render_ensemble(
            &signal,
            &label(),
            &renderer,
            &config,
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();
        let frame = compute_spectrogram(&signal, &config.base).unwrap();
        assert_eq!(averaged, renderer.render(&frame, &label()));
    }

    #[test]
    fn zero_runs_is_rejected() {
        let renderer = SpectrogramRenderer::new(BlockGlyphs, RenderStyle::default());
        let result = render_ensemble(
            &noise_signal(1),
            &label(),
            &renderer,
            &small_config(0),
            &mut StdRng::seed_from_u64(1),
        );
        assert!(result.is_err());
    }
}
