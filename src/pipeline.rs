//! Per-track orchestration
//!
//! `extract_signal` and `render_signal` are the pure core stages. `BatchRunner`
//! is the thin collaborator around them that decides between cached and
//! freshly derived audio and lays out output files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{info, info_span};

use crate::audio::align::{load_sources, AudioAligner};
use crate::audio::cancel::extract_residual;
use crate::audio::decoder::decode_audio;
use crate::audio::encoder::encode_signal;
use crate::config::TrackList;
use crate::ensemble::{render_ensemble_to_file, EnsembleConfig};
use crate::render::glyphs::GlyphRasterizer;
use crate::render::{SpectrogramRenderer, TrackLabel};
use crate::spectrogram::compute_spectrogram;
use crate::types::{AudioData, ExtractedSignal, StftParams, TrackDescriptor};

pub const MOSAIC_FILE: &str = "fez_spectrogram_images.png";

/// Where the residual for a track comes from
#[derive(Debug, Clone)]
pub enum SignalSource {
    /// Align and cancel the two source recordings
    Derive {
        puzzlified: AudioData,
        unpuzzlified: AudioData,
    },
    /// Residual already known, e.g. read back from a cache
    Extracted(ExtractedSignal),
}

pub fn extract_signal(track: &TrackDescriptor, source: SignalSource) -> Result<ExtractedSignal> {
    match source {
        SignalSource::Extracted(signal) => Ok(signal),
        SignalSource::Derive {
            puzzlified,
            unpuzzlified,
        } => {
            let pair = AudioAligner::for_track(track)
                .align(&puzzlified, &unpuzzlified)
                .with_context(|| format!("Failed to align sources for '{}'", track.name))?;
            if pair.offset != 0.0 {
                info!(
                    track = %track.name,
                    offset = pair.offset,
                    "compensated negative start"
                );
            }
            Ok(extract_residual(&pair))
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RenderMode {
    Single(StftParams),
    /// Averaged jittered renders; `seed: None` draws from system entropy
    Ensemble {
        config: EnsembleConfig,
        seed: Option<u64>,
    },
}

impl Default for RenderMode {
    fn default() -> Self {
        RenderMode::Single(StftParams::default())
    }
}

pub fn render_signal<G: GlyphRasterizer>(
    renderer: &SpectrogramRenderer<G>,
    signal: &ExtractedSignal,
    label: &TrackLabel,
    mode: &RenderMode,
    path: &Path,
) -> Result<()> {
    match mode {
        RenderMode::Single(params) => {
            let frame = compute_spectrogram(signal, params)?;
            renderer.render_to_file(&frame, label, path)
        }
        RenderMode::Ensemble { config, seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(label.index as u64)),
                None => StdRng::from_entropy(),
            };
            render_ensemble_to_file(signal, label, renderer, config, &mut rng, path)
        }
    }
}

/// Output directory layout: `img/<name>.png`, `wav/<name>.wav`, mosaic at root
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn image_path(&self, track: &TrackDescriptor) -> PathBuf {
        self.root.join("img").join(format!("{}.png", track.name))
    }

    pub fn audio_path(&self, track: &TrackDescriptor) -> PathBuf {
        self.root.join("wav").join(format!("{}.wav", track.name))
    }

    pub fn mosaic_path(&self) -> PathBuf {
        self.root.join(MOSAIC_FILE)
    }
}

pub struct BatchRunner<'a, G> {
    tracks: &'a TrackList,
    renderer: &'a SpectrogramRenderer<G>,
    layout: OutputLayout,
    mode: RenderMode,
}

impl<'a, G: GlyphRasterizer> BatchRunner<'a, G> {
    pub fn new(
        tracks: &'a TrackList,
        renderer: &'a SpectrogramRenderer<G>,
        layout: OutputLayout,
        mode: RenderMode,
    ) -> Self {
        Self {
            tracks,
            renderer,
            layout,
            mode,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Process every track, or only the first whose name starts with `prefix`.
    ///
    /// A prefix forces re-extraction of that track's audio. Returns the images
    /// written; the first failing track aborts the batch.
    pub fn run(&self, prefix: Option<&str>) -> Result<Vec<PathBuf>> {
        match prefix {
            Some(prefix) => match self.tracks.find_by_prefix(prefix) {
                Some(track) => Ok(vec![self.process_track(track, true)?]),
                None => {
                    info!(prefix, "no track matches prefix");
                    Ok(Vec::new())
                }
            },
            None => self
                .tracks
                .tracks
                .par_iter()
                .map(|track| self.process_track(track, false))
                .collect(),
        }
    }

    pub fn process_track(&self, track: &TrackDescriptor, force_extract: bool) -> Result<PathBuf> {
        let _span = info_span!("track", name = %track.name, index = track.index).entered();
        info!("processing track");

        let audio_path = self.layout.audio_path(track);
        let signal = if !force_extract && audio_path.exists() {
            info!(path = %audio_path.display(), "using cached residual");
            let cached = decode_audio(&audio_path)
                .with_context(|| format!("Failed to read cached audio for '{}'", track.name))?;
            extract_signal(track, SignalSource::Extracted(cached.into()))?
        } else {
            let (puzzlified, unpuzzlified) = load_sources(
                &self.tracks.puzzlified_path(track),
                &self.tracks.unpuzzlified_path(track),
            )?;
            let signal = extract_signal(
                track,
                SignalSource::Derive {
                    puzzlified,
                    unpuzzlified,
                },
            )?;
            encode_signal(&signal, &audio_path)?;
            signal
        };
        info!(
            samples = signal.samples.len(),
            sample_rate = signal.sample_rate,
            seconds = signal.duration_secs(),
            "residual ready"
        );

        let label = TrackLabel::for_track(track, self.tracks.len());
        let image_path = self.layout.image_path(track);
        render_signal(self.renderer, &signal, &label, &self.mode, &image_path)
            .with_context(|| format!("Failed to render '{}'", track.name))?;
        info!(path = %image_path.display(), "image written");
        Ok(image_path)
    }

    /// Image paths for every configured track, in track order
    pub fn image_paths(&self) -> Vec<PathBuf> {
        self.tracks
            .tracks
            .iter()
            .map(|track| self.layout.image_path(track))
            .collect()
    }
}
