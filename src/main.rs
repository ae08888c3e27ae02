use anyhow::{ensure, Context, Result};
use clap::Parser;
use phasegram::config::{AppConfig, TrackList};
use phasegram::ensemble::EnsembleConfig;
use phasegram::mosaic;
use phasegram::pipeline::{BatchRunner, OutputLayout, RenderMode};
use phasegram::render::glyphs::{BlockGlyphs, GlyphRasterizer, TrueTypeGlyphs};
use phasegram::render::SpectrogramRenderer;
use phasegram::types::StftParams;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Phasegram - hidden spectrogram extractor
///
/// Cancels each track's original recording out of its released version and
/// renders the residual as a spectrogram image, then tiles all images into
/// one mosaic.
#[derive(Parser, Debug)]
#[command(name = "phasegram")]
#[command(version = "0.1.0")]
#[command(about = "Phase-cancellation spectrogram extractor", long_about = None)]
struct Args {
    /// Only process the first track whose name starts with this prefix
    /// (its audio is always re-extracted)
    #[arg(value_name = "NAME_PREFIX")]
    filter: Option<String>,

    /// Track list (JSON)
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Directory for images, cached audio, and the mosaic
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Font file for all text (defaults to the bundled assets)
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,

    /// Draw text as solid blocks instead of loading a font (headless previews)
    #[arg(long, conflicts_with = "font")]
    block_text: bool,

    /// Override for the assets directory
    #[arg(long = "assets-path", value_name = "DIR")]
    assets_path: Option<PathBuf>,

    /// Average this many jittered renders per track instead of one render
    #[arg(long, value_name = "RUNS")]
    ensemble: Option<usize>,

    /// Seed for ensemble parameter jitter (random when omitted)
    #[arg(long, requires = "ensemble")]
    seed: Option<u64>,

    /// Mosaic grid width in tiles
    #[arg(long, default_value_t = mosaic::DEFAULT_COLUMNS)]
    mosaic_columns: u32,

    /// Skip writing the mosaic
    #[arg(long)]
    no_mosaic: bool,
}

impl Args {
    fn validate(&self) -> Result<()> {
        if let Some(runs) = self.ensemble {
            ensure!(runs > 0, "Ensemble size must be positive, got {}", runs);
        }
        ensure!(self.mosaic_columns > 0, "Mosaic needs at least one column");
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            anyhow::bail!("Output path must be a directory: {:?}", self.output_dir);
        }
        Ok(())
    }

    fn font_path(&self) -> Result<PathBuf> {
        match &self.font {
            Some(path) => Ok(path.clone()),
            None => Ok(AppConfig::from_override(self.assets_path.clone())?.font_path()),
        }
    }

    fn render_mode(&self) -> RenderMode {
        match self.ensemble {
            Some(runs) => RenderMode::Ensemble {
                config: EnsembleConfig::default().with_runs(runs),
                seed: self.seed,
            },
            None => RenderMode::Single(StftParams::default()),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phasegram=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    args.validate()
        .context("Failed to validate command-line arguments")?;

    // Setup failures abort before any track is touched.
    if args.block_text {
        info!("drawing text as solid blocks");
        return run(&args, BlockGlyphs);
    }
    let font_path = args.font_path().context("Failed to locate font resource")?;
    let glyphs = TrueTypeGlyphs::load(&font_path)?;
    info!(font = %font_path.display(), "font loaded");
    run(&args, glyphs)
}

fn run<G: GlyphRasterizer>(args: &Args, glyphs: G) -> Result<()> {
    let tracks = TrackList::load(&args.config)?;
    info!(
        config = %args.config.display(),
        tracks = tracks.len(),
        "configuration loaded"
    );

    let renderer = SpectrogramRenderer::new(glyphs, tracks.style.clone());
    let runner = BatchRunner::new(
        &tracks,
        &renderer,
        OutputLayout::new(&args.output_dir),
        args.render_mode(),
    );
    let written = runner.run(args.filter.as_deref())?;
    info!(images = written.len(), "tracks processed");

    if !args.no_mosaic {
        mosaic::create_from_files(
            &runner.image_paths(),
            args.mosaic_columns,
            &runner.layout().mosaic_path(),
        )?;
    }

    Ok(())
}
