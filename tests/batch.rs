use std::f32::consts::PI;
use std::path::Path;

use anyhow::Result;
use hound::{SampleFormat, WavSpec, WavWriter};
use phasegram::config::TrackList;
use phasegram::mosaic;
use phasegram::pipeline::{BatchRunner, OutputLayout, RenderMode};
use phasegram::render::glyphs::BlockGlyphs;
use phasegram::render::{SpectrogramRenderer, CANVAS_SIZE};
use serde_json::json;

const SAMPLE_RATE: u32 = 22_050;

fn write_wav(path: &Path, samples: &[f32]) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec).expect("create wav");
    for &sample in samples {
        writer.write_sample(sample).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

fn tone(frequency: f32, seconds: f32) -> Vec<f32> {
    (0..(SAMPLE_RATE as f32 * seconds) as usize)
        .map(|i| 0.3 * (2.0 * PI * frequency * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

/// Two tracks whose released versions carry an extra 3 kHz tone.
fn write_fixture(root: &Path) -> TrackList {
    let released_dir = root.join("released");
    let original_dir = root.join("original");
    std::fs::create_dir_all(&released_dir).unwrap();
    std::fs::create_dir_all(&original_dir).unwrap();

    for name in ["Alpha", "Beta"] {
        let original = tone(330.0, 1.5);
        let hidden = tone(3000.0, 1.5);
        let released: Vec<f32> = original.iter().zip(&hidden).map(|(a, b)| a + b).collect();
        write_wav(&released_dir.join(format!("{}.wav", name)), &released);
        write_wav(&original_dir.join(format!("{}.wav", name)), &original);
    }

    let config = json!({
        "puzzlified_path_pattern": format!("{}/%s.wav", released_dir.display()),
        "unpuzzlified_path_pattern": format!("{}/%s.wav", original_dir.display()),
        "title": "Test Spectrograms",
        "version_tag": "t1",
        "tracks": [
            {"track": "Alpha", "start": 0.0, "end": 1.0, "min_freq": 100, "max_freq": 8000},
            {"track": "Beta", "start": -0.25, "end": 1.0, "min_freq": 200, "max_freq": 6000, "db_delta": 0.0}
        ]
    });
    let config_path = root.join("config.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    TrackList::load(&config_path).unwrap()
}

#[test]
fn batch_writes_images_cache_and_mosaic() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let tracks = write_fixture(dir.path());
    assert_eq!(tracks.style.series_title, "Test Spectrograms");

    let renderer = SpectrogramRenderer::new(BlockGlyphs, tracks.style.clone());
    let layout = OutputLayout::new(dir.path().join("output"));
    let runner = BatchRunner::new(&tracks, &renderer, layout, RenderMode::default());

    let written = runner.run(None)?;
    assert_eq!(written.len(), 2);
    for track in &tracks.tracks {
        assert!(runner.layout().image_path(track).exists());
        assert!(runner.layout().audio_path(track).exists());
    }

    let cached = phasegram::audio::decoder::decode_audio(
        runner.layout().audio_path(&tracks.tracks[1]),
    )?;
    assert_eq!(cached.sample_rate, SAMPLE_RATE);
    // -0.25 .. 1.0 seconds after shifting the window to start at zero
    let expected = (1.25 * SAMPLE_RATE as f64).round() as i64;
    assert!((cached.samples.len() as i64 - expected).abs() <= 1);

    let mosaic_path = runner.layout().mosaic_path();
    assert!(mosaic::create_from_files(
        &runner.image_paths(),
        mosaic::DEFAULT_COLUMNS,
        &mosaic_path
    )?);
    let mosaic_image = image::open(&mosaic_path)?.to_rgb8();
    assert_eq!(
        mosaic_image.dimensions(),
        (CANVAS_SIZE * mosaic::DEFAULT_COLUMNS, CANVAS_SIZE)
    );
    Ok(())
}

#[test]
fn cache_is_reused_unless_a_prefix_forces_extraction() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let tracks = write_fixture(dir.path());
    let renderer = SpectrogramRenderer::new(BlockGlyphs, tracks.style.clone());
    let layout = OutputLayout::new(dir.path().join("output"));
    let runner = BatchRunner::new(&tracks, &renderer, layout, RenderMode::default());
    runner.run(None)?;

    std::fs::remove_dir_all(dir.path().join("released"))?;

    // Cached residuals are enough to re-render everything.
    assert_eq!(runner.run(None)?.len(), 2);

    // A prefix bypasses the cache and needs the missing sources.
    let err = runner.run(Some("Al")).unwrap_err();
    assert!(format!("{:#}", err).contains("puzzlified"));

    assert!(runner.run(Some("Gamma"))?.is_empty());
    Ok(())
}
