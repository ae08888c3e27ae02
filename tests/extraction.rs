use anyhow::Result;
use approx::assert_abs_diff_eq;
use phasegram::audio::align::{db_to_amplitude, AudioAligner};
use phasegram::audio::cancel::extract_residual;
use phasegram::pipeline::{extract_signal, SignalSource};
use phasegram::types::{seconds_to_samples, AudioData, TimeWindow, TrackDescriptor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

const SAMPLE_RATE: u32 = 44_100;

fn sine_wave(frequency: f32, duration_secs: f32, sample_rate: u32) -> Vec<f32> {
    let total_samples = (sample_rate as f32 * duration_secs) as usize;
    (0..total_samples)
        .map(|index| {
            let t = index as f32 / sample_rate as f32;
            0.5 * (2.0 * PI * frequency * t).sin()
        })
        .collect()
}

fn track(start: f64, end: f64) -> TrackDescriptor {
    TrackDescriptor::new("synthetic", TimeWindow::new(start, end), 100.0, 16_000.0, 1)
}

#[test]
fn identical_recordings_cancel_completely() -> Result<()> {
    let tone = sine_wave(440.0, 1.0, SAMPLE_RATE);
    let signal = extract_signal(
        &track(0.0, 1.0),
        SignalSource::Derive {
            puzzlified: AudioData::new(tone.clone(), SAMPLE_RATE),
            unpuzzlified: AudioData::new(tone, SAMPLE_RATE),
        },
    )?;

    assert_eq!(signal.samples.len(), SAMPLE_RATE as usize);
    assert!(signal.samples.iter().all(|&s| s == 0.0));
    Ok(())
}

#[test]
fn injected_burst_is_recovered() -> Result<()> {
    let original = sine_wave(220.0, 2.0, SAMPLE_RATE);
    let (start, end) = (0.5, 1.25);
    let first = seconds_to_samples(start, SAMPLE_RATE) as usize;
    let last = seconds_to_samples(end, SAMPLE_RATE) as usize;

    let mut rng = StdRng::seed_from_u64(11);
    let burst: Vec<f32> = (first..last).map(|_| rng.gen_range(-0.1..0.1)).collect();
    let mut released = original.clone();
    for (sample, noise) in released[first..last].iter_mut().zip(&burst) {
        *sample += noise;
    }

    let signal = extract_signal(
        &track(start, end),
        SignalSource::Derive {
            puzzlified: AudioData::new(released, SAMPLE_RATE),
            unpuzzlified: AudioData::new(original, SAMPLE_RATE),
        },
    )?;

    assert_eq!(signal.samples.len(), burst.len());
    for (got, expected) in signal.samples.iter().zip(&burst) {
        assert_abs_diff_eq!(*got, *expected, epsilon = 1e-6);
    }
    Ok(())
}

#[test]
fn aligned_lengths_match_and_cover_window() -> Result<()> {
    let cases = [
        (1000usize, 400usize, 0.0, 0.5),
        (400, 1000, 0.1, 0.9),
        (300, 300, 0.0, 1.7),
        (800, 600, -0.35, 0.2),
    ];
    for (puzzlified_len, unpuzzlified_len, start, end) in cases {
        let pair = AudioAligner::new(0.0, TimeWindow::new(start, end)).align(
            &AudioData::new(vec![0.5; puzzlified_len], 1000),
            &AudioData::new(vec![0.25; unpuzzlified_len], 1000),
        )?;
        assert_eq!(pair.puzzlified.len(), pair.unpuzzlified.len());
        assert!(pair.len() as i64 >= pair.window.end_sample(1000));
        assert!(pair.window.start >= 0.0);
    }
    Ok(())
}

#[test]
fn negative_start_is_shifted_to_zero() -> Result<()> {
    let rate = 8000;
    let (start, end) = (-0.5, 1.0);
    let released = sine_wave(300.0, 1.0, rate);
    let original: Vec<f32> = released.iter().map(|s| s * 0.5).collect();

    let pair = AudioAligner::new(0.0, TimeWindow::new(start, end)).align(
        &AudioData::new(released.clone(), rate),
        &AudioData::new(original.clone(), rate),
    )?;
    assert_eq!(pair.offset, start);
    assert_eq!(pair.window.start, 0.0);
    assert_abs_diff_eq!(pair.window.end, end - start, epsilon = 1e-12);

    let signal = extract_residual(&pair);
    let expected_len = ((end - start) * rate as f64).round() as i64;
    assert!((signal.samples.len() as i64 - expected_len).abs() <= 1);

    let lead = 4000;
    assert!(signal.samples[..lead].iter().all(|&s| s == 0.0));
    for (i, got) in signal.samples[lead..].iter().enumerate() {
        assert_abs_diff_eq!(*got, released[i] - original[i], epsilon = 1e-6);
    }
    Ok(())
}

#[test]
fn gain_correction_scales_only_the_reference() -> Result<()> {
    let rate = 16_000;
    let released = sine_wave(500.0, 0.5, rate);
    let original = sine_wave(750.0, 0.5, rate);
    let window = TimeWindow::new(0.0, 0.5);

    for db in [-6.0, -1.5, 0.0, 3.0] {
        let k = db_to_amplitude(db) as f32;
        let pair = AudioAligner::new(db, window).align(
            &AudioData::new(released.clone(), rate),
            &AudioData::new(original.clone(), rate),
        )?;
        let residual = extract_residual(&pair);
        for ((got, p), u) in residual.samples.iter().zip(&released).zip(&original) {
            assert_abs_diff_eq!(*got, p - k * u, epsilon = 1e-6);
        }
    }
    Ok(())
}

#[test]
fn short_reference_is_padded_before_cancellation() -> Result<()> {
    let rate = 1000;
    let released = vec![0.2; 1500];
    let original = vec![0.2; 1000];
    let signal = extract_signal(
        &track(0.8, 1.4),
        SignalSource::Derive {
            puzzlified: AudioData::new(released, rate),
            unpuzzlified: AudioData::new(original, rate),
        },
    )?;
    assert_eq!(signal.samples.len(), 600);
    assert!(signal.samples[..200].iter().all(|&s| s == 0.0));
    assert!(signal.samples[200..].iter().all(|&s| (s - 0.2).abs() < 1e-7));
    Ok(())
}
