//! Core types for the phase-cancellation spectrogram pipeline

use anyhow::{ensure, Result};
use ndarray::Array2;

/// Raw audio data representation (mono, f32 samples)
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples, normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g., 44100)
    pub sample_rate: u32,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }
}

/// Convert a timestamp to a sample index, rounding to the nearest sample.
///
/// The result may be negative for timestamps before the track start.
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> i64 {
    (seconds * sample_rate as f64).round() as i64
}

/// Time range of interest inside a track, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn start_sample(&self, sample_rate: u32) -> i64 {
        seconds_to_samples(self.start, sample_rate)
    }

    pub fn end_sample(&self, sample_rate: u32) -> i64 {
        seconds_to_samples(self.end, sample_rate)
    }

    /// Shift both edges back by `offset` seconds.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            start: self.start - offset,
            end: self.end - offset,
        }
    }
}

/// Immutable description of one extraction job, validated at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDescriptor {
    /// Unique track identifier, also the file-name key for sources and outputs
    pub name: String,
    /// Window to extract; `start` may be negative before alignment
    pub window: TimeWindow,
    pub min_freq: f64,
    pub max_freq: f64,
    /// Gain applied to the unpuzzlified source before cancellation
    pub db_delta: f64,
    /// 1-based position in the track list (title text only)
    pub index: usize,
}

impl TrackDescriptor {
    pub fn new(
        name: impl Into<String>,
        window: TimeWindow,
        min_freq: f64,
        max_freq: f64,
        index: usize,
    ) -> Self {
        Self {
            name: name.into(),
            window,
            min_freq,
            max_freq,
            db_delta: 0.0,
            index,
        }
    }

    pub fn with_db_delta(mut self, db_delta: f64) -> Self {
        self.db_delta = db_delta;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.name.trim().is_empty(), "Track name must not be empty");
        ensure!(
            self.window.start.is_finite() && self.window.end.is_finite(),
            "Track '{}' start/end must be finite",
            self.name
        );
        ensure!(
            self.window.end > self.window.start,
            "Track '{}' end ({}) must be greater than start ({})",
            self.name,
            self.window.end,
            self.window.start
        );
        ensure!(
            self.min_freq.is_finite() && self.min_freq > 0.0,
            "Track '{}' min_freq must be positive for a log frequency axis",
            self.name
        );
        ensure!(
            self.max_freq.is_finite() && self.max_freq > self.min_freq,
            "Track '{}' max_freq ({}) must be greater than min_freq ({})",
            self.name,
            self.max_freq,
            self.min_freq
        );
        ensure!(
            self.db_delta.is_finite(),
            "Track '{}' db_delta must be finite",
            self.name
        );
        Ok(())
    }
}

/// Two equal-length mono signals sharing one sample rate
#[derive(Debug, Clone)]
pub struct AlignedAudioPair {
    pub puzzlified: Vec<f32>,
    pub unpuzzlified: Vec<f32>,
    pub sample_rate: u32,
    /// Window after negative-start compensation (`start >= 0`)
    pub window: TimeWindow,
    /// Seconds subtracted from the requested window, 0.0 when none
    pub offset: f64,
}

impl AlignedAudioPair {
    pub fn len(&self) -> usize {
        self.puzzlified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzlified.is_empty()
    }
}

/// Residual signal for one track's window
#[derive(Debug, Clone)]
pub struct ExtractedSignal {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl ExtractedSignal {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

impl From<AudioData> for ExtractedSignal {
    fn from(audio: AudioData) -> Self {
        Self {
            samples: audio.samples,
            sample_rate: audio.sample_rate,
        }
    }
}

impl From<&ExtractedSignal> for AudioData {
    fn from(signal: &ExtractedSignal) -> Self {
        Self {
            samples: signal.samples.clone(),
            sample_rate: signal.sample_rate,
        }
    }
}

pub const DEFAULT_FFT_SIZE: usize = 4096;
pub const DEFAULT_WINDOW_SIZE: usize = 2048;
pub const DEFAULT_HOP_SIZE: usize = DEFAULT_WINDOW_SIZE / 4;

/// Short-time Fourier transform framing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StftParams {
    pub fft_size: usize,
    /// Analysis window length, centred inside the FFT frame
    pub window_size: usize,
    pub hop_size: usize,
}

impl Default for StftParams {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            hop_size: DEFAULT_HOP_SIZE,
        }
    }
}

impl StftParams {
    pub fn new(fft_size: usize, window_size: usize, hop_size: usize) -> Self {
        Self {
            fft_size,
            window_size,
            hop_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.fft_size > 0, "fft_size must be positive");
        ensure!(self.hop_size > 0, "hop_size must be positive");
        ensure!(
            self.window_size > 0 && self.window_size <= self.fft_size,
            "window_size ({}) must be in 1..={}",
            self.window_size,
            self.fft_size
        );
        Ok(())
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2 + 1
    }
}

/// Magnitude time-frequency matrix plus its axes
#[derive(Debug, Clone)]
pub struct SpectrogramFrame {
    /// Shape `(bins, frames)`; row 0 is DC
    pub magnitudes: Array2<f32>,
    /// Centre frequency of each row in Hz
    pub frequencies: Vec<f64>,
    pub sample_rate: u32,
    pub params: StftParams,
    /// Seconds covered by the frames (`frames * hop / sample_rate`)
    pub duration: f64,
}

impl SpectrogramFrame {
    pub fn bins(&self) -> usize {
        self.magnitudes.nrows()
    }

    pub fn frames(&self) -> usize {
        self.magnitudes.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.bins() == 0 || self.frames() == 0
    }

    /// Frequency spacing between adjacent rows
    pub fn bin_width(&self) -> f64 {
        self.sample_rate as f64 / self.params.fft_size as f64
    }

    pub fn max_value(&self) -> f32 {
        self.magnitudes.iter().copied().fold(0.0, f32::max)
    }

    pub fn min_value(&self) -> f32 {
        if self.magnitudes.is_empty() {
            return 0.0;
        }
        self.magnitudes.iter().copied().fold(f32::INFINITY, f32::min)
    }
}
