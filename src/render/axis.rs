//! Axis calibration: tick selection, label text, and value-to-pixel maps

/// Frequencies eligible for interior y-axis labels
pub const FREQUENCY_CANDIDATES: [f64; 10] = [
    20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0,
];

/// Tick values for a log-frequency axis, endpoints included.
///
/// Interior candidates must sit clear of both ends so their labels never
/// collide with the endpoint labels.
pub fn frequency_ticks(min_freq: f64, max_freq: f64) -> Vec<f64> {
    let mut ticks = vec![min_freq];
    ticks.extend(
        FREQUENCY_CANDIDATES
            .iter()
            .copied()
            .filter(|&f| min_freq * 1.5 <= f && f <= max_freq * 0.75),
    );
    ticks.push(max_freq);
    ticks
}

pub fn frequency_label(freq: f64) -> String {
    format!("{}Hz", freq)
}

/// `MM:SS:mmm`, with a leading `-` for times before the track start
pub fn timestamp_label(seconds: f64) -> String {
    let sign = if seconds < 0.0 { "-" } else { "" };
    let total_ms = (seconds.abs() * 1000.0).round() as u64;
    format!(
        "{}{:02}:{:02}:{:03}",
        sign,
        total_ms / 60_000,
        (total_ms / 1000) % 60,
        total_ms % 1000
    )
}

/// Log-scaled mapping between frequency and a pixel span (row 0 at the top)
#[derive(Debug, Clone, Copy)]
pub struct LogFrequencyAxis {
    log_min: f64,
    log_max: f64,
    span: u32,
}

impl LogFrequencyAxis {
    pub fn new(min_freq: f64, max_freq: f64, span: u32) -> Self {
        Self {
            log_min: min_freq.ln(),
            log_max: max_freq.ln(),
            span,
        }
    }

    /// Frequency at the centre of pixel row `row`
    pub fn frequency_at(&self, row: u32) -> f64 {
        let fraction = (row as f64 + 0.5) / self.span as f64;
        (self.log_max - fraction * (self.log_max - self.log_min)).exp()
    }

    /// Pixel offset of `freq` from the top edge, `0.0..=span`
    pub fn position_of(&self, freq: f64) -> f64 {
        let fraction = (freq.ln() - self.log_min) / (self.log_max - self.log_min);
        (1.0 - fraction) * self.span as f64
    }
}
