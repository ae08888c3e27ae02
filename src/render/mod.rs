//! Calibrated spectrogram raster: log-frequency y axis, two-label time axis,
//! and a title line, on a fixed dark canvas.

pub mod axis;
pub mod glyphs;

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};

use self::axis::{frequency_label, frequency_ticks, timestamp_label, LogFrequencyAxis};
use self::glyphs::{GlyphRasterizer, TextBitmap};
use crate::types::{SpectrogramFrame, TimeWindow, TrackDescriptor};

pub const CANVAS_SIZE: u32 = 1280;
pub const PLOT_SIZE: u32 = 1024;
pub const PLOT_ORIGIN: u32 = (CANVAS_SIZE - PLOT_SIZE) / 2;

const TICK_LABEL_PX: f32 = 18.0;
const TIME_LABEL_PX: f32 = 28.0;
const TITLE_PX: f32 = 28.0;
const TICK_LENGTH: u32 = 6;
const TICK_PAD: u32 = 6;
const TIME_LABEL_PAD: u32 = 18;
const TITLE_PAD: u32 = 36;

pub const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
pub const FOREGROUND: Rgb<u8> = Rgb([255, 255, 255]);
pub const MUTED: Rgb<u8> = Rgb([128, 128, 128]);

pub const DEFAULT_SERIES_TITLE: &str = "FEZ Original Soundtrack Spectrograms";
pub const DEFAULT_VERSION_TAG: &str = "v3";

/// Per-track text and axis range for one rendered image
#[derive(Debug, Clone)]
pub struct TrackLabel {
    pub name: String,
    pub index: usize,
    pub total: usize,
    pub min_freq: f64,
    pub max_freq: f64,
    /// Timestamps shown under the plot
    pub window: TimeWindow,
}

impl TrackLabel {
    pub fn for_track(track: &TrackDescriptor, total: usize) -> Self {
        Self {
            name: track.name.clone(),
            index: track.index,
            total,
            min_freq: track.min_freq,
            max_freq: track.max_freq,
            window: track.window,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderStyle {
    pub series_title: String,
    pub version_tag: String,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            series_title: DEFAULT_SERIES_TITLE.to_string(),
            version_tag: DEFAULT_VERSION_TAG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Start,
    Centre,
    End,
}

pub struct SpectrogramRenderer<G> {
    glyphs: G,
    style: RenderStyle,
}

impl<G: GlyphRasterizer> SpectrogramRenderer<G> {
    pub fn new(glyphs: G, style: RenderStyle) -> Self {
        Self { glyphs, style }
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    pub fn title(&self, label: &TrackLabel) -> String {
        format!(
            "{} - {} ({}/{})",
            self.style.series_title, label.name, label.index, label.total
        )
    }

    pub fn render(&self, frame: &SpectrogramFrame, label: &TrackLabel) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, BACKGROUND);
        paint_plot(&mut canvas, frame, label);
        draw_frame_lines(&mut canvas);
        self.draw_frequency_axis(&mut canvas, label);
        self.draw_time_axis(&mut canvas, label);
        self.draw_title(&mut canvas, label);
        canvas
    }

    pub fn render_to_file(
        &self,
        frame: &SpectrogramFrame,
        label: &TrackLabel,
        path: &Path,
    ) -> Result<()> {
        save_image(&self.render(frame, label), path)
    }

    fn draw_frequency_axis(&self, canvas: &mut RgbImage, label: &TrackLabel) {
        let axis = LogFrequencyAxis::new(label.min_freq, label.max_freq, PLOT_SIZE);
        let ticks = frequency_ticks(label.min_freq, label.max_freq);
        let last = ticks.len() - 1;
        let right = PLOT_ORIGIN as i32 - (TICK_LENGTH + TICK_PAD) as i32;

        for (i, &freq) in ticks.iter().enumerate() {
            let offset = axis.position_of(freq).round() as u32;
            let y = PLOT_ORIGIN + offset.min(PLOT_SIZE - 1);
            for x in PLOT_ORIGIN - TICK_LENGTH..PLOT_ORIGIN {
                canvas.put_pixel(x, y, FOREGROUND);
            }

            let bitmap = self.glyphs.rasterize(&frequency_label(freq), TICK_LABEL_PX);
            // The bottom label sits above its tick, the top label hangs below.
            let vertical = match i {
                0 => Anchor::End,
                i if i == last => Anchor::Start,
                _ => Anchor::Centre,
            };
            blit(
                canvas,
                &bitmap,
                right,
                y as i32,
                Anchor::End,
                vertical,
                FOREGROUND,
            );
        }
    }

    fn draw_time_axis(&self, canvas: &mut RgbImage, label: &TrackLabel) {
        let bottom = PLOT_ORIGIN + PLOT_SIZE;
        let left = PLOT_ORIGIN;
        let right = PLOT_ORIGIN + PLOT_SIZE - 1;
        for y in bottom..bottom + TICK_LENGTH {
            canvas.put_pixel(left, y, FOREGROUND);
            canvas.put_pixel(right, y, FOREGROUND);
        }

        let top = (bottom + TICK_LENGTH + TIME_LABEL_PAD) as i32;
        let start = self
            .glyphs
            .rasterize(&timestamp_label(label.window.start), TIME_LABEL_PX);
        let end = self
            .glyphs
            .rasterize(&timestamp_label(label.window.end), TIME_LABEL_PX);
        blit(canvas, &start, left as i32, top, Anchor::Start, Anchor::Start, FOREGROUND);
        blit(
            canvas,
            &end,
            (right + 1) as i32,
            top,
            Anchor::End,
            Anchor::Start,
            FOREGROUND,
        );
    }

    fn draw_title(&self, canvas: &mut RgbImage, label: &TrackLabel) {
        let baseline = (PLOT_ORIGIN - TITLE_PAD) as i32;
        let title = self.glyphs.rasterize(&self.title(label), TITLE_PX);
        blit(
            canvas,
            &title,
            PLOT_ORIGIN as i32,
            baseline,
            Anchor::Start,
            Anchor::End,
            FOREGROUND,
        );
        let tag = self.glyphs.rasterize(&self.style.version_tag, TITLE_PX);
        blit(
            canvas,
            &tag,
            (PLOT_ORIGIN + PLOT_SIZE) as i32,
            baseline,
            Anchor::End,
            Anchor::End,
            MUTED,
        );
    }
}

pub fn save_image(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    image
        .save(path)
        .with_context(|| format!("Failed to write image {}", path.display()))
}

/// Grayscale level for `value` on a linear `[min, max]` scale
pub fn gray_level(value: f32, min: f32, max: f32) -> u8 {
    if !(max > min) {
        return 0;
    }
    let normalized = (value - min) / (max - min);
    (normalized * 256.0).floor().clamp(0.0, 255.0) as u8
}

fn paint_plot(canvas: &mut RgbImage, frame: &SpectrogramFrame, label: &TrackLabel) {
    if frame.is_empty() {
        return;
    }

    let axis = LogFrequencyAxis::new(label.min_freq, label.max_freq, PLOT_SIZE);
    let bin_width = frame.bin_width();
    let bins = frame.bins();
    // Rows above the top bin's upper edge have no data and keep the background.
    let rows: Vec<Option<usize>> = (0..PLOT_SIZE)
        .map(|row| {
            let bin = (axis.frequency_at(row) / bin_width).round() as usize;
            (bin < bins).then_some(bin)
        })
        .collect();
    let frames = frame.frames();
    let columns: Vec<usize> = (0..PLOT_SIZE)
        .map(|col| ((col as usize * frames) / PLOT_SIZE as usize).min(frames - 1))
        .collect();

    let (min, max) = (frame.min_value(), frame.max_value());
    for (row, bin) in rows.iter().enumerate() {
        let Some(bin) = *bin else {
            continue;
        };
        let magnitudes = frame.magnitudes.row(bin);
        for (col, &source) in columns.iter().enumerate() {
            let level = gray_level(magnitudes[source], min, max);
            canvas.put_pixel(
                PLOT_ORIGIN + col as u32,
                PLOT_ORIGIN + row as u32,
                Rgb([level, level, level]),
            );
        }
    }
}

/// Spines one pixel outside the plot area
fn draw_frame_lines(canvas: &mut RgbImage) {
    let low = PLOT_ORIGIN - 1;
    let high = PLOT_ORIGIN + PLOT_SIZE;
    for i in low..=high {
        canvas.put_pixel(i, low, FOREGROUND);
        canvas.put_pixel(i, high, FOREGROUND);
        canvas.put_pixel(low, i, FOREGROUND);
        canvas.put_pixel(high, i, FOREGROUND);
    }
}

fn anchored(origin: i32, extent: u32, anchor: Anchor) -> i32 {
    match anchor {
        Anchor::Start => origin,
        Anchor::Centre => origin - extent as i32 / 2,
        Anchor::End => origin - extent as i32,
    }
}

/// Alpha-blend `bitmap` in `color`, positioned relative to `(x, y)`
fn blit(
    canvas: &mut RgbImage,
    bitmap: &TextBitmap,
    x: i32,
    y: i32,
    horizontal: Anchor,
    vertical: Anchor,
    color: Rgb<u8>,
) {
    let left = anchored(x, bitmap.width, horizontal);
    let top = anchored(y, bitmap.height, vertical);
    for by in 0..bitmap.height {
        for bx in 0..bitmap.width {
            let alpha = bitmap.coverage(bx, by);
            if alpha <= 0.0 {
                continue;
            }
            let (px, py) = (left + bx as i32, top + by as i32);
            if px < 0 || py < 0 || px as u32 >= canvas.width() || py as u32 >= canvas.height() {
                continue;
            }
            let pixel = canvas.get_pixel_mut(px as u32, py as u32);
            for (channel, &target) in pixel.0.iter_mut().zip(&color.0) {
                let blended = *channel as f32 * (1.0 - alpha) + target as f32 * alpha;
                *channel = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
