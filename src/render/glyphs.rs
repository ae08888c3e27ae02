use std::path::Path;

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use anyhow::{Context, Result};

/// Coverage mask for one line of text, `width * height` values in `[0, 1]`
#[derive(Debug, Clone)]
pub struct TextBitmap {
    pub width: u32,
    pub height: u32,
    coverage: Vec<f32>,
}

impl TextBitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            coverage: vec![0.0; (width * height) as usize],
        }
    }

    pub fn coverage(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.coverage[(y * self.width + x) as usize]
    }

    fn accumulate(&mut self, x: i32, y: i32, amount: f32) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let cell = &mut self.coverage[(y as u32 * self.width + x as u32) as usize];
        *cell = (*cell + amount).min(1.0);
    }
}

/// Turns a string into a coverage mask at a pixel size.
///
/// The mask spans the full line height (ascent to descent) so callers can
/// anchor labels by their box edges.
pub trait GlyphRasterizer: Send + Sync {
    fn rasterize(&self, text: &str, size_px: f32) -> TextBitmap;
}

/// Outline font loaded from a TrueType/OpenType file
pub struct TrueTypeGlyphs {
    font: FontVec,
}

impl TrueTypeGlyphs {
    /// Load the font file; a missing or invalid font is a setup failure.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Font resource not found at {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .with_context(|| format!("Font resource {} is not a valid font", path.display()))?;
        Ok(Self { font })
    }
}

impl GlyphRasterizer for TrueTypeGlyphs {
    fn rasterize(&self, text: &str, size_px: f32) -> TextBitmap {
        let scale = PxScale::from(size_px);
        let scaled = self.font.as_scaled(scale);
        let ascent = scaled.ascent();
        let height = (ascent - scaled.descent()).ceil().max(1.0) as u32;

        let mut caret = 0.0;
        let mut previous = None;
        let mut glyphs = Vec::with_capacity(text.len());
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            glyphs.push(id.with_scale_and_position(scale, point(caret, ascent)));
            caret += scaled.h_advance(id);
            previous = Some(id);
        }

        let mut bitmap = TextBitmap::new(caret.ceil().max(0.0) as u32, height);
        for glyph in glyphs {
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                let (left, top) = (bounds.min.x as i32, bounds.min.y as i32);
                outlined.draw(|x, y, c| bitmap.accumulate(left + x as i32, top + y as i32, c));
            }
        }
        bitmap
    }
}

/// Font-free rasterizer that draws every visible character as a solid cell.
///
/// Useful wherever layout matters but the font file is unavailable, such as
/// tests and headless previews.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockGlyphs;

impl BlockGlyphs {
    pub fn cell_width(size_px: f32) -> u32 {
        (size_px * 0.6).round().max(1.0) as u32
    }
}

impl GlyphRasterizer for BlockGlyphs {
    fn rasterize(&self, text: &str, size_px: f32) -> TextBitmap {
        let cell = Self::cell_width(size_px);
        let height = size_px.round().max(1.0) as u32;
        let mut bitmap = TextBitmap::new(cell * text.chars().count() as u32, height);
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let left = i as u32 * cell;
            for y in 1..height.saturating_sub(1) {
                for x in left + 1..left + cell.saturating_sub(1) {
                    bitmap.accumulate(x as i32, y as i32, 1.0);
                }
            }
        }
        bitmap
    }
}
