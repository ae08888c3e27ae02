use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use image::{imageops, RgbImage};
use tracing::{info, warn};

use crate::render::save_image;

pub const DEFAULT_COLUMNS: u32 = 4;

/// Top-left corner of tile `index` in a grid with `columns` columns
pub fn tile_origin(index: usize, columns: u32, tile_width: u32, tile_height: u32) -> (u32, u32) {
    let index = index as u32;
    ((index % columns) * tile_width, (index / columns) * tile_height)
}

/// Paste same-sized tiles row-major into one canvas.
pub fn compose(tiles: &[RgbImage], columns: u32) -> Result<RgbImage> {
    ensure!(columns > 0, "Mosaic needs at least one column");
    let first = tiles.first().context("Mosaic needs at least one image")?;
    let (width, height) = first.dimensions();
    for (i, tile) in tiles.iter().enumerate() {
        ensure!(
            tile.dimensions() == (width, height),
            "Mosaic tile {} is {:?}, expected {:?}",
            i,
            tile.dimensions(),
            (width, height)
        );
    }

    let rows = (tiles.len() as u32).div_ceil(columns);
    let mut canvas = RgbImage::new(width * columns, height * rows);
    for (i, tile) in tiles.iter().enumerate() {
        let (x, y) = tile_origin(i, columns, width, height);
        imageops::replace(&mut canvas, tile, x as i64, y as i64);
    }
    Ok(canvas)
}

/// Build the mosaic from whichever of `paths` exist, in order.
///
/// Returns `Ok(false)` without writing when none of the images exist.
pub fn create_from_files(paths: &[PathBuf], columns: u32, output: &Path) -> Result<bool> {
    let mut tiles = Vec::with_capacity(paths.len());
    for path in paths.iter().filter(|p| p.exists()) {
        let tile = image::open(path)
            .with_context(|| format!("Failed to open mosaic tile {}", path.display()))?
            .to_rgb8();
        tiles.push(tile);
    }
    if tiles.is_empty() {
        warn!("no rendered images found; skipping mosaic");
        return Ok(false);
    }

    let mosaic = compose(&tiles, columns)?;
    save_image(&mosaic, output)?;
    info!(
        tiles = tiles.len(),
        columns,
        path = %output.display(),
        "mosaic written"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn tile(shade: u8) -> RgbImage {
        RgbImage::from_fn(3, 2, |x, y| Rgb([shade, x as u8, y as u8]))
    }

    #[test]
    fn origin_walks_rows() {
        assert_eq!(tile_origin(0, 4, 10, 20), (0, 0));
        assert_eq!(tile_origin(3, 4, 10, 20), (30, 0));
        assert_eq!(tile_origin(4, 4, 10, 20), (0, 20));
        assert_eq!(tile_origin(9, 4, 10, 20), (10, 40));
    }

    #[test]
    fn tiles_can_be_cropped_back_out() {
        let tiles: Vec<RgbImage> = (0..6).map(|i| tile(i * 40)).collect();
        let mosaic = compose(&tiles, 4).unwrap();
        assert_eq!(mosaic.dimensions(), (12, 4));

        for (i, original) in tiles.iter().enumerate() {
            let (x, y) = tile_origin(i, 4, 3, 2);
            let cropped = imageops::crop_imm(&mosaic, x, y, 3, 2).to_image();
            assert_eq!(&cropped, original);
        }
        // unused grid cells stay black
        assert_eq!(*mosaic.get_pixel(11, 3), Rgb([0, 0, 0]));
    }

    #[test]
    fn mismatched_tiles_are_rejected() {
        let tiles = vec![tile(0), RgbImage::new(2, 2)];
        assert!(compose(&tiles, 2).is_err());
    }

    #[test]
    fn missing_files_skip_the_mosaic() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("mosaic.png");
        let written =
            create_from_files(&[dir.path().join("absent.png")], DEFAULT_COLUMNS, &output).unwrap();
        assert!(!written);
        assert!(!output.exists());
    }
}
