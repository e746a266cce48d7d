use image::GrayImage;
use image::imageops::{self, FilterType};

use crate::error::{ProtocolError, Result};

/// Dots across the print head.
pub const PRINT_WIDTH: u32 = 384;

/// Bytes in one PrintData row at full width.
pub const ROW_BYTES: usize = PRINT_WIDTH as usize / 8;

/// Packs one row of grayscale pixels into 1bpp for a PrintData payload.
/// - 0 = black (bit set), non-zero = white
/// - bit 0 = leftmost pixel of each group of 8
pub fn pack_row(pixels: &[u8]) -> Vec<u8> {
    pixels
        .chunks(8)
        .map(|group| {
            group
                .iter()
                .enumerate()
                .fold(0u8, |b, (bit, &px)| b | (u8::from(px == 0) << bit))
        })
        .collect()
}

/// Packs a row-major grayscale buffer into PrintData rows.
///
/// - `pixels`: grayscale buffer (row-major, 0=black, 255=white)
/// - `width`, `height`: image dimensions
///
/// Returns one packed row per pixel row
pub fn pack_rows(pixels: &[u8], width: usize, height: usize) -> Result<Vec<Vec<u8>>> {
    if width == 0 || height == 0 {
        return Err(ProtocolError::Raster("width/height must be > 0".into()));
    }
    let required = width
        .checked_mul(height)
        .ok_or_else(|| ProtocolError::Raster("width*height overflow".into()))?;
    if pixels.len() < required {
        return Err(ProtocolError::Raster(format!(
            "not enough pixels: need {}, have {}",
            required,
            pixels.len()
        )));
    }
    Ok(pixels[..required].chunks(width).map(pack_row).collect())
}

/// Scales an image to the print width, dithers it to black and white, and
/// packs it into rows.
pub fn rows_from_image(img: &GrayImage) -> Result<Vec<Vec<u8>>> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(ProtocolError::Raster("empty image".into()));
    }
    let mut gray = if w == PRINT_WIDTH {
        img.clone()
    } else {
        let target_h = ((h as f32) * PRINT_WIDTH as f32 / w as f32).round().max(1.0) as u32;
        imageops::resize(img, PRINT_WIDTH, target_h, FilterType::Lanczos3)
    };
    imageops::dither(&mut gray, &imageops::BiLevel);

    let (width, height) = gray.dimensions();
    pack_rows(gray.as_raw(), width as usize, height as usize)
}
