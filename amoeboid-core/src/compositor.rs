//! Card image stitching
//!
//! Images are pasted onto a white RGB canvas in input order. Along the seam
//! axis every image is preceded by `pad` pixels and the last one is followed by
//! `pad` more; across it, the canvas gets the cross padding on both sides.

use image::{imageops, DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

use crate::error::Result;

/// Cards per row in a batch reply
pub const BATCH_ROW_LEN: usize = 5;
/// Gap between two faces of one card
pub const FACE_PAD: u32 = 10;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Place images left to right
pub fn stitch_horizontal(images: &[DynamicImage], pad_h: u32, pad_v: u32) -> RgbImage {
    let count = images.len() as u32;
    let width = images.iter().map(DynamicImage::width).sum::<u32>() + pad_h * (count + 1);
    let height = images.iter().map(DynamicImage::height).max().unwrap_or(0) + pad_v * 2;

    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
    let mut x = 0u32;
    for image in images {
        x += pad_h;
        imageops::replace(&mut canvas, &image.to_rgb8(), i64::from(x), i64::from(pad_v));
        x += image.width();
    }
    canvas
}

/// Place images top to bottom
pub fn stitch_vertical(images: &[DynamicImage], pad_h: u32, pad_v: u32) -> RgbImage {
    let count = images.len() as u32;
    let width = images.iter().map(DynamicImage::width).max().unwrap_or(0) + pad_h * 2;
    let height = images.iter().map(DynamicImage::height).sum::<u32>() + pad_v * (count + 1);

    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
    let mut y = 0u32;
    for image in images {
        y += pad_v;
        imageops::replace(&mut canvas, &image.to_rgb8(), i64::from(pad_h), i64::from(y));
        y += image.height();
    }
    canvas
}

/// Lay out the images of a multi-card reply
///
/// Up to five cards form one strip; more are split into rows of five which
/// are then stacked.
pub fn compose_batch(images: &[DynamicImage]) -> RgbImage {
    if images.len() <= BATCH_ROW_LEN {
        return stitch_horizontal(images, 10, 10);
    }

    let rows: Vec<DynamicImage> = images
        .chunks(BATCH_ROW_LEN)
        .map(|row| DynamicImage::ImageRgb8(stitch_horizontal(row, 10, 5)))
        .collect();
    debug!(cards = images.len(), rows = rows.len(), "Composing batch image");
    stitch_vertical(&rows, 0, 0)
}

/// Join the faces of one card into a single image
pub fn compose_faces(faces: &[DynamicImage]) -> RgbImage {
    stitch_horizontal(faces, FACE_PAD, 0)
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, shade: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([shade, 0, 0])))
    }

    #[test]
    fn test_horizontal_dimensions_and_placement() {
        let images = [solid(30, 40, 1), solid(20, 50, 2), solid(10, 10, 3)];
        let canvas = stitch_horizontal(&images, 10, 10);

        assert_eq!(canvas.width(), 30 + 20 + 10 + 4 * 10);
        assert_eq!(canvas.height(), 50 + 2 * 10);

        assert_eq!(canvas.get_pixel(0, 0), &BACKGROUND);
        assert_eq!(canvas.get_pixel(10, 10), &Rgb([1, 0, 0]));
        assert_eq!(canvas.get_pixel(50, 10), &Rgb([2, 0, 0]));
        assert_eq!(canvas.get_pixel(80, 10), &Rgb([3, 0, 0]));
        // shorter images leave the background below them
        assert_eq!(canvas.get_pixel(10, 55), &BACKGROUND);
    }

    #[test]
    fn test_vertical_dimensions_and_placement() {
        let images = [solid(30, 40, 1), solid(50, 20, 2)];
        let canvas = stitch_vertical(&images, 5, 3);

        assert_eq!(canvas.width(), 50 + 2 * 5);
        assert_eq!(canvas.height(), 40 + 20 + 3 * 3);
        assert_eq!(canvas.get_pixel(5, 3), &Rgb([1, 0, 0]));
        assert_eq!(canvas.get_pixel(5, 46), &Rgb([2, 0, 0]));
    }

    #[test]
    fn test_batch_of_three_is_one_strip() {
        let images = vec![solid(100, 140, 1); 3];
        let canvas = compose_batch(&images);
        assert_eq!(canvas.width(), 300 + 4 * 10);
        assert_eq!(canvas.height(), 140 + 2 * 10);
    }

    #[test]
    fn test_batch_of_seven_is_two_rows() {
        let images = vec![solid(100, 140, 1); 7];
        let canvas = compose_batch(&images);

        let top_width = 500 + 6 * 10;
        let row_height = 140 + 2 * 5;
        assert_eq!(canvas.width(), top_width);
        assert_eq!(canvas.height(), 2 * row_height);

        // second row holds two cards, the rest of it is background
        assert_eq!(canvas.get_pixel(10, row_height + 5), &Rgb([1, 0, 0]));
        assert_eq!(canvas.get_pixel(120, row_height + 5), &Rgb([1, 0, 0]));
        assert_eq!(canvas.get_pixel(400, row_height + 5), &BACKGROUND);
    }

    #[test]
    fn test_png_round_trip_keeps_dimensions() {
        let canvas = compose_faces(&[solid(8, 12, 9), solid(8, 12, 9)]);
        let bytes = encode_png(&canvas).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8 + 8 + 3 * 10, 12));
    }
}
