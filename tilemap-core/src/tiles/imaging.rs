use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use tilemap_tile_utils::{Bbox, Format};

use crate::tiles::{TileError, TileResult};

fn image_format(format: Format) -> Option<ImageFormat> {
    match format {
        Format::Png => Some(ImageFormat::Png),
        Format::Jpeg => Some(ImageFormat::Jpeg),
        Format::Webp => Some(ImageFormat::WebP),
        Format::Gif => Some(ImageFormat::Gif),
        Format::Mvt | Format::Json => None,
    }
}

/// Reads the pixel size of an encoded raster tile without decoding the pixels.
#[must_use]
pub fn tile_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Decodes a raster tile stored as `format`.
pub fn decode_image(data: &[u8], format: Format) -> TileResult<DynamicImage> {
    let fmt = image_format(format).ok_or(TileError::UnsupportedTranscode(format, Format::Png))?;
    image::load_from_memory_with_format(data, fmt).map_err(|e| TileError::ImageDecodeError(e, format))
}

/// Encodes an image as `format`. `quality` only applies to JPEG.
pub fn encode_image(img: &DynamicImage, format: Format, quality: u8) -> TileResult<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        Format::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            img.to_rgb8()
                .write_with_encoder(encoder)
                .map_err(|e| TileError::ImageEncodeError(e, format))?;
        }
        Format::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut buf);
            img.to_rgba8()
                .write_with_encoder(encoder)
                .map_err(|e| TileError::ImageEncodeError(e, format))?;
        }
        Format::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| TileError::ImageEncodeError(e, format))?;
        }
        Format::Gif => {
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Gif)
                .map_err(|e| TileError::ImageEncodeError(e, format))?;
        }
        Format::Mvt | Format::Json => {
            return Err(TileError::UnsupportedTranscode(Format::Png, format));
        }
    }
    Ok(buf)
}

/// Converts a stored tile to the requested format.
///
/// Identical formats pass through untouched. Raster to raster conversions are
/// re-encoded, everything else is an [`TileError::UnsupportedTranscode`].
pub fn transcode(data: Vec<u8>, from: Format, to: Format, quality: u8) -> TileResult<Vec<u8>> {
    if from == to {
        return Ok(data);
    }
    if image_format(from).is_none() || image_format(to).is_none() {
        return Err(TileError::UnsupportedTranscode(from, to));
    }
    let img = decode_image(&data, from)?;
    encode_image(&img, to, quality)
}

/// An output image covering a Web Mercator extent that tiles are drawn onto.
#[derive(Debug)]
pub struct MapCanvas {
    image: RgbaImage,
    bbox: Bbox,
}

impl MapCanvas {
    /// Creates a canvas of `width` x `height` pixels filled with `background`.
    #[must_use]
    pub fn new(width: u32, height: u32, bbox: Bbox, background: Rgba<u8>) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, background),
            bbox,
        }
    }

    /// Canvas width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Canvas height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Draws a decoded tile covering `tile_bbox`, cropping the part outside the
    /// canvas and scaling the rest to the canvas resolution.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[allow(clippy::similar_names)]
    pub fn draw_tile(&mut self, tile_bbox: &Bbox, tile: &DynamicImage) {
        let Some(area) = tile_bbox.intersection(&self.bbox) else {
            return;
        };
        let (tw, th) = (f64::from(tile.width()), f64::from(tile.height()));

        // source pixels inside the tile
        let sx0 = ((area.min_x - tile_bbox.min_x) / tile_bbox.width() * tw).floor();
        let sx1 = ((area.max_x - tile_bbox.min_x) / tile_bbox.width() * tw).ceil();
        let sy0 = ((tile_bbox.max_y - area.max_y) / tile_bbox.height() * th).floor();
        let sy1 = ((tile_bbox.max_y - area.min_y) / tile_bbox.height() * th).ceil();

        // destination pixels on the canvas, both edges rounded so neighbours meet
        let (cw, ch) = (f64::from(self.width()), f64::from(self.height()));
        let dx0 = ((area.min_x - self.bbox.min_x) / self.bbox.width() * cw).round();
        let dx1 = ((area.max_x - self.bbox.min_x) / self.bbox.width() * cw).round();
        let dy0 = ((self.bbox.max_y - area.max_y) / self.bbox.height() * ch).round();
        let dy1 = ((self.bbox.max_y - area.min_y) / self.bbox.height() * ch).round();

        let src_w = (sx1 - sx0).clamp(1.0, tw) as u32;
        let src_h = (sy1 - sy0).clamp(1.0, th) as u32;
        let dst_w = (dx1 - dx0).min(cw - dx0);
        let dst_h = (dy1 - dy0).min(ch - dy0);
        if dst_w < 1.0 || dst_h < 1.0 {
            return;
        }

        let part = tile.crop_imm(sx0.max(0.0) as u32, sy0.max(0.0) as u32, src_w, src_h);
        let scaled = if part.width() == dst_w as u32 && part.height() == dst_h as u32 {
            part.to_rgba8()
        } else {
            imageops::resize(&part, dst_w as u32, dst_h as u32, FilterType::Triangle)
        };
        imageops::overlay(&mut self.image, &scaled, dx0 as i64, dy0 as i64);
    }

    /// Encodes the canvas as `format`.
    pub fn encode(self, format: Format, quality: u8) -> TileResult<Vec<u8>> {
        encode_image(&DynamicImage::ImageRgba8(self.image), format, quality)
    }

    /// The composed pixels.
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tilemap_tile_utils::{TileCoord, TileInfo, tile_bbox};

    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 4], format: Format) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)));
        encode_image(&img, format, 90).unwrap()
    }

    #[rstest]
    #[case(Format::Png)]
    #[case(Format::Jpeg)]
    #[case(Format::Webp)]
    #[case(Format::Gif)]
    fn encoded_images_are_detected(#[case] format: Format) {
        let data = solid(16, 8, [200, 10, 10, 255], format);
        assert_eq!(TileInfo::detect(&data).map(|v| v.format), Some(format));
        assert_eq!(tile_dimensions(&data), Some((16, 8)));
    }

    #[test]
    fn same_format_passes_through() {
        let data = vec![1, 2, 3];
        assert_eq!(transcode(data.clone(), Format::Mvt, Format::Mvt, 90).unwrap(), data);
    }

    #[test]
    fn png_to_jpeg() {
        let png = solid(8, 8, [0, 0, 255, 255], Format::Png);
        let jpg = transcode(png, Format::Png, Format::Jpeg, 90).unwrap();
        let img = decode_image(&jpg, Format::Jpeg).unwrap().to_rgb8();
        let px = img.get_pixel(4, 4);
        assert!(px[2] > 200 && px[0] < 40 && px[1] < 40, "{px:?}");
    }

    #[rstest]
    #[case(Format::Gif, Format::Png)]
    #[case(Format::Png, Format::Gif)]
    fn gif_transcodes(#[case] from: Format, #[case] to: Format) {
        let data = solid(8, 8, [255, 0, 0, 255], from);
        let out = transcode(data, from, to, 90).unwrap();
        assert_eq!(TileInfo::detect(&out).map(|v| v.format), Some(to));
        let px = *decode_image(&out, to).unwrap().to_rgba8().get_pixel(4, 4);
        assert!(px[0] > 200 && px[1] < 40 && px[2] < 40, "{px:?}");
    }

    #[rstest]
    #[case(Format::Mvt, Format::Png)]
    #[case(Format::Png, Format::Mvt)]
    #[case(Format::Json, Format::Gif)]
    fn unsupported_transcodes(#[case] from: Format, #[case] to: Format) {
        let err = transcode(vec![0], from, to, 90).unwrap_err();
        assert!(matches!(err, TileError::UnsupportedTranscode(f, t) if f == from && t == to));
    }

    #[test]
    fn canvas_of_one_tile() {
        let tile = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255])));
        let world = tile_bbox(TileCoord { z: 0, x: 0, y: 0 });
        let mut canvas = MapCanvas::new(8, 8, world, Rgba([255, 255, 255, 255]));
        canvas.draw_tile(&world, &tile);
        let img = canvas.into_image();
        assert!(img.pixels().all(|p| *p == Rgba([0, 255, 0, 255])));
    }

    #[test]
    fn canvas_keeps_background_outside_tiles() {
        let tile = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])));
        let world = Bbox::world();
        let mut canvas = MapCanvas::new(8, 8, world, Rgba([255, 255, 255, 255]));
        // north-west quarter of the world
        canvas.draw_tile(&tile_bbox(TileCoord { z: 1, x: 0, y: 0 }), &tile);
        let img = canvas.into_image();
        assert_eq!(*img.get_pixel(1, 1), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(6, 6), Rgba([255, 255, 255, 255]));
        assert_eq!(*img.get_pixel(6, 1), Rgba([255, 255, 255, 255]));
    }
}
