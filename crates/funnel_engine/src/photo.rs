//! Profile photo crop and normalization.
//!
//! Mirrors the funnel's browser-side canvas pipeline: a halving downscale
//! loop bounded by the size floor, exact scaling to the width cap, rotation
//! about the canvas center, and JPEG re-encoding of the result.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

#[derive(Debug, Clone, Copy)]
pub struct PhotoSettings {
    /// Floor for the shorter side of a normalized photo.
    pub min_size: u32,
    /// Cap for the width of a normalized photo.
    pub max_size: u32,
    pub jpeg_quality: u8,
}

impl Default for PhotoSettings {
    fn default() -> Self {
        Self {
            min_size: 320,
            max_size: 1500,
            jpeg_quality: 90,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PhotoError {
    #[error("failed to decode photo: {0}")]
    Decode(String),
    #[error("failed to encode photo: {0}")]
    Encode(String),
    #[error("crop rectangle is empty")]
    EmptyCrop,
}

/// Crop rectangle in pixels, relative to the rotated bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A re-encoded photo together with its pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedPhoto {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Scales a photo into the configured bounds and re-encodes it as JPEG.
///
/// Oversized photos are halved while the width stays at or above twice the
/// cap and halving cannot push the short side under the floor, then scaled to
/// exactly the cap width. Undersized photos are scaled up until the short
/// side meets the floor; for extreme aspect ratios the floor wins over the
/// cap. Photos already inside the bounds keep their dimensions.
pub fn optimize(bytes: &[u8], settings: &PhotoSettings) -> Result<ProcessedPhoto, PhotoError> {
    let mut img =
        image::load_from_memory(bytes).map_err(|err| PhotoError::Decode(err.to_string()))?;

    loop {
        let (width, height) = img.dimensions();
        let halvable =
            width >= 2 * settings.max_size && width.min(height) / 2 >= settings.min_size;
        if !halvable {
            break;
        }
        img = img.resize_exact((width / 2).max(1), (height / 2).max(1), FilterType::Triangle);
    }

    let (width, height) = img.dimensions();
    if width > settings.max_size {
        let scale = settings.max_size as f64 / width as f64;
        img = img.resize_exact(settings.max_size, scale_dim(height, scale), FilterType::Triangle);
    }

    let (width, height) = img.dimensions();
    if width.min(height) < settings.min_size {
        let scale = settings.min_size as f64 / width.min(height) as f64;
        let (target_w, target_h) = if width <= height {
            (settings.min_size, scale_dim(height, scale))
        } else {
            (scale_dim(width, scale), settings.min_size)
        };
        img = img.resize_exact(target_w, target_h, FilterType::Triangle);
    }

    let (width, height) = img.dimensions();
    let bytes = encode_jpeg(&img, settings.jpeg_quality)?;
    Ok(ProcessedPhoto {
        bytes,
        width,
        height,
    })
}

/// Axis-aligned bounding box of a `width` by `height` image rotated by
/// `degrees` about its center.
pub fn rotated_bounding_size(width: f64, height: f64, degrees: f64) -> (f64, f64) {
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    (
        (cos * width).abs() + (sin * height).abs(),
        (sin * width).abs() + (cos * height).abs(),
    )
}

/// Rotates a photo about its center, extracts `rect` from the rotated
/// bounding box, and re-encodes the result as JPEG.
///
/// The output is always exactly `rect.width` by `rect.height`; regions the
/// rotated photo does not cover come out black. Same blob, same rect, same
/// angle always produce identical bytes.
pub fn crop(
    bytes: &[u8],
    rect: CropRect,
    degrees: f64,
    settings: &PhotoSettings,
) -> Result<ProcessedPhoto, PhotoError> {
    if rect.width == 0 || rect.height == 0 {
        return Err(PhotoError::EmptyCrop);
    }
    let decoded =
        image::load_from_memory(bytes).map_err(|err| PhotoError::Decode(err.to_string()))?;
    let source = decoded.to_rgb8();
    let (source_w, source_h) = source.dimensions();

    let (bound_w, bound_h) = rotated_bounding_size(source_w as f64, source_h as f64, degrees);
    let canvas_w = (bound_w.round() as u32).max(1);
    let canvas_h = (bound_h.round() as u32).max(1);

    let canvas = render_rotated(&source, canvas_w, canvas_h, degrees);
    let output = extract_rect(&canvas, rect);

    let bytes = encode_jpeg(&DynamicImage::ImageRgb8(output), settings.jpeg_quality)?;
    Ok(ProcessedPhoto {
        bytes,
        width: rect.width,
        height: rect.height,
    })
}

fn scale_dim(dim: u32, scale: f64) -> u32 {
    ((dim as f64 * scale).round() as u32).max(1)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, PhotoError> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|err| PhotoError::Encode(err.to_string()))?;
    Ok(out)
}

fn render_rotated(source: &RgbImage, canvas_w: u32, canvas_h: u32, degrees: f64) -> RgbImage {
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let (source_w, source_h) = source.dimensions();
    let center_x = canvas_w as f64 / 2.0;
    let center_y = canvas_h as f64 / 2.0;
    let half_w = source_w as f64 / 2.0;
    let half_h = source_h as f64 / 2.0;

    let mut canvas = RgbImage::new(canvas_w, canvas_h);
    for y in 0..canvas_h {
        for x in 0..canvas_w {
            // Pixel centers sit at half-integer coordinates; the half-pixel
            // shifts keep axis-aligned rotations exact.
            let dx = x as f64 + 0.5 - center_x;
            let dy = y as f64 + 0.5 - center_y;
            // Inverse of: translate to the canvas center, rotate, translate
            // back by the source half-dimensions.
            let sx = cos * dx + sin * dy + half_w - 0.5;
            let sy = -sin * dx + cos * dy + half_h - 0.5;
            if let Some(pixel) = sample_bilinear(source, sx, sy) {
                canvas.put_pixel(x, y, pixel);
            }
        }
    }
    canvas
}

fn sample_bilinear(source: &RgbImage, x: f64, y: f64) -> Option<Rgb<u8>> {
    let (width, height) = source.dimensions();
    // Rotation matrix noise can land a sample a few ulps outside the source;
    // snap those back instead of rejecting them.
    let x = snap_to_edge(x, (width - 1) as f64);
    let y = snap_to_edge(y, (height - 1) as f64);
    if x < 0.0 || y < 0.0 || x > (width - 1) as f64 || y > (height - 1) as f64 {
        return None;
    }

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = source.get_pixel(x0, y0).0;
    let p10 = source.get_pixel(x1, y0).0;
    let p01 = source.get_pixel(x0, y1).0;
    let p11 = source.get_pixel(x1, y1).0;

    let mut blended = [0u8; 3];
    for channel in 0..3 {
        let top = p00[channel] as f64 * (1.0 - fx) + p10[channel] as f64 * fx;
        let bottom = p01[channel] as f64 * (1.0 - fx) + p11[channel] as f64 * fx;
        blended[channel] = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
    Some(Rgb(blended))
}

fn snap_to_edge(value: f64, limit: f64) -> f64 {
    const EDGE_EPS: f64 = 1e-9;
    if value < 0.0 && value > -EDGE_EPS {
        return 0.0;
    }
    if value > limit && value < limit + EDGE_EPS {
        return limit;
    }
    value
}

// Canvas-style extraction: the output is exactly the rect size and reads
// black wherever the rect hangs past the canvas.
fn extract_rect(canvas: &RgbImage, rect: CropRect) -> RgbImage {
    let (canvas_w, canvas_h) = canvas.dimensions();
    let mut out = RgbImage::new(rect.width, rect.height);
    for y in 0..rect.height {
        for x in 0..rect.width {
            // Sums widen to u64 so an origin near u32::MAX reads as past
            // the canvas instead of wrapping.
            let source_x = rect.x as u64 + x as u64;
            let source_y = rect.y as u64 + y as u64;
            if source_x < canvas_w as u64 && source_y < canvas_h as u64 {
                out.put_pixel(x, y, *canvas.get_pixel(source_x as u32, source_y as u32));
            }
        }
    }
    out
}
