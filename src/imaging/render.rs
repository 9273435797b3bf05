//! Decode, orient, resize and re-encode with the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with format sniffing |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality honored) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → WebP | `webp::Encoder` (libwebp, lossy, quality honored) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |

use std::io::Cursor;

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};

use super::dimensions::{oriented_dimensions, target_dimensions};
use super::{OutputFormat, RenderError, RenditionSpec};

const AVIF_SPEED: u8 = 6;

/// Header facts about a source image, read without decoding pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    /// Stored width, before orientation is applied
    pub width: u32,
    /// Stored height, before orientation is applied
    pub height: u32,
    pub orientation: Orientation,
}

impl SourceInfo {
    /// Dimensions as displayed
    pub fn oriented(&self) -> (u32, u32) {
        oriented_dimensions((self.width, self.height), self.orientation)
    }
}

/// An encoded rendition
#[derive(Debug, Clone)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, RenderError> {
    if bytes.is_empty() {
        return Err(RenderError::EmptySource);
    }
    Ok(ImageReader::new(Cursor::new(bytes)).with_guessed_format()?)
}

/// Read dimensions and orientation from the image header.
pub fn probe(bytes: &[u8]) -> Result<SourceInfo, RenderError> {
    let mut decoder = reader(bytes)?.into_decoder()?;
    let (width, height) = decoder.dimensions();
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    Ok(SourceInfo {
        width,
        height,
        orientation,
    })
}

/// Produce one rendition of `bytes`.
///
/// The embedded orientation is applied first, so the long edge and the output
/// are upright. The output is never larger than the oriented source.
pub fn render_rendition(bytes: &[u8], spec: &RenditionSpec) -> Result<Rendered, RenderError> {
    let mut decoder = reader(bytes)?.into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);

    let source = (img.width(), img.height());
    let (width, height) = target_dimensions(source, spec.long_edge);
    let resized = if (width, height) == source {
        img
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    };

    let bytes = encode(&resized, spec.format, spec.quality)?;
    Ok(Rendered {
        bytes,
        width,
        height,
    })
}

fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, RenderError> {
    let quality = quality.clamp(1, 100);
    let mut buf = Vec::new();

    match format {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
        OutputFormat::Png => {
            img.write_with_encoder(PngEncoder::new(&mut buf))?;
        }
        OutputFormat::Webp => return encode_webp(img, quality),
        OutputFormat::Avif => {
            let encoder = AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, quality);
            eight_bit(img).write_with_encoder(encoder)?;
        }
    }

    Ok(buf)
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, RenderError> {
    let quality = f32::from(quality);
    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
            .encode_simple(false, quality)
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
            .encode_simple(false, quality)
    };

    let encoded = encoded.map_err(|err| RenderError::Encode(format!("webp: {err:?}")))?;
    Ok(encoded.to_vec())
}

// The AVIF encoder only accepts 8-bit RGB(A)
fn eight_bit(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

/// MIME type of the encoded bytes, `application/octet-stream` when unknown.
pub fn sniff_content_type(bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| mime::APPLICATION_OCTET_STREAM.to_string())
}
