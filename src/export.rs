//! Write an accumulated image to disk.
//!
//! The format follows the extension: `.exr` keeps full 32-bit float RGBA,
//! `.hdr` writes Radiance RGB, anything else becomes an 8-bit sRGB PNG.

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, Rgba};
use std::path::Path;

use crate::util::{Error, Result};

/// Output encoding picked from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Exr,
    Hdr,
    Png,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("exr") => ExportFormat::Exr,
            Some("hdr") => ExportFormat::Hdr,
            _ => ExportFormat::Png,
        }
    }
}

/// Linear to sRGB transfer, clamped to `[0, 1]`.
pub fn linear_to_srgb(v: f32) -> f32 {
    let v = v.clamp(0.0, 1.0);
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

/// Save `width × height` linear RGBA pixels, row-major from the top-left.
#[tracing::instrument(skip(path, pixels), fields(path = %path.as_ref().display()))]
pub fn save_image(path: impl AsRef<Path>, width: u32, height: u32, pixels: &[[f32; 4]]) -> Result<()> {
    let path = path.as_ref();
    if pixels.len() != width as usize * height as usize {
        return Err(Error::Export(format!(
            "{} pixels for a {width}x{height} image",
            pixels.len()
        )));
    }

    let format = ExportFormat::from_path(path);
    let image = match format {
        ExportFormat::Exr => {
            let raw: Vec<f32> = pixels.iter().flatten().copied().collect();
            ImageBuffer::<Rgba<f32>, _>::from_raw(width, height, raw).map(DynamicImage::ImageRgba32F)
        }
        ExportFormat::Hdr => {
            let raw: Vec<f32> = pixels.iter().flat_map(|p| [p[0], p[1], p[2]]).collect();
            ImageBuffer::<Rgb<f32>, _>::from_raw(width, height, raw).map(DynamicImage::ImageRgb32F)
        }
        ExportFormat::Png => {
            let raw: Vec<u8> = pixels
                .iter()
                .flat_map(|p| {
                    [
                        to_u8(linear_to_srgb(p[0])),
                        to_u8(linear_to_srgb(p[1])),
                        to_u8(linear_to_srgb(p[2])),
                        to_u8(p[3].clamp(0.0, 1.0)),
                    ]
                })
                .collect();
            ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, raw).map(DynamicImage::ImageRgba8)
        }
    }
    .ok_or_else(|| Error::Export("pixel buffer does not match dimensions".into()))?;

    let image_format = match format {
        ExportFormat::Exr => ImageFormat::OpenExr,
        ExportFormat::Hdr => ImageFormat::Hdr,
        ExportFormat::Png => ImageFormat::Png,
    };
    image
        .save_with_format(path, image_format)
        .map_err(|e| Error::Export(format!("{}: {e}", path.display())))?;

    tracing::info!(?format, width, height, "image exported");
    Ok(())
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round() as u8
}
