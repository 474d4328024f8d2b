//! Image decode and atomic encode to disk.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{PipelineError, PipelineResult};

const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpg),
            other => Err(format!("unsupported output format: {other}")),
        }
    }
}

/// Decode a file into an opaque RGBA working copy (alpha is dropped, as for RGB sources).
pub fn decode_opaque(path: &Path) -> PipelineResult<RgbaImage> {
    let img = open(path)?;
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()).to_rgba8())
}

pub fn decode_rgb(path: &Path) -> PipelineResult<RgbImage> {
    Ok(open(path)?.to_rgb8())
}

fn open(path: &Path) -> PipelineResult<DynamicImage> {
    image::open(path).map_err(|source| PipelineError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Encode to memory, write to a sibling temp file, then rename into place.
pub fn write_atomic(image: &RgbaImage, path: &Path, format: OutputFormat) -> PipelineResult<()> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut buf = Vec::new();
    let encoded = match format {
        OutputFormat::Png => rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png),
        OutputFormat::Jpg => {
            JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(&rgb)
        }
    };
    encoded.map_err(|source| PipelineError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    write_through_temp(path, |file| file.write_all(&buf))
}

/// Fill a sibling temp file, then rename it over `path`.
/// The temp file never outlives a failure.
fn write_through_temp(
    path: &Path,
    fill: impl FnOnce(&mut File) -> std::io::Result<()>,
) -> PipelineResult<()> {
    let tmp = temp_sibling(path);
    let mut file = File::create(&tmp).map_err(|e| PipelineError::write(&tmp, e))?;
    let filled = fill(&mut file).and_then(|()| file.sync_all());
    drop(file);
    if let Err(e) = filled {
        let _ = std::fs::remove_file(&tmp);
        return Err(PipelineError::write(&tmp, e));
    }
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        PipelineError::write(path, e)
    })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}
