//! Logo Compositor
//!
//! The sprite is decoded and resized once, then shared read-only across
//! every variation of the run.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::observer::{PipelineEvent, PipelineObserver};

pub const MAX_LOGO_SIDE: u32 = 150;
pub const LOGO_PADDING: i64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogoCorner {
    #[default]
    TopRight,
    TopLeft,
    BottomRight,
    BottomLeft,
}

impl FromStr for LogoCorner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top-right" => Ok(Self::TopRight),
            "top-left" => Ok(Self::TopLeft),
            "bottom-right" => Ok(Self::BottomRight),
            "bottom-left" => Ok(Self::BottomLeft),
            other => Err(format!("unknown logo corner: {other}")),
        }
    }
}

/// Result of a logo pass; `Skipped` hands back the input untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum LogoOverlay {
    Applied(RgbaImage),
    Skipped(RgbaImage),
}

impl LogoOverlay {
    pub fn is_applied(&self) -> bool {
        matches!(self, LogoOverlay::Applied(_))
    }

    pub fn into_image(self) -> RgbaImage {
        match self {
            LogoOverlay::Applied(img) | LogoOverlay::Skipped(img) => img,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogoCompositor {
    sprite: Option<RgbaImage>,
}

impl LogoCompositor {
    /// Load the brand logo. Any failure leaves the compositor empty.
    pub fn load(path: Option<&Path>, observer: &dyn PipelineObserver) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        if !path.exists() {
            observer.on_event(&PipelineEvent::LogoUnavailable {
                reason: format!("logo not found: {}", path.display()),
            });
            return Self::default();
        }
        match image::open(path) {
            Ok(img) => {
                let sprite = fit_sprite(img.to_rgba8());
                observer.on_event(&PipelineEvent::LogoLoaded {
                    path: path.to_path_buf(),
                    width: sprite.width(),
                    height: sprite.height(),
                });
                Self::from_sprite(sprite)
            }
            Err(e) => {
                observer.on_event(&PipelineEvent::LogoUnavailable {
                    reason: format!("failed to load logo {}: {e}", path.display()),
                });
                Self::default()
            }
        }
    }

    /// Use an already prepared sprite as-is.
    pub fn from_sprite(sprite: RgbaImage) -> Self {
        Self {
            sprite: Some(sprite),
        }
    }

    pub fn has_logo(&self) -> bool {
        self.sprite.is_some()
    }

    pub fn sprite(&self) -> Option<&RgbaImage> {
        self.sprite.as_ref()
    }

    pub fn placement(&self, width: u32, height: u32, corner: LogoCorner) -> Option<(i64, i64)> {
        let sprite = self.sprite.as_ref()?;
        let right = width as i64 - sprite.width() as i64 - LOGO_PADDING;
        let bottom = height as i64 - sprite.height() as i64 - LOGO_PADDING;
        Some(match corner {
            LogoCorner::TopRight => (right, LOGO_PADDING),
            LogoCorner::TopLeft => (LOGO_PADDING, LOGO_PADDING),
            LogoCorner::BottomRight => (right, bottom),
            LogoCorner::BottomLeft => (LOGO_PADDING, bottom),
        })
    }

    pub fn overlay(&self, image: RgbaImage, corner: LogoCorner) -> LogoOverlay {
        let placement = self.placement(image.width(), image.height(), corner);
        let (Some(sprite), Some((x, y))) = (self.sprite.as_ref(), placement) else {
            return LogoOverlay::Skipped(image);
        };
        let mut canvas = image;
        imageops::overlay(&mut canvas, sprite, x, y);
        LogoOverlay::Applied(canvas)
    }
}

/// Scale so the longest side is `MAX_LOGO_SIDE`.
fn fit_sprite(logo: RgbaImage) -> RgbaImage {
    let (w, h) = logo.dimensions();
    let ratio = (MAX_LOGO_SIDE as f64 / w as f64).min(MAX_LOGO_SIDE as f64 / h as f64);
    let nw = ((w as f64 * ratio) as u32).max(1);
    let nh = ((h as f64 * ratio) as u32).max(1);
    if (nw, nh) == (w, h) {
        return logo;
    }
    imageops::resize(&logo, nw, nh, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::testing::RecordingObserver;
    use crate::observer::NullObserver;
    use image::Rgba;

    fn base() -> RgbaImage {
        RgbaImage::from_pixel(400, 300, Rgba([20, 40, 60, 255]))
    }

    #[test]
    fn no_logo_is_an_observable_no_op() {
        let compositor = LogoCompositor::load(None, &NullObserver);
        let out = compositor.overlay(base(), LogoCorner::TopRight);
        assert!(!out.is_applied());
        assert_eq!(out.into_image(), base());
    }

    #[test]
    fn missing_file_is_reported_and_skipped() {
        let observer = RecordingObserver::default();
        let compositor = LogoCompositor::load(Some(Path::new("/nonexistent/logo.png")), &observer);
        assert!(!compositor.has_logo());
        assert!(matches!(
            observer.take().as_slice(),
            [PipelineEvent::LogoUnavailable { .. }]
        ));
    }

    #[test]
    fn sprite_is_fit_to_max_side() {
        let wide = fit_sprite(RgbaImage::new(600, 200));
        assert_eq!(wide.dimensions(), (150, 50));
        let small = fit_sprite(RgbaImage::new(30, 60));
        assert_eq!(small.dimensions(), (75, 150));
    }

    #[test]
    fn corners_are_padded() {
        let compositor = LogoCompositor::from_sprite(RgbaImage::new(50, 20));
        assert_eq!(compositor.placement(400, 300, LogoCorner::TopRight), Some((320, 30)));
        assert_eq!(compositor.placement(400, 300, LogoCorner::TopLeft), Some((30, 30)));
        assert_eq!(compositor.placement(400, 300, LogoCorner::BottomRight), Some((320, 250)));
        assert_eq!(compositor.placement(400, 300, LogoCorner::BottomLeft), Some((30, 250)));
    }

    #[test]
    fn alpha_is_respected() {
        let mut sprite = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        sprite.put_pixel(0, 0, Rgba([255, 0, 0, 0]));
        let compositor = LogoCompositor::from_sprite(sprite);
        let out = compositor.overlay(base(), LogoCorner::TopLeft);
        assert!(out.is_applied());
        let img = out.into_image();
        assert_eq!(img.get_pixel(30, 30), &Rgba([20, 40, 60, 255]));
        assert_eq!(img.get_pixel(31, 31), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(29, 29), &Rgba([20, 40, 60, 255]));
    }
}
