//! Cover-fit geometry
//!
//! Scale so the source covers the target box, then center-crop the excess.
//! The plan is plain integer math so it can be checked without pixels.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::Serialize;

use crate::ratios::{Dimensions, RatioPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoverFit {
    pub scaled: Dimensions,
    pub crop_x: u32,
    pub crop_y: u32,
    pub target: Dimensions,
}

impl CoverFit {
    pub fn compute(source: Dimensions, target: Dimensions) -> Self {
        let (sw, sh) = (source.width.max(1) as u64, source.height.max(1) as u64);
        let (tw, th) = (target.width as u64, target.height as u64);

        // sw/sh > tw/th, cross-multiplied to stay exact
        let scaled = if sw * th > tw * sh {
            Dimensions::new(((sw * th) / sh).max(tw) as u32, target.height)
        } else {
            Dimensions::new(target.width, ((sh * tw) / sw).max(th) as u32)
        };

        Self {
            scaled,
            crop_x: (scaled.width - target.width) / 2,
            crop_y: (scaled.height - target.height) / 2,
            target,
        }
    }

    pub fn apply(&self, image: &RgbaImage) -> RgbaImage {
        let resized = if image.dimensions() == (self.scaled.width, self.scaled.height) {
            image.clone()
        } else {
            imageops::resize(image, self.scaled.width, self.scaled.height, FilterType::Lanczos3)
        };
        imageops::crop_imm(
            &resized,
            self.crop_x,
            self.crop_y,
            self.target.width,
            self.target.height,
        )
        .to_image()
    }
}

/// Resize and crop to exactly the ratio's output size.
pub fn resize_for_ratio(image: &RgbaImage, ratio: &str) -> RgbaImage {
    let target = RatioPolicy::output_size(ratio);
    let source = Dimensions::new(image.width(), image.height());
    CoverFit::compute(source, target).apply(image)
}
