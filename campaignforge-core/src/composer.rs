//! Creative Composer - Per-Product Variation Runs
//!
//! geometry -> text -> logo, once per requested ratio, written to
//! `<output_root>/<product_id>/<ratio>.<ext>`.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::brief::BrandConfig;
use crate::cancel::CancelToken;
use crate::error::{PipelineError, PipelineResult};
use crate::fonts::{resolve_or_builtin, FontResolver};
use crate::geometry;
use crate::logo::{LogoCompositor, LogoCorner, LogoOverlay};
use crate::observer::{PipelineEvent, SharedObserver};
use crate::raster::{self, OutputFormat};
use crate::ratios::RatioPolicy;
use crate::text::{TextLayoutEngine, TextPosition, TextStyle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerSettings {
    #[serde(default)]
    pub text_position: TextPosition,
    #[serde(default)]
    pub logo_corner: LogoCorner,
    #[serde(default)]
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationArtifact {
    pub product_id: String,
    pub ratio: String,
    pub path: PathBuf,
    pub logo_applied: bool,
}

pub struct CreativeComposer {
    text: TextLayoutEngine,
    logo: LogoCompositor,
    settings: ComposerSettings,
    observer: SharedObserver,
}

impl CreativeComposer {
    /// Resolve the font, parse brand colours and load the logo once for the run.
    pub fn new(
        brand: &BrandConfig,
        fonts: &dyn FontResolver,
        settings: ComposerSettings,
        observer: SharedObserver,
    ) -> Self {
        let face = resolve_or_builtin(fonts, observer.as_ref());
        let style = TextStyle::resolve(
            brand.primary_or_default(),
            brand.font_color_or_default(),
            observer.as_ref(),
        );
        let logo = LogoCompositor::load(brand.logo_path.as_deref(), observer.as_ref());
        Self::from_parts(TextLayoutEngine::new(face, style), logo, settings, observer)
    }

    pub fn from_parts(
        text: TextLayoutEngine,
        logo: LogoCompositor,
        settings: ComposerSettings,
        observer: SharedObserver,
    ) -> Self {
        Self {
            text,
            logo,
            settings,
            observer,
        }
    }

    pub fn settings(&self) -> ComposerSettings {
        self.settings
    }

    pub fn has_logo(&self) -> bool {
        self.logo.has_logo()
    }

    pub fn text_engine(&self) -> &TextLayoutEngine {
        &self.text
    }

    pub fn resize_for_ratio(&self, image: &RgbaImage, ratio: &str) -> RgbaImage {
        geometry::resize_for_ratio(image, ratio)
    }

    pub fn add_text_overlay(
        &self,
        image: &RgbaImage,
        text: &str,
        position: TextPosition,
    ) -> RgbaImage {
        self.text.overlay_text(image, text, position)
    }

    pub fn add_logo_overlay(&self, image: RgbaImage, corner: LogoCorner) -> LogoOverlay {
        self.logo.overlay(image, corner)
    }

    /// One finished variation in memory.
    pub fn compose(&self, base: &RgbaImage, message: &str, ratio: &str) -> LogoOverlay {
        let resized = self.resize_for_ratio(base, ratio);
        let with_text = self.add_text_overlay(&resized, message, self.settings.text_position);
        self.add_logo_overlay(with_text, self.settings.logo_corner)
    }

    /// Write every requested ratio for one product, in order.
    ///
    /// Stops at the first failure or at a cancellation seen between ratios;
    /// files already written stay complete, later ratios are never started.
    pub fn create_variations(
        &self,
        base_image: &Path,
        message: &str,
        product_id: &str,
        output_root: &Path,
        ratios: Option<&[String]>,
        cancel: &CancelToken,
    ) -> PipelineResult<Vec<VariationArtifact>> {
        let ratios: Vec<String> = match ratios {
            Some(r) => r.to_vec(),
            None => RatioPolicy::all_names().into_iter().map(String::from).collect(),
        };

        let base = raster::decode_opaque(base_image)?;
        let product_dir = output_root.join(product_id);
        std::fs::create_dir_all(&product_dir).map_err(|e| PipelineError::write(&product_dir, e))?;

        let ext = self.settings.output_format.extension();
        let mut artifacts = Vec::with_capacity(ratios.len());

        for (done, ratio) in ratios.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled {
                    completed: done,
                    requested: ratios.len(),
                });
            }
            self.observer.on_event(&PipelineEvent::VariationStarted {
                product_id: product_id.to_string(),
                ratio: ratio.clone(),
            });

            let composed = self.compose(&base, message, ratio);
            let logo_applied = composed.is_applied();
            if !logo_applied {
                self.observer.on_event(&PipelineEvent::LogoSkipped {
                    product_id: product_id.to_string(),
                    ratio: ratio.clone(),
                });
            }

            let path = product_dir.join(format!("{ratio}.{ext}"));
            raster::write_atomic(&composed.into_image(), &path, self.settings.output_format)?;

            self.observer.on_event(&PipelineEvent::VariationWritten {
                product_id: product_id.to_string(),
                ratio: ratio.clone(),
                path: path.clone(),
            });
            artifacts.push(VariationArtifact {
                product_id: product_id.to_string(),
                ratio: ratio.clone(),
                path,
                logo_applied,
            });
        }

        Ok(artifacts)
    }
}
