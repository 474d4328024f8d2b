//! Pipeline configuration
//!
//! File values are the base; the CLI layers `CAMPAIGNFORGE_*` environment
//! variables and flags on top before calling `validate`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::composer::ComposerSettings;
use crate::error::{PipelineError, PipelineResult};
use crate::logo::LogoCorner;
use crate::raster::OutputFormat;
use crate::text::TextPosition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Products composed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Ratio used when requesting a missing hero image.
    #[serde(default = "default_generation_ratio")]
    pub generation_ratio: String,
    #[serde(default)]
    pub skip_generation: bool,
    #[serde(default)]
    pub skip_compliance: bool,
    /// Fall back to the offline placeholder when no provider is injected.
    #[serde(default = "default_true")]
    pub placeholder_generation: bool,
    #[serde(default)]
    pub logo_corner: LogoCorner,
    #[serde(default)]
    pub text_position: TextPosition,
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("input_assets")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_workers() -> usize {
    3
}

fn default_generation_ratio() -> String {
    "16x9".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            output_dir: default_output_dir(),
            workers: default_workers(),
            output_format: OutputFormat::default(),
            generation_ratio: default_generation_ratio(),
            skip_generation: false,
            skip_compliance: false,
            placeholder_generation: true,
            logo_corner: LogoCorner::default(),
            text_position: TextPosition::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::input(format!("Config not readable: {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PipelineError::input(format!("Config is not valid JSON: {}: {e}", path.display()))
        })
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.workers == 0 {
            return Err(PipelineError::input("workers must be at least 1"));
        }
        if self.generation_ratio.trim().is_empty() {
            return Err(PipelineError::input("generation_ratio must not be empty"));
        }
        Ok(())
    }

    pub fn composer_settings(&self) -> ComposerSettings {
        ComposerSettings {
            text_position: self.text_position,
            logo_corner: self.logo_corner,
            output_format: self.output_format,
        }
    }

    /// `<output_dir>/<campaign_id>`
    pub fn campaign_output(&self, campaign_id: &str) -> PathBuf {
        self.output_dir.join(campaign_id)
    }
}
