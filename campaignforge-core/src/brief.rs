//! Campaign Brief - Input Contract

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::ratios::RatioPolicy;

pub const DEFAULT_PRIMARY_COLOR: &str = "#FF5733";
pub const DEFAULT_SECONDARY_COLOR: &str = "#3498DB";
pub const DEFAULT_FONT_COLOR: &str = "#FFFFFF";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignBrief {
    pub campaign_id: String,
    #[serde(default)]
    pub campaign_name: Option<String>,
    #[serde(default)]
    pub campaign_message: String,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub brand_config: BrandConfig,
    #[serde(default)]
    pub aspect_ratios: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Product {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Raw brand settings. Colours stay optional so compliance can tell
/// "not configured" apart from "configured as the default".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandConfig {
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub secondary_color: Option<String>,
    #[serde(default)]
    pub font_color: Option<String>,
    #[serde(default)]
    pub logo_path: Option<PathBuf>,
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

impl BrandConfig {
    pub fn primary_or_default(&self) -> &str {
        self.primary_color.as_deref().unwrap_or(DEFAULT_PRIMARY_COLOR)
    }

    pub fn secondary_or_default(&self) -> &str {
        self.secondary_color.as_deref().unwrap_or(DEFAULT_SECONDARY_COLOR)
    }

    pub fn font_color_or_default(&self) -> &str {
        self.font_color.as_deref().unwrap_or(DEFAULT_FONT_COLOR)
    }

    /// Configured colours only, primary first.
    pub fn brand_colors(&self) -> Vec<String> {
        [&self.primary_color, &self.secondary_color]
            .into_iter()
            .flatten()
            .filter(|c| !c.trim().is_empty())
            .cloned()
            .collect()
    }
}

impl CampaignBrief {
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::input(format!("Campaign brief not readable: {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PipelineError::input(format!(
                "Campaign brief is not valid JSON: {}: {e}",
                path.display()
            ))
        })
    }

    pub fn display_name(&self) -> &str {
        self.campaign_name.as_deref().unwrap_or(&self.campaign_id)
    }

    /// Requested ratios, or every composable ratio.
    pub fn ratios(&self) -> Vec<String> {
        match &self.aspect_ratios {
            Some(r) if !r.is_empty() => r.clone(),
            _ => RatioPolicy::all_names().into_iter().map(String::from).collect(),
        }
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if !is_safe_component(&self.campaign_id) {
            return Err(PipelineError::input(format!(
                "campaign_id must be a non-empty path-safe name, got {:?}",
                self.campaign_id
            )));
        }
        if self.products.is_empty() {
            return Err(PipelineError::input("No products found in campaign brief"));
        }
        let mut seen = HashSet::new();
        for product in &self.products {
            if !is_safe_component(&product.id) {
                return Err(PipelineError::input(format!(
                    "product id must be a non-empty path-safe name, got {:?}",
                    product.id
                )));
            }
            if !seen.insert(product.id.as_str()) {
                return Err(PipelineError::input(format!("duplicate product id: {}", product.id)));
            }
        }
        if let Some(ratios) = &self.aspect_ratios {
            let mut seen = HashSet::new();
            for ratio in ratios {
                if !is_safe_component(ratio) {
                    return Err(PipelineError::input(format!(
                        "invalid aspect ratio name: {ratio:?}"
                    )));
                }
                // two entries would write the same output file
                if !seen.insert(ratio.as_str()) {
                    return Err(PipelineError::input(format!("duplicate aspect ratio: {ratio}")));
                }
            }
        }
        Ok(())
    }
}

/// Ids become directory and file names.
fn is_safe_component(value: &str) -> bool {
    !value.trim().is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CampaignBrief {
        serde_json::from_str(
            r##"{
                "campaign_id": "spring_fitness_2025",
                "campaign_name": "Spring Fitness",
                "campaign_message": "Get fit this spring",
                "products": [
                    {"id": "yoga_mat", "name": "Yoga Mat"},
                    {"id": "water_bottle"}
                ],
                "brand_config": {"primary_color": "#00AA55", "logo_path": "brand/logo.png"},
                "aspect_ratios": ["1x1", "16x9"]
            }"##,
        )
        .unwrap()
    }

    #[test]
    fn parses_brief_with_defaults() {
        let brief = sample();
        assert!(brief.validate().is_ok());
        assert_eq!(brief.ratios(), vec!["1x1", "16x9"]);
        assert_eq!(brief.products[1].display_name(), "water_bottle");
        assert_eq!(brief.brand_config.secondary_or_default(), DEFAULT_SECONDARY_COLOR);
        assert_eq!(brief.brand_config.brand_colors(), vec!["#00AA55"]);
    }

    #[test]
    fn missing_ratios_means_all() {
        let mut brief = sample();
        brief.aspect_ratios = None;
        assert_eq!(brief.ratios().len(), RatioPolicy::all_names().len());
    }

    #[test]
    fn rejects_empty_products() {
        let mut brief = sample();
        brief.products.clear();
        let err = brief.validate().unwrap_err();
        assert!(err.to_string().contains("No products"));
    }

    #[test]
    fn rejects_duplicate_and_unsafe_ids() {
        let mut brief = sample();
        brief.products[1].id = "yoga_mat".into();
        assert!(brief.validate().is_err());

        brief.products[1].id = "../escape".into();
        assert!(brief.validate().is_err());

        brief.products[1].id = "  ".into();
        assert!(brief.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_and_unsafe_ratios() {
        let mut brief = sample();
        brief.aspect_ratios = Some(vec!["1x1".into(), "16x9".into(), "1x1".into()]);
        let err = brief.validate().unwrap_err();
        assert_eq!(err.kind(), "input");
        assert!(err.to_string().contains("duplicate aspect ratio: 1x1"));

        brief.aspect_ratios = Some(vec!["1x1".into(), "../up".into()]);
        assert!(brief.validate().is_err());

        brief.aspect_ratios = Some(vec![]);
        assert!(brief.validate().is_ok());
    }

    #[test]
    fn load_reports_input_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = CampaignBrief::load(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(missing.kind(), "input");

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert_eq!(CampaignBrief::load(&bad).unwrap_err().kind(), "input");
    }
}
