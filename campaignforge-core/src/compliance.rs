//! Compliance Engine - Tri-State Checks
//!
//! Each check answers `Some(true)`, `Some(false)` or `None` (could not be
//! checked, with a reason). Only a definitive `Some(false)` can fail the
//! overall verdict; an unconfigured check always passes.

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::brief::BrandConfig;
use crate::color::{any_pixel_within, parse_hex, Rgb};
use crate::composer::VariationArtifact;
use crate::observer::{PipelineEvent, SharedObserver};
use crate::raster;

pub const LOGO_COLOR_SAMPLES: usize = 10;
pub const LOGO_COLOR_DISTANCE: u32 = 50;
pub const LOGO_MAX_WIDTH_FRACTION: f64 = 0.3;
pub const LOGO_CONFIDENCE_THRESHOLD: f64 = 0.5;
pub const BRAND_COLOR_DISTANCE: u32 = 80;
pub const WCAG_AA: f64 = 4.5;
pub const WCAG_AAA: f64 = 7.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    High,
    Medium,
    Low,
}

use ViolationSeverity::{High, Low, Medium};

/// Matched case-insensitively as substrings, so "cure" also flags "secure".
pub const PROHIBITED_TERMS: &[(&str, ViolationSeverity)] = &[
    ("free", High),
    ("guarantee", High),
    ("guaranteed", High),
    ("miracle", High),
    ("cure", High),
    ("cures", High),
    ("certified", Medium),
    ("approved", Medium),
    ("winner", Medium),
    ("best", Medium),
    ("number one", Medium),
    ("#1", Medium),
    ("risk-free", High),
    ("no risk", High),
    ("proven", High),
    ("scientific breakthrough", High),
    ("secret", Low),
    ("banned", Low),
    ("illegal", High),
    ("FDA approved", High),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LegalViolation {
    pub term: String,
    pub reason: String,
    pub severity: ViolationSeverity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LegalContentResult {
    pub compliant: bool,
    pub violations: Vec<LegalViolation>,
    pub text_checked: String,
}

impl LegalContentResult {
    pub fn terms(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.term.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogoPresenceResult {
    pub detected: Option<bool>,
    pub confidence: f64,
    pub colors_sampled: usize,
    pub colors_matched: usize,
    pub message: String,
}

impl LogoPresenceResult {
    fn inconclusive(message: impl Into<String>) -> Self {
        Self {
            detected: None,
            confidence: 0.0,
            colors_sampled: 0,
            colors_matched: 0,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrandColorResult {
    pub compliant: Option<bool>,
    pub brand_colors_checked: Vec<String>,
    pub colors_detected: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_colors: Vec<String>,
    pub detection_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BrandColorResult {
    fn inconclusive(checked: &[String], message: impl Into<String>) -> Self {
        Self {
            compliant: None,
            brand_colors_checked: checked.to_vec(),
            colors_detected: vec![],
            invalid_colors: vec![],
            detection_rate: 0.0,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContrastResult {
    /// Rounded to two decimals for display; pass flags use the exact ratio.
    pub ratio: f64,
    pub passes_aa: bool,
    pub passes_aaa: bool,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceChecks {
    pub legal_content: LegalContentResult,
    pub logo_presence: LogoPresenceResult,
    pub brand_colors: BrandColorResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceReport {
    pub image: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub checks: ComplianceChecks,
    pub overall_compliant: bool,
}

/// Inconclusive results pass; only a definitive `false` fails.
pub fn overall_compliant(legal_ok: bool, logo: Option<bool>, colors: Option<bool>) -> bool {
    legal_ok && logo != Some(false) && colors != Some(false)
}

pub fn check_legal_content(text: &str) -> LegalContentResult {
    let lowered = text.to_lowercase();
    let violations: Vec<LegalViolation> = PROHIBITED_TERMS
        .iter()
        .filter(|(term, _)| lowered.contains(&term.to_lowercase()))
        .map(|(term, severity)| LegalViolation {
            term: term.to_string(),
            reason: "Prohibited marketing claim".to_string(),
            severity: *severity,
        })
        .collect();

    LegalContentResult {
        compliant: violations.is_empty(),
        violations,
        text_checked: text.to_string(),
    }
}

/// Colour-signature heuristic: do the logo's leading distinct colours occur in the image?
pub fn logo_presence(image: &RgbImage, template: &RgbImage) -> LogoPresenceResult {
    if template.width() as f64 >= image.width() as f64 * LOGO_MAX_WIDTH_FRACTION {
        return LogoPresenceResult::inconclusive("Logo template too large for detection");
    }

    let distinct: BTreeSet<[u8; 3]> = template.pixels().map(|p| p.0).collect();
    let sampled: Vec<[u8; 3]> = distinct.into_iter().take(LOGO_COLOR_SAMPLES).collect();
    if sampled.is_empty() {
        return LogoPresenceResult::inconclusive("Logo template has no pixels");
    }

    let matched = sampled
        .iter()
        .filter(|&&c| any_pixel_within(image, c, LOGO_COLOR_DISTANCE))
        .count();
    let confidence = matched as f64 / sampled.len() as f64;
    let detected = confidence > LOGO_CONFIDENCE_THRESHOLD;

    LogoPresenceResult {
        detected: Some(detected),
        confidence,
        colors_sampled: sampled.len(),
        colors_matched: matched,
        message: if detected {
            "Logo likely present".to_string()
        } else {
            "Logo may not be present".to_string()
        },
    }
}

pub fn brand_color_presence(image: &RgbImage, colors: &[String]) -> BrandColorResult {
    if colors.is_empty() {
        return BrandColorResult::inconclusive(colors, "No brand colors configured for checking");
    }

    let mut detected = Vec::new();
    let mut invalid = Vec::new();
    let mut valid = 0usize;
    for hex in colors {
        match parse_hex(hex) {
            Ok(Rgb(rgb)) => {
                valid += 1;
                if any_pixel_within(image, rgb, BRAND_COLOR_DISTANCE) {
                    detected.push(hex.clone());
                }
            }
            Err(_) => invalid.push(hex.clone()),
        }
    }

    if valid == 0 {
        let mut result =
            BrandColorResult::inconclusive(colors, "No parseable brand colors configured");
        result.invalid_colors = invalid;
        return result;
    }

    BrandColorResult {
        compliant: Some(!detected.is_empty()),
        brand_colors_checked: colors.to_vec(),
        detection_rate: detected.len() as f64 / valid as f64,
        colors_detected: detected,
        invalid_colors: invalid,
        message: None,
    }
}

/// WCAG relative luminance of an sRGB colour.
pub fn relative_luminance(color: Rgb) -> f64 {
    let linear = |c: u8| {
        let c = c as f64 / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    let [r, g, b] = color.0;
    0.2126 * linear(r) + 0.7152 * linear(g) + 0.0722 * linear(b)
}

pub fn contrast_ratio(a: Rgb, b: Rgb) -> f64 {
    let (la, lb) = (relative_luminance(a), relative_luminance(b));
    let (lighter, darker) = if la > lb { (la, lb) } else { (lb, la) };
    (lighter + 0.05) / (darker + 0.05)
}

pub fn check_text_contrast(text: Rgb, background: Rgb) -> ContrastResult {
    let ratio = contrast_ratio(text, background);
    ContrastResult {
        ratio: (ratio * 100.0).round() / 100.0,
        passes_aa: ratio >= WCAG_AA,
        passes_aaa: ratio >= WCAG_AAA,
        recommendation: if ratio >= WCAG_AA {
            "Compliant".to_string()
        } else {
            "Increase contrast".to_string()
        },
    }
}

enum LogoTemplate {
    NotConfigured,
    Unavailable(String),
    Loaded(RgbImage),
}

pub struct ComplianceEngine {
    brand_colors: Vec<String>,
    logo: LogoTemplate,
    observer: SharedObserver,
}

impl ComplianceEngine {
    pub fn new(brand: &BrandConfig, observer: SharedObserver) -> Self {
        let logo = match brand.logo_path.as_deref() {
            None => LogoTemplate::NotConfigured,
            Some(path) if !path.exists() => LogoTemplate::Unavailable(
                "Logo template not available for checking".to_string(),
            ),
            Some(path) => match raster::decode_rgb(path) {
                Ok(img) => LogoTemplate::Loaded(img),
                Err(e) => LogoTemplate::Unavailable(format!("Error loading logo template: {e}")),
            },
        };
        Self {
            brand_colors: brand.brand_colors(),
            logo,
            observer,
        }
    }

    pub fn check_legal_content(&self, text: &str) -> LegalContentResult {
        let result = check_legal_content(text);
        if !result.compliant {
            self.observer.on_event(&PipelineEvent::LegalViolations {
                terms: result.terms(),
            });
        }
        result
    }

    pub fn check_logo_presence(&self, image: &RgbImage) -> LogoPresenceResult {
        match &self.logo {
            LogoTemplate::NotConfigured => {
                LogoPresenceResult::inconclusive("Logo template not available for checking")
            }
            LogoTemplate::Unavailable(reason) => LogoPresenceResult::inconclusive(reason.clone()),
            LogoTemplate::Loaded(template) => logo_presence(image, template),
        }
    }

    pub fn validate_brand_colors(&self, image: &RgbImage) -> BrandColorResult {
        brand_color_presence(image, &self.brand_colors)
    }

    pub fn check_text_contrast(&self, text: Rgb, background: Rgb) -> ContrastResult {
        check_text_contrast(text, background)
    }

    /// Legal, logo and colour checks for one artifact file.
    pub fn run_full_check(&self, image_path: &Path, message: &str) -> ComplianceReport {
        let legal_content = self.check_legal_content(message);
        let (logo_presence, brand_colors) = match raster::decode_rgb(image_path) {
            Ok(img) => (self.check_logo_presence(&img), self.validate_brand_colors(&img)),
            Err(e) => {
                let reason = format!("Error during detection: {e}");
                (
                    LogoPresenceResult::inconclusive(reason.clone()),
                    BrandColorResult::inconclusive(&self.brand_colors, reason),
                )
            }
        };

        let overall = overall_compliant(
            legal_content.compliant,
            logo_presence.detected,
            brand_colors.compliant,
        );
        self.observer.on_event(&PipelineEvent::ComplianceChecked {
            image: image_path.to_path_buf(),
            compliant: overall,
        });

        ComplianceReport {
            image: image_path.to_path_buf(),
            product_id: None,
            ratio: None,
            timestamp: modified_at(image_path),
            checks: ComplianceChecks {
                legal_content,
                logo_presence,
                brand_colors,
            },
            overall_compliant: overall,
        }
    }

    pub fn check_artifact(&self, artifact: &VariationArtifact, message: &str) -> ComplianceReport {
        ComplianceReport {
            product_id: Some(artifact.product_id.clone()),
            ratio: Some(artifact.ratio.clone()),
            ..self.run_full_check(&artifact.path, message)
        }
    }
}

fn modified_at(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
