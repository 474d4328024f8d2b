//! Ratio Policy - Named Aspect Ratios
//!
//! One static table drives both output sizing and generation requests.
//! Unknown names never error: they resolve to the documented defaults.

use serde::{Deserialize, Serialize};

pub type RatioName = &'static str;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AspectRatioSpec {
    pub name: RatioName,
    /// Composition size; `None` for generation-only ratios.
    pub output: Option<Dimensions>,
    /// Source request size; `None` for output-only ratios.
    pub generation: Option<Dimensions>,
    pub provider_format: Option<&'static str>,
}

pub const DEFAULT_OUTPUT: Dimensions = Dimensions::new(1080, 1080);
pub const DEFAULT_GENERATION: Dimensions = Dimensions::new(1920, 1080);
pub const DEFAULT_PROVIDER_FORMAT: &str = "landscape_16_9";

const RATIOS: &[AspectRatioSpec] = &[
    AspectRatioSpec {
        name: "1x1",
        output: Some(Dimensions::new(1080, 1080)),
        generation: Some(Dimensions::new(1024, 1024)),
        provider_format: Some("square"),
    },
    AspectRatioSpec {
        name: "9x16",
        output: Some(Dimensions::new(1080, 1920)),
        generation: Some(Dimensions::new(1080, 1920)),
        provider_format: Some("portrait_16_9"),
    },
    AspectRatioSpec {
        name: "16x9",
        output: Some(Dimensions::new(1920, 1080)),
        generation: Some(Dimensions::new(1920, 1080)),
        provider_format: Some("landscape_16_9"),
    },
    AspectRatioSpec {
        name: "4x5",
        output: Some(Dimensions::new(1080, 1350)),
        generation: None,
        provider_format: None,
    },
    AspectRatioSpec {
        name: "2x3",
        output: Some(Dimensions::new(1080, 1620)),
        generation: None,
        provider_format: None,
    },
    AspectRatioSpec {
        name: "4x3",
        output: None,
        generation: Some(Dimensions::new(1024, 768)),
        provider_format: Some("landscape_4_3"),
    },
    AspectRatioSpec {
        name: "3x4",
        output: None,
        generation: Some(Dimensions::new(768, 1024)),
        provider_format: Some("portrait_3_4"),
    },
];

/// Stateless lookups over the ratio table.
pub struct RatioPolicy;

impl RatioPolicy {
    pub fn spec(name: &str) -> Option<&'static AspectRatioSpec> {
        RATIOS.iter().find(|r| r.name == name)
    }

    pub fn output_size(name: &str) -> Dimensions {
        Self::spec(name)
            .and_then(|r| r.output)
            .unwrap_or(DEFAULT_OUTPUT)
    }

    pub fn generation_size(name: &str) -> Dimensions {
        Self::spec(name)
            .and_then(|r| r.generation)
            .unwrap_or(DEFAULT_GENERATION)
    }

    pub fn provider_format(name: &str) -> &'static str {
        Self::spec(name)
            .and_then(|r| r.provider_format)
            .unwrap_or(DEFAULT_PROVIDER_FORMAT)
    }

    /// Ratios that can be composed, in table order.
    pub fn all_names() -> Vec<RatioName> {
        RATIOS
            .iter()
            .filter(|r| r.output.is_some())
            .map(|r| r.name)
            .collect()
    }

    pub fn table() -> &'static [AspectRatioSpec] {
        RATIOS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_names_are_output_ratios_in_order() {
        assert_eq!(RatioPolicy::all_names(), vec!["1x1", "9x16", "16x9", "4x5", "2x3"]);
    }

    #[test]
    fn unknown_name_uses_defaults() {
        assert_eq!(RatioPolicy::output_size("7x3"), DEFAULT_OUTPUT);
        assert_eq!(RatioPolicy::generation_size("7x3"), DEFAULT_GENERATION);
        assert_eq!(RatioPolicy::provider_format("7x3"), "landscape_16_9");
    }

    #[test]
    fn generation_only_ratios_fall_back_for_output() {
        assert_eq!(RatioPolicy::output_size("4x3"), DEFAULT_OUTPUT);
        assert_eq!(RatioPolicy::generation_size("4x3"), Dimensions::new(1024, 768));
        assert_eq!(RatioPolicy::provider_format("3x4"), "portrait_3_4");
    }

    #[test]
    fn output_only_ratios_fall_back_for_generation() {
        assert_eq!(RatioPolicy::output_size("2x3"), Dimensions::new(1080, 1620));
        assert_eq!(RatioPolicy::generation_size("2x3"), DEFAULT_GENERATION);
    }

    #[test]
    fn names_are_unique_and_sizes_positive() {
        let table = RatioPolicy::table();
        for (i, a) in table.iter().enumerate() {
            assert!(table[i + 1..].iter().all(|b| b.name != a.name));
            for d in a.output.iter().chain(a.generation.iter()) {
                assert!(d.width > 0 && d.height > 0);
            }
        }
    }
}
