//! CampaignForge Core - Campaign Creative Compiler
//!
//! One hero image per product becomes a set of aspect-ratio variations with
//! the campaign message and brand logo composited on, each scored for legal
//! and brand compliance.
//!
//! # Guarantees
//! 1. Every variation has exactly the pixel size its ratio names
//! 2. Paths come back in requested ratio order
//! 3. A failing product never stops the others
//! 4. Unverifiable compliance checks never fail a verdict
//! 5. Cancellation lands between ratios, never mid-write

pub mod assets;
pub mod brief;
pub mod cancel;
pub mod color;
pub mod compliance;
pub mod composer;
pub mod config;
pub mod error;
pub mod fonts;
pub mod generation;
pub mod geometry;
pub mod hashing;
pub mod logo;
pub mod observer;
pub mod pipeline;
pub mod raster;
pub mod ratios;
pub mod report;
pub mod text;

pub use brief::{BrandConfig, CampaignBrief, Product};
pub use cancel::CancelToken;
pub use color::Rgb;
pub use compliance::{ComplianceEngine, ComplianceReport, ContrastResult, LegalContentResult};
pub use composer::{ComposerSettings, CreativeComposer, VariationArtifact};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use fonts::{BuiltinFontResolver, Face, FontResolver, SystemFontResolver};
pub use generation::{
    GenerationRequest, ImageProvider, PlaceholderProvider, PromptProvider, TemplatePromptProvider,
};
pub use hashing::{canonical_json, compute_report_hash};
pub use logo::{LogoCompositor, LogoCorner, LogoOverlay};
pub use observer::{
    NullObserver, PipelineEvent, PipelineObserver, SharedObserver, TracingObserver,
};
pub use pipeline::{CampaignPipeline, RunOutcome};
pub use raster::OutputFormat;
pub use ratios::{AspectRatioSpec, Dimensions, RatioPolicy};
pub use report::{ExecutionReport, ProductFailure};
pub use text::{TextLayoutEngine, TextPosition};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
