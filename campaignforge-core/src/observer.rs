//! Pipeline observation
//!
//! Components report what they do through an injected observer rather than
//! a global logger. `TracingObserver` is what the CLI wires in.

use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    AssetFound { product_id: String, path: PathBuf },
    AssetMissing { product_id: String },
    AssetRejected { path: PathBuf, reason: String },
    AssetGenerated { product_id: String, path: PathBuf, provider: String },
    PromptFallback { product_id: String, provider: String, reason: String },
    VariationStarted { product_id: String, ratio: String },
    VariationWritten { product_id: String, ratio: String, path: PathBuf },
    LogoLoaded { path: PathBuf, width: u32, height: u32 },
    LogoUnavailable { reason: String },
    LogoSkipped { product_id: String, ratio: String },
    FontFallback { reason: String },
    ColorFallback { field: &'static str, value: String },
    LegalViolations { terms: Vec<String> },
    ComplianceChecked { image: PathBuf, compliant: bool },
    ProductFailed { product_id: String, stage: String, error: String },
    RunCancelled { completed_products: usize },
}

pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

pub type SharedObserver = Arc<dyn PipelineObserver>;

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        use PipelineEvent::*;
        match event {
            AssetFound { product_id, path } => tracing::info!(
                product = %product_id,
                path = %path.display(),
                "found existing asset"
            ),
            AssetMissing { product_id } => tracing::info!(product = %product_id, "missing asset"),
            AssetRejected { path, reason } => {
                tracing::warn!(path = %path.display(), %reason, "rejected asset")
            }
            AssetGenerated { product_id, path, provider } => tracing::info!(
                product = %product_id,
                path = %path.display(),
                %provider,
                "generated asset"
            ),
            PromptFallback { product_id, provider, reason } => tracing::warn!(
                product = %product_id,
                %provider,
                %reason,
                "prompt request failed, using template"
            ),
            VariationStarted { product_id, ratio } => {
                tracing::debug!(product = %product_id, %ratio, "creating variation")
            }
            VariationWritten { product_id, ratio, path } => tracing::info!(
                product = %product_id,
                %ratio,
                path = %path.display(),
                "saved variation"
            ),
            LogoLoaded { path, width, height } => {
                tracing::info!(path = %path.display(), width, height, "logo loaded")
            }
            LogoUnavailable { reason } => tracing::warn!(%reason, "logo unavailable"),
            LogoSkipped { product_id, ratio } => {
                tracing::debug!(product = %product_id, %ratio, "no logo to apply")
            }
            FontFallback { reason } => tracing::warn!(%reason, "using built-in font"),
            ColorFallback { field, value } => {
                tracing::warn!(field, %value, "unparseable colour, using default")
            }
            LegalViolations { terms } => {
                tracing::warn!(count = terms.len(), terms = ?terms, "legal compliance issues")
            }
            ComplianceChecked { image, compliant } => {
                if *compliant {
                    tracing::info!(image = %image.display(), "compliance passed")
                } else {
                    tracing::warn!(image = %image.display(), "compliance issues detected")
                }
            }
            ProductFailed { product_id, stage, error } => {
                tracing::error!(product = %product_id, %stage, %error, "product failed")
            }
            RunCancelled { completed_products } => {
                tracing::warn!(completed_products, "run cancelled")
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl PipelineObserver for NullObserver {
    fn on_event(&self, _event: &PipelineEvent) {}
}

pub fn tracing_observer() -> SharedObserver {
    Arc::new(TracingObserver)
}

pub fn null_observer() -> SharedObserver {
    Arc::new(NullObserver)
}
