//! Execution Report - Run Record
//!
//! One JSON document per run, hashed over its canonical form so the listed
//! files and verdicts can be checked later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::compliance::ComplianceReport;
use crate::composer::VariationArtifact;
use crate::error::{PipelineError, PipelineResult};
use crate::generation::{ImageProvider, PromptProvider};
use crate::hashing::{compute_report_hash, file_sha256};
use crate::ENGINE_VERSION;

pub const REPORT_FILE_NAME: &str = "execution_report.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub metadata: ReportMetadata,
    pub campaign: CampaignSummary,
    pub metrics: RunMetrics,
    pub generation: GenerationUsage,
    pub outputs: OutputSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ComplianceSummary>,
    #[serde(default)]
    pub failures: Vec<ProductFailure>,
    #[serde(default)]
    pub report_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub pipeline_version: String,
    pub cancelled: bool,
}

impl ReportMetadata {
    pub fn new(cancelled: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            pipeline_version: ENGINE_VERSION.to_string(),
            cancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub id: String,
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    pub products_processed: usize,
    pub products_failed: usize,
    pub assets_existing: usize,
    pub assets_generated: usize,
    pub variations_created: usize,
    pub execution_time_seconds: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationUsage {
    pub provider: Option<String>,
    pub calls: usize,
    #[serde(default)]
    pub prompt_provider: Option<String>,
    #[serde(default)]
    pub prompt_calls: usize,
    pub estimated_cost_usd: f64,
}

impl GenerationUsage {
    pub fn new(
        images: Option<&dyn ImageProvider>,
        calls: usize,
        prompts: &dyn PromptProvider,
        prompt_calls: usize,
    ) -> Self {
        Self {
            provider: images.map(|p| p.name().to_string()),
            calls,
            prompt_provider: Some(prompts.name().to_string()),
            prompt_calls,
            estimated_cost_usd: estimated_cost(
                prompt_calls,
                prompts.cost_per_call(),
                calls,
                images.map_or(0.0, |p| p.cost_per_image()),
            ),
        }
    }
}

/// Rough spend in USD, rounded to cents.
pub fn estimated_cost(
    prompt_calls: usize,
    cost_per_prompt: f64,
    image_calls: usize,
    cost_per_image: f64,
) -> f64 {
    round2(prompt_calls as f64 * cost_per_prompt + image_calls as f64 * cost_per_image)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSummary {
    pub location: PathBuf,
    pub files: Vec<OutputFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputFile {
    /// Relative to `OutputSummary::location`.
    pub path: PathBuf,
    pub size_kb: f64,
    pub product: String,
    pub variant: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub checks_performed: usize,
    pub passed: usize,
    pub reports: Vec<ComplianceReport>,
}

impl ComplianceSummary {
    pub fn new(reports: Vec<ComplianceReport>) -> Self {
        Self {
            checks_performed: reports.len(),
            passed: reports.iter().filter(|r| r.overall_compliant).count(),
            reports,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.checks_performed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductFailure {
    pub product_id: String,
    pub stage: String,
    pub error: String,
}

impl ProductFailure {
    pub fn new(product_id: &str, error: &PipelineError) -> Self {
        Self {
            product_id: product_id.to_string(),
            stage: error.kind().to_string(),
            error: error.to_string(),
        }
    }
}

/// Describe written variations relative to `location`, with size and digest.
pub fn describe_outputs(
    location: &Path,
    artifacts: &[VariationArtifact],
) -> PipelineResult<Vec<OutputFile>> {
    artifacts
        .iter()
        .map(|artifact| {
            let unreadable = |e| PipelineError::write(&artifact.path, e);
            let meta = std::fs::metadata(&artifact.path).map_err(unreadable)?;
            let sha256 = file_sha256(&artifact.path).map_err(unreadable)?;
            Ok(OutputFile {
                path: artifact
                    .path
                    .strip_prefix(location)
                    .unwrap_or(&artifact.path)
                    .to_path_buf(),
                size_kb: round2(meta.len() as f64 / 1024.0),
                product: artifact.product_id.clone(),
                variant: artifact.ratio.clone(),
                sha256,
            })
        })
        .collect()
}

impl ExecutionReport {
    /// Fill `report_hash` from the canonical JSON of everything else.
    pub fn seal(mut self) -> PipelineResult<Self> {
        self.report_hash = compute_report_hash(&self)?;
        Ok(self)
    }

    pub fn verify(&self) -> PipelineResult<bool> {
        Ok(compute_report_hash(self)? == self.report_hash)
    }

    pub fn write(&self, dir: &Path) -> PipelineResult<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::write(dir, e))?;
        let path = dir.join(REPORT_FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| PipelineError::write(&path, e))?;
        Ok(path)
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::input(format!("Report not readable: {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
