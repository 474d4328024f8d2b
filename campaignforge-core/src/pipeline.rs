//! Campaign Pipeline - Single Entry Point
//!
//! `run` always validates the config and brief first. A failing product is
//! recorded and skipped; it never stops the other products.

use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::assets::AssetLibrary;
use crate::brief::{CampaignBrief, Product};
use crate::cancel::CancelToken;
use crate::compliance::ComplianceEngine;
use crate::composer::{CreativeComposer, VariationArtifact};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::fonts::{FontResolver, SystemFontResolver};
use crate::generation::{
    resolve_prompt, GenerationRequest, ImageProvider, PlaceholderProvider, PromptProvider,
    TemplatePromptProvider,
};
use crate::observer::{tracing_observer, PipelineEvent, SharedObserver};
use crate::report::{
    describe_outputs, CampaignSummary, ComplianceSummary, ExecutionReport, GenerationUsage,
    OutputSummary, ProductFailure, ReportMetadata, RunMetrics,
};

pub struct RunOutcome {
    pub report: ExecutionReport,
    pub report_path: PathBuf,
    pub artifacts: Vec<VariationArtifact>,
}

impl RunOutcome {
    /// No failed product, not cancelled, and every compliance check passed.
    pub fn success(&self) -> bool {
        self.report.failures.is_empty()
            && !self.report.metadata.cancelled
            && self
                .report
                .compliance
                .as_ref()
                .map_or(true, ComplianceSummary::all_passed)
    }
}

pub struct CampaignPipeline {
    config: PipelineConfig,
    observer: SharedObserver,
    provider: Option<Arc<dyn ImageProvider>>,
    prompts: Arc<dyn PromptProvider>,
    fonts: Option<Arc<dyn FontResolver>>,
    cancel: CancelToken,
}

impl CampaignPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let provider: Option<Arc<dyn ImageProvider>> = if config.placeholder_generation {
            Some(Arc::new(PlaceholderProvider))
        } else {
            None
        };
        Self {
            config,
            observer: tracing_observer(),
            provider,
            prompts: Arc::new(TemplatePromptProvider),
            fonts: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Prompt source for generated heroes; failures fall back to the template.
    pub fn with_prompt_provider(mut self, prompts: Arc<dyn PromptProvider>) -> Self {
        self.prompts = prompts;
        self
    }

    /// Overrides the system lookup that would otherwise start from the brand font file.
    pub fn with_fonts(mut self, fonts: Arc<dyn FontResolver>) -> Self {
        self.fonts = Some(fonts);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the whole campaign and write `execution_report.json`.
    ///
    /// Errors only for invalid input or when the report itself cannot be written.
    #[tracing::instrument(skip_all, fields(campaign = %brief.campaign_id))]
    pub fn run(&self, brief: &CampaignBrief) -> PipelineResult<RunOutcome> {
        self.config.validate()?;
        brief.validate()?;
        let started = Instant::now();

        let compliance = ComplianceEngine::new(&brief.brand_config, self.observer.clone());
        compliance.check_legal_content(&brief.campaign_message);

        let library = AssetLibrary::new(&self.config.assets_dir, self.observer.clone());
        let inventory = library.check_existing(&brief.products);
        let assets_existing = inventory.existing.len();

        let mut failures = Vec::new();
        let mut bases = inventory.existing;
        let mut generation_calls = 0;
        let mut assets_generated = 0;

        for product in &inventory.missing {
            if self.cancel.is_cancelled() {
                break;
            }
            let generated = match self.provider.as_deref() {
                Some(provider) if !self.config.skip_generation => {
                    generation_calls += 1;
                    self.generate_hero(&library, provider, brief, product)
                }
                _ => Err(PipelineError::generation(format!(
                    "no hero image for {} and generation is disabled",
                    product.id
                ))),
            };
            match generated {
                Ok(path) => {
                    assets_generated += 1;
                    bases.insert(product.id.clone(), path);
                }
                Err(e) => failures.push(self.fail(&product.id, &e)),
            }
        }

        let fonts = self.fonts.clone().unwrap_or_else(|| {
            Arc::new(SystemFontResolver::with_preferred_file(
                brief.brand_config.font_path.clone(),
            ))
        });
        let composer = CreativeComposer::new(
            &brief.brand_config,
            fonts.as_ref(),
            self.config.composer_settings(),
            self.observer.clone(),
        );

        let output_root = self.config.campaign_output(&brief.campaign_id);
        let ratios = brief.ratios();
        let jobs: Vec<(&Product, PathBuf)> = brief
            .products
            .iter()
            .filter_map(|p| bases.get(&p.id).map(|base| (p, base.clone())))
            .collect();

        let pool = build_pool(self.config.workers)?;
        let results: Vec<PipelineResult<Vec<VariationArtifact>>> = pool.install(|| {
            jobs.par_iter()
                .map(|(product, base)| {
                    if self.cancel.is_cancelled() {
                        return Err(PipelineError::Cancelled {
                            completed: 0,
                            requested: ratios.len(),
                        });
                    }
                    composer.create_variations(
                        base,
                        &brief.campaign_message,
                        &product.id,
                        &output_root,
                        Some(&ratios),
                        &self.cancel,
                    )
                })
                .collect()
        });

        let mut artifacts = Vec::new();
        let mut completed_products = 0;
        for ((product, _), result) in jobs.iter().zip(results) {
            match result {
                Ok(mut written) => {
                    completed_products += 1;
                    artifacts.append(&mut written);
                }
                Err(PipelineError::Cancelled { .. }) => {}
                Err(e) => failures.push(self.fail(&product.id, &e)),
            }
        }

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            self.observer
                .on_event(&PipelineEvent::RunCancelled { completed_products });
        }

        let compliance = if self.config.skip_compliance {
            None
        } else {
            let reports = pool.install(|| {
                artifacts
                    .par_iter()
                    .map(|a| compliance.check_artifact(a, &brief.campaign_message))
                    .collect()
            });
            Some(ComplianceSummary::new(reports))
        };

        failures.sort_by_key(|f| brief.products.iter().position(|p| p.id == f.product_id));

        let report = ExecutionReport {
            metadata: ReportMetadata::new(cancelled),
            campaign: CampaignSummary {
                id: brief.campaign_id.clone(),
                name: brief.display_name().to_string(),
                message: brief.campaign_message.clone(),
            },
            metrics: RunMetrics {
                products_processed: completed_products,
                products_failed: failures.len(),
                assets_existing,
                assets_generated,
                variations_created: artifacts.len(),
                execution_time_seconds: started.elapsed().as_secs_f64(),
            },
            // one prompt request per generation attempt
            generation: GenerationUsage::new(
                self.provider.as_deref(),
                generation_calls,
                self.prompts.as_ref(),
                generation_calls,
            ),
            outputs: OutputSummary {
                location: output_root.clone(),
                files: describe_outputs(&output_root, &artifacts)?,
            },
            compliance,
            failures,
            report_hash: String::new(),
        }
        .seal()?;

        let report_path = report.write(&output_root)?;
        tracing::info!(
            variations = report.metrics.variations_created,
            failed = report.metrics.products_failed,
            report = %report_path.display(),
            "campaign run finished"
        );

        Ok(RunOutcome {
            report,
            report_path,
            artifacts,
        })
    }

    fn generate_hero(
        &self,
        library: &AssetLibrary,
        provider: &dyn ImageProvider,
        brief: &CampaignBrief,
        product: &Product,
    ) -> PipelineResult<PathBuf> {
        let prompt = resolve_prompt(self.prompts.as_ref(), brief, product, self.observer.as_ref());
        let request = GenerationRequest::for_ratio(prompt, &self.config.generation_ratio);
        let image = provider.generate(&request)?;
        let path = library.store_generated(&product.id, &image)?;
        self.observer.on_event(&PipelineEvent::AssetGenerated {
            product_id: product.id.clone(),
            path: path.clone(),
            provider: provider.name().to_string(),
        });
        Ok(path)
    }

    fn fail(&self, product_id: &str, error: &PipelineError) -> ProductFailure {
        let failure = ProductFailure::new(product_id, error);
        self.observer.on_event(&PipelineEvent::ProductFailed {
            product_id: failure.product_id.clone(),
            stage: failure.stage.clone(),
            error: failure.error.clone(),
        });
        failure
    }
}

fn build_pool(workers: usize) -> PipelineResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| PipelineError::input(format!("failed to build worker pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::BuiltinFontResolver;
    use crate::generation::image_prompt;
    use crate::observer::{null_observer, PipelineObserver};
    use image::{Rgba, RgbaImage};
    use std::path::Path;

    struct OfflinePrompts;

    impl PromptProvider for OfflinePrompts {
        fn name(&self) -> &str {
            "llm"
        }

        fn cost_per_call(&self) -> f64 {
            0.01
        }

        fn generate_prompt(&self, _: &CampaignBrief, _: &Product) -> PipelineResult<String> {
            Err(PipelineError::generation("connection refused"))
        }
    }

    /// Records the prompt each generation request carried.
    #[derive(Default)]
    struct PromptCapture(std::sync::Mutex<Vec<String>>);

    impl ImageProvider for PromptCapture {
        fn name(&self) -> &str {
            "capture"
        }

        fn cost_per_image(&self) -> f64 {
            0.0
        }

        fn generate(&self, request: &GenerationRequest) -> PipelineResult<RgbaImage> {
            if let Ok(mut seen) = self.0.lock() {
                seen.push(request.prompt.clone());
            }
            PlaceholderProvider.generate(request)
        }
    }

    struct CancelOnWrite(CancelToken);

    impl PipelineObserver for CancelOnWrite {
        fn on_event(&self, event: &PipelineEvent) {
            if matches!(event, PipelineEvent::VariationWritten { .. }) {
                self.0.cancel();
            }
        }
    }

    fn config(root: &Path) -> PipelineConfig {
        PipelineConfig {
            assets_dir: root.join("assets"),
            output_dir: root.join("out"),
            workers: 2,
            ..PipelineConfig::default()
        }
    }

    fn pipeline(config: PipelineConfig) -> CampaignPipeline {
        CampaignPipeline::new(config)
            .with_observer(null_observer())
            .with_fonts(Arc::new(BuiltinFontResolver))
    }

    fn brief(products: &[&str]) -> CampaignBrief {
        let products: Vec<_> = products
            .iter()
            .map(|id| serde_json::json!({"id": id}))
            .collect();
        serde_json::from_value(serde_json::json!({
            "campaign_id": "spring",
            "campaign_message": "Get fit this spring",
            "products": products,
            "aspect_ratios": ["1x1", "9x16"]
        }))
        .unwrap()
    }

    #[test]
    fn rejects_invalid_brief_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let err = pipeline(config(dir.path())).run(&brief(&[])).err().unwrap();
        assert_eq!(err.kind(), "input");
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn existing_asset_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        RgbaImage::from_pixel(400, 300, Rgba([20, 30, 40, 255]))
            .save(dir.path().join("assets/mat.png"))
            .unwrap();

        let outcome = pipeline(config(dir.path())).run(&brief(&["mat"])).unwrap();
        assert_eq!(outcome.report.metrics.assets_existing, 1);
        assert_eq!(outcome.report.metrics.assets_generated, 0);
        assert_eq!(outcome.report.generation.calls, 0);
        assert_eq!(outcome.artifacts.len(), 2);
        assert!(outcome.success());
    }

    #[test]
    fn missing_asset_without_generation_is_a_product_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig {
            skip_generation: true,
            ..config(dir.path())
        };
        let outcome = pipeline(cfg).run(&brief(&["mat"])).unwrap();
        assert_eq!(outcome.report.failures.len(), 1);
        assert_eq!(outcome.report.failures[0].stage, "generation");
        assert!(outcome.artifacts.is_empty());
        assert!(!outcome.success());
        assert!(outcome.report_path.exists());
    }

    #[test]
    fn cancelled_before_start_still_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = pipeline(config(dir.path()))
            .with_cancel_token(cancel)
            .run(&brief(&["mat", "bottle"]))
            .unwrap();
        assert!(outcome.report.metadata.cancelled);
        assert!(outcome.artifacts.is_empty());
        assert!(outcome.report.failures.is_empty());
        assert!(outcome.report_path.exists());
        assert!(!outcome.success());
    }

    #[test]
    fn prompt_failure_falls_back_and_is_billed() {
        let dir = tempfile::tempdir().unwrap();
        let images = Arc::new(PromptCapture::default());
        let brief = brief(&["mat"]);
        let outcome = pipeline(config(dir.path()))
            .with_provider(images.clone())
            .with_prompt_provider(Arc::new(OfflinePrompts))
            .run(&brief)
            .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.report.metrics.assets_generated, 1);
        let usage = &outcome.report.generation;
        assert_eq!(usage.prompt_provider.as_deref(), Some("llm"));
        assert_eq!(usage.prompt_calls, 1);
        assert_eq!(usage.estimated_cost_usd, 0.01);

        let seen = images.0.lock().unwrap();
        assert_eq!(*seen, vec![image_prompt(&brief, &brief.products[0])]);
    }

    #[test]
    fn cancelled_mid_product_is_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        RgbaImage::from_pixel(400, 300, Rgba([20, 30, 40, 255]))
            .save(dir.path().join("assets/mat.png"))
            .unwrap();
        let cancel = CancelToken::new();

        let outcome = pipeline(config(dir.path()))
            .with_observer(Arc::new(CancelOnWrite(cancel.clone())))
            .with_cancel_token(cancel)
            .run(&brief(&["mat"]))
            .unwrap();

        assert!(outcome.report.metadata.cancelled);
        assert!(outcome.report.failures.is_empty());
        assert_eq!(outcome.report.metrics.products_processed, 0);
        assert!(outcome.artifacts.is_empty());
        assert!(outcome.report_path.exists());
        assert!(!outcome.success());

        let product_dir = dir.path().join("out/spring/mat");
        let names: Vec<_> = std::fs::read_dir(product_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["1x1.png".to_string()]);
    }
}
