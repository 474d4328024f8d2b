//! CampaignForge CLI
//!
//! Commands: run, ratios, check-text, contrast, check-image
//! Outputs JSON to stdout, logs to stderr
//! Exit codes: 0 ok, 1 fatal error, 2 product or compliance failure

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{prelude::*, EnvFilter};

use campaignforge_core::compliance::{check_legal_content, check_text_contrast};
use campaignforge_core::observer::tracing_observer;
use campaignforge_core::{
    CampaignBrief, CampaignPipeline, ComplianceEngine, LogoCorner, OutputFormat, PipelineConfig,
    RatioPolicy, Rgb, TextPosition,
};

#[derive(Parser)]
#[command(name = "campaignforge-cli")]
#[command(about = "CampaignForge CLI - Campaign Creative Compiler", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce every variation for a campaign brief
    Run(RunArgs),

    /// Print the aspect ratio table
    Ratios,

    /// Check campaign copy for prohibited terms
    CheckText {
        #[arg(short, long)]
        message: String,
    },

    /// WCAG contrast between two hex colours
    Contrast {
        #[arg(short, long)]
        text: Rgb,

        #[arg(short, long)]
        background: Rgb,
    },

    /// Run the full compliance check on one image
    CheckImage {
        #[arg(short, long)]
        image: PathBuf,

        /// Brief supplying the brand config and message
        #[arg(short, long)]
        brief: PathBuf,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Campaign brief JSON
    #[arg(short, long)]
    brief: PathBuf,

    /// Pipeline config JSON; flags and env vars override it
    #[arg(short, long, env = "CAMPAIGNFORGE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "CAMPAIGNFORGE_ASSETS_DIR")]
    assets_dir: Option<PathBuf>,

    #[arg(long, env = "CAMPAIGNFORGE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    #[arg(long, env = "CAMPAIGNFORGE_WORKERS")]
    workers: Option<usize>,

    /// png or jpg
    #[arg(long, env = "CAMPAIGNFORGE_OUTPUT_FORMAT")]
    format: Option<OutputFormat>,

    #[arg(long, env = "CAMPAIGNFORGE_GENERATION_RATIO")]
    generation_ratio: Option<String>,

    /// top-right, top-left, bottom-right or bottom-left
    #[arg(long, env = "CAMPAIGNFORGE_LOGO_CORNER")]
    logo_corner: Option<LogoCorner>,

    /// top, bottom or center
    #[arg(long, env = "CAMPAIGNFORGE_TEXT_POSITION")]
    text_position: Option<TextPosition>,

    #[arg(long, env = "CAMPAIGNFORGE_SKIP_GENERATION")]
    skip_generation: bool,

    #[arg(long, env = "CAMPAIGNFORGE_SKIP_COMPLIANCE")]
    skip_compliance: bool,

    /// Fail missing products instead of generating placeholder heroes
    #[arg(long, env = "CAMPAIGNFORGE_NO_PLACEHOLDER")]
    no_placeholder: bool,
}

impl RunArgs {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.assets_dir {
            config.assets_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(format) = self.format {
            config.output_format = format;
        }
        if let Some(ratio) = &self.generation_ratio {
            config.generation_ratio = ratio.clone();
        }
        if let Some(corner) = self.logo_corner {
            config.logo_corner = corner;
        }
        if let Some(position) = self.text_position {
            config.text_position = position;
        }
        config.skip_generation |= self.skip_generation;
        config.skip_compliance |= self.skip_compliance;
        if self.no_placeholder {
            config.placeholder_generation = false;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn verdict(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

fn execute(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Run(args) => {
            let config = args.pipeline_config()?;
            let brief = CampaignBrief::load(&args.brief)?;
            let outcome = CampaignPipeline::new(config)
                .run(&brief)
                .with_context(|| format!("campaign {} failed", brief.campaign_id))?;

            let report = &outcome.report;
            print_json(&serde_json::json!({
                "success": outcome.success(),
                "campaign_id": report.campaign.id,
                "report": outcome.report_path,
                "report_hash": report.report_hash,
                "cancelled": report.metadata.cancelled,
                "metrics": report.metrics,
                "compliance_passed": report.compliance.as_ref().map(|c| c.passed),
                "compliance_checked": report.compliance.as_ref().map(|c| c.checks_performed),
                "failures": report.failures,
            }))?;
            Ok(verdict(outcome.success()))
        }

        Commands::Ratios => {
            print_json(&RatioPolicy::table())?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::CheckText { message } => {
            let result = check_legal_content(&message);
            print_json(&result)?;
            Ok(verdict(result.compliant))
        }

        Commands::Contrast { text, background } => {
            print_json(&check_text_contrast(text, background))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::CheckImage { image, brief } => {
            let brief = CampaignBrief::load(&brief)?;
            let engine = ComplianceEngine::new(&brief.brand_config, tracing_observer());
            let report = engine.run_full_check(&image, &brief.campaign_message);
            print_json(&report)?;
            Ok(verdict(report.overall_compliant))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli.command) {
        Ok(code) => code,
        Err(e) => {
            let output = serde_json::json!({
                "success": false,
                "error": format!("{e:#}"),
            });
            println!("{output}");
            ExitCode::FAILURE
        }
    }
}
