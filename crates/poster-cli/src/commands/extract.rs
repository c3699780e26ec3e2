//! Extract command - pull event details out of a single poster image.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use poster_core::models::config::ProviderKind;
use poster_core::{
    ExtractionOptions, ExtractionResult, InitialRoute, LanguageModel, Pipeline, PosterError,
};

use super::{load_config, load_engine};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Poster image (PNG, JPEG or WebP)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Skip complexity analysis and start on this route (ocr_first, vision)
    #[arg(long)]
    force_route: Option<InitialRoute>,

    /// Timezone for interpreting dates and times
    #[arg(long)]
    timezone: Option<String>,

    /// Capability provider (gemini, mock)
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// API key for the capability provider
    #[arg(long, env = "POSTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model directory for the recognition engine
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Include OCR text and layout blocks in the output
    #[arg(long)]
    raw: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Show route and confidence summary
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(dir) = &args.model_dir {
        config.models.model_dir = dir.clone();
    }
    if let Some(provider) = args.provider {
        config.capability.provider = provider;
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    pb.set_message("Loading image...");
    let bytes = fs::read(&args.input)?;

    let model = LanguageModel::from_config(&config.capability, args.api_key.as_deref())
        .map_err(|e| {
            anyhow::anyhow!(
                "{}\n\nSet POSTER_API_KEY, pass --api-key, or use --provider mock.",
                e
            )
        })?;

    pb.set_message("Loading recognition models...");
    let engine = load_engine(&config);
    let pipeline = Pipeline::new(config, engine);

    pb.set_message("Extracting event details...");
    let options = ExtractionOptions {
        force_route: args.force_route,
        timezone: args.timezone.clone(),
        include_raw: args.raw.then_some(true),
        request_id: None,
    };

    let result = match pipeline.process(&bytes, &options, &model).await {
        Ok(result) => result,
        Err(e @ PosterError::InvalidInput(_)) => {
            pb.finish_and_clear();
            anyhow::bail!("Rejected {}: {}", args.input.display(), e);
        }
        Err(e) => {
            pb.finish_and_clear();
            return Err(e.into());
        }
    };

    pb.finish_and_clear();

    let output = match args.format {
        OutputFormat::Json if args.pretty => serde_json::to_string_pretty(&result)?,
        OutputFormat::Json => serde_json::to_string(&result)?,
        OutputFormat::Text => format_text(&result),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        eprintln!();
        eprintln!("{} Route: {}", style("ℹ").blue(), result.route());
        eprintln!(
            "{} Extraction confidence: {:.1}%",
            style("ℹ").blue(),
            result.confidence() * 100.0
        );
        if let Some(score) = result.complexity_score() {
            eprintln!(
                "{} Complexity: {:.2} (blurry: {})",
                style("ℹ").blue(),
                score.overall_complexity,
                score.is_blurry
            );
        }
        for warning in result.warnings() {
            eprintln!(
                "{} {:?}: {}",
                style("!").yellow(),
                warning.kind,
                warning.message.as_deref().unwrap_or("")
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn format_text(result: &ExtractionResult) -> String {
    let mut output = String::new();

    for (name, field) in result.fields().present() {
        output.push_str(&format!(
            "{:<18} {} ({:.0}%)\n",
            format!("{}:", name),
            field.value.as_deref().unwrap_or_default(),
            field.confidence * 100.0
        ));
    }

    if !result.extra().is_empty() {
        output.push_str("\nOther details:\n");
        for extra in result.extra() {
            let value = match &extra.value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            output.push_str(&format!("  {}: {}\n", extra.key, value));
        }
    }

    if output.is_empty() {
        output.push_str("No event details found\n");
    }

    output
}
