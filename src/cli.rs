//! threatscope command line
//!
//! Threat-model a repository or a design document from the terminal.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::config::{Config, SynthesisMode};
use crate::errors::ThreatScopeError;
use crate::model::{Framework, ThreatModelReport};
use crate::observability::telemetry::init_tracing;
use crate::output::{self, OutputFormat};
use crate::pipeline::Pipeline;
use crate::risk::{ImpactFactors, LikelihoodFactors, RiskRating};
use crate::synthesis;

#[derive(Parser, Debug)]
#[command(name = "threatscope")]
#[command(about = "Repository threat modeling with risk-scored STRIDE threats")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Verbose logging (info level)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,
}

/// Flags shared by every command that produces a threat model.
#[derive(Args, Debug, Clone)]
struct ReportArgs {
    /// Threat modeling methodology
    #[arg(long, value_enum, default_value = "stride")]
    framework: Framework,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Use the rule-based synthesizer even when model credentials exist
    #[arg(long)]
    offline: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Threat-model a repository URL or local directory
    #[command(alias = "a")]
    Analyze {
        /// Repository URL (https, ssh, or host/owner/repo) or local directory
        source: String,
        #[command(flatten)]
        report: ReportArgs,
    },

    /// Threat-model a design document
    Document {
        /// Path to the document (markdown or plain text)
        file: PathBuf,
        #[command(flatten)]
        report: ReportArgs,
    },

    /// Print the architecture diagram (Mermaid) for a source
    Diagram {
        /// Repository URL or local directory
        source: String,
    },

    /// Rate one threat from raw OWASP factors
    Rate {
        /// Eight comma-separated likelihood factors (0-9)
        #[arg(long, value_delimiter = ',', required = true)]
        likelihood: Vec<u8>,
        /// Four comma-separated impact factors (0-9)
        #[arg(long, value_delimiter = ',', required = true)]
        impact: Vec<u8>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    run_with(cli).await
}

pub async fn run_with(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose, cli.log_json);

    if cli.no_color || std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    let config_path = cli.config.as_deref().map(expand_home);
    let mut config = Config::load(config_path.as_deref())
        .map_err(|e| ThreatScopeError::Config(format!("{:#}", e)))?;

    match cli.command {
        Commands::Analyze { source, report } => {
            apply_report_flags(&mut config, &report);
            let synthesizer = synthesis::select(&config)?;
            let pipeline = Pipeline::new(config);
            let result = pipeline
                .analyze(&source, report.framework, synthesizer.as_ref())
                .await?;
            emit(&result, &report)
        }
        Commands::Document { file, report } => {
            apply_report_flags(&mut config, &report);
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read document {}", file.display()))?;
            let synthesizer = synthesis::select(&config)?;
            let pipeline = Pipeline::new(config);
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.display().to_string());
            let result = pipeline
                .analyze_document(&name, &text, report.framework, synthesizer.as_ref())
                .await?;
            emit(&result, &report)
        }
        Commands::Diagram { source } => {
            let pipeline = Pipeline::new(config);
            let diagram = pipeline.diagram(&source).await?;
            print!("{}", diagram);
            Ok(())
        }
        Commands::Rate { likelihood, impact } => {
            let rating = rate(&likelihood, &impact)?;
            println!("{}", serde_json::to_string_pretty(&rating)?);
            Ok(())
        }
    }
}

fn apply_report_flags(config: &mut Config, report: &ReportArgs) {
    if report.offline {
        config.synthesis.mode = SynthesisMode::Rules;
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|h| h.join(rest).to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string()),
        None => path.to_string(),
    }
}

/// Standalone rating from raw factor lists.
pub fn rate(likelihood: &[u8], impact: &[u8]) -> Result<RiskRating> {
    let likelihood: [u8; 8] = likelihood.try_into().map_err(|_| {
        ThreatScopeError::Config(format!(
            "--likelihood needs 8 values, got {}",
            likelihood.len()
        ))
    })?;
    let impact: [u8; 4] = impact.try_into().map_err(|_| {
        ThreatScopeError::Config(format!("--impact needs 4 values, got {}", impact.len()))
    })?;
    Ok(RiskRating::compute(
        LikelihoodFactors::new(likelihood),
        ImpactFactors::new(impact),
    ))
}

fn emit(report: &ThreatModelReport, args: &ReportArgs) -> Result<()> {
    match &args.output {
        Some(path) => {
            colored::control::set_override(false);
            let rendered = output::render(report, args.format)?;
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report written to {}", path.display());
            eprintln!("Report written to {}", path.display());
        }
        None => {
            let rendered = output::render(report, args.format)?;
            print!("{}", rendered);
            if !rendered.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
