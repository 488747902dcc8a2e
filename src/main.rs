//! Clarity CLI - Plain-English contract explanations
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use contract_clarity::input::{self, ContractSource};
use contract_clarity::{report, AnalysisError, Analyzer, Config, TextExtractor};
use dialoguer::Confirm;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clarity")]
#[command(author, version, about = "Plain-English contract explanations", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explain a contract (.pdf or .txt); reads stdin or opens $EDITOR without a file
    Analyze {
        /// Contract file to analyze
        file: Option<PathBuf>,
        /// Ground the analysis with web search and list sources
        #[arg(long)]
        grounding: bool,
        /// Print the raw analysis as JSON instead of a report
        #[arg(long)]
        json: bool,
        /// Also write the report as a Markdown file
        #[arg(long)]
        export: bool,
        /// Directory for the exported report (defaults to [report].export_dir)
        #[arg(long, requires = "export")]
        output_dir: Option<PathBuf>,
        /// Overwrite an existing exported report without asking
        #[arg(long, requires = "export")]
        force: bool,
    },
    /// Show the text extracted from a contract file
    Extract {
        /// Contract file (.pdf or .txt)
        file: PathBuf,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn status(msg: &str) {
    eprintln!("{}", msg.cyan());
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "contract_clarity=debug"
    } else {
        "contract_clarity=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !atty::is(atty::Stream::Stdout) {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Analyze {
            file,
            grounding,
            json,
            export,
            output_dir,
            force,
        } => {
            let config = Config::load()?;
            let extractor = TextExtractor::default();
            let source = ContractSource::detect(file);

            let text = input::read_contract(&source, &extractor, Some(&status))?;
            if text.trim().is_empty() {
                return Err(AnalysisError::EmptyInput.into());
            }

            eprintln!("Analysing {} characters...", input::char_count(&text));
            let analyzer = Analyzer::from_config(&config)?
                .with_grounding(grounding || config.agent.grounding);
            let result = match analyzer.analyze(&text, Some(&status)).await {
                Ok(result) => result,
                Err(e) => {
                    keep_draft(&source, &text);
                    return Err(e.into());
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                report::print_report(&result);
            }

            if export {
                let dir = output_dir.unwrap_or_else(|| config.report.export_dir.clone());
                let path = dir.join(report::export_file_name(&result.overview.contract_type));

                let markdown = report::to_markdown(&result, chrono::Utc::now())?;
                let saved = report::save_export(&path, &markdown, force, |path| {
                    if !atty::is(atty::Stream::Stdin) {
                        eprintln!(
                            "{} already exists; pass --force to overwrite it.",
                            path.display()
                        );
                        return Ok(false);
                    }
                    Confirm::new()
                        .with_prompt(format!("{} exists. Overwrite?", path.display()))
                        .default(false)
                        .interact()
                        .map_err(anyhow::Error::from)
                })
                .with_context(|| format!("failed to write {}", path.display()))?;
                if !saved {
                    eprintln!("Export skipped.");
                    return Ok(());
                }
                eprintln!("📄 Report saved to {}", path.display());
            }
        }
        Commands::Extract { file } => {
            let extractor = TextExtractor::default();
            let text = extractor.extract_path(&file, Some(&status))?;

            println!("\n=== {} ===\n", file.display());
            println!("{}", text);
            println!("\n--- Extracted {} characters ---", text.chars().count());
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "clarity", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Save text typed into the editor so a failed analysis can be retried without retyping
fn keep_draft(source: &ContractSource, text: &str) {
    if !matches!(source, ContractSource::Editor) {
        return;
    }
    let path = std::env::temp_dir().join("clarity-draft.txt");
    match std::fs::write(&path, text) {
        Ok(()) => eprintln!(
            "Your text was saved to {}. Retry with: clarity analyze {}",
            path.display(),
            path.display()
        ),
        Err(e) => tracing::warn!("could not save draft: {}", e),
    }
}
