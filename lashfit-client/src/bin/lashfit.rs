//! Lashfit CLI - get a lash fit recommendation for a photo
//!
//! Usage:
//!   lashfit <IMAGE> [--endpoint <URL>] [--config <PATH>] [--json] [-v]
//!
//! Example:
//!   lashfit selfie.jpg
//!   lashfit selfie.jpg --endpoint https://lashes.example.com/analyze_lash/ --json

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use lashfit::client::{AnalysisBackend, HttpAnalysisClient};
use lashfit::presentation::{result_rows, status_line};
use lashfit::{ClientConfig, FileCandidate, UploadSession, ViewState};
use reqwest::Url;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

const ENDPOINT_ENV: &str = "LASHFIT_ENDPOINT";

#[derive(Parser, Debug)]
#[command(name = "lashfit", version, about = "Upload a photo and get a lash fit recommendation")]
struct Cli {
    /// Photo to analyze
    #[arg(required_unless_present = "check")]
    image: Option<PathBuf>,

    /// Analysis endpoint URL (overrides config and LASHFIT_ENDPOINT)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Multipart field name for the image
    #[arg(long)]
    field: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the canonical result as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Only check that the analysis service is reachable
    #[arg(long)]
    check: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
        debug!(endpoint, "Endpoint taken from {ENDPOINT_ENV}");
        config.endpoint = endpoint;
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(field) = &cli.field {
        config.field_name = field.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }

    Ok(config)
}

fn print_header(config: &ClientConfig, image: &Path) {
    eprintln!();
    eprintln!(
        "{}",
        "╭──────────────────────────────────────────────────────────────╮".blue()
    );
    eprintln!("{}  {}", "│".blue(), "Lashfit - Lash Fit Analysis".bold());
    eprintln!(
        "{}",
        "├──────────────────────────────────────────────────────────────┤".blue()
    );
    eprintln!("{}  {}    {}", "│".blue(), "Photo:".dimmed(), image.display());
    eprintln!("{}  {} {}", "│".blue(), "Service:".dimmed(), config.endpoint);
    eprintln!(
        "{}",
        "╰──────────────────────────────────────────────────────────────╯".blue()
    );
    eprintln!();
}

fn print_state(state: &ViewState) {
    let line = status_line(state);
    let line = match state {
        ViewState::Analyzing(_) => line.cyan(),
        ViewState::Success(_) => line.green(),
        ViewState::Failed(_) => line.red().bold(),
        _ => line.dimmed(),
    };
    eprintln!("{line}");
    let _ = std::io::stderr().flush();
}

/// Write the results box; borders and rows share one writer
fn write_results(out: &mut impl Write, rows: &[(&'static str, String)]) -> std::io::Result<()> {
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);

    writeln!(out)?;
    writeln!(
        out,
        "{}",
        "╭──────────────────────────────────────────────────────────────╮".green()
    )?;
    writeln!(out, "{}  {}", "│".green(), "Results".bold())?;
    writeln!(
        out,
        "{}",
        "├──────────────────────────────────────────────────────────────┤".green()
    )?;
    for (label, value) in rows {
        let padded = format!("{label:<width$}");
        writeln!(out, "{}  {}  {}", "│".green(), padded.dimmed(), value)?;
    }
    writeln!(
        out,
        "{}",
        "╰──────────────────────────────────────────────────────────────╯".green()
    )?;
    out.flush()
}

async fn run_check(client: &HttpAnalysisClient) -> ExitCode {
    let status = client.health_check().await;
    if status.healthy {
        eprintln!(
            "{} {} ({} ms)",
            "OK".green().bold(),
            client.endpoint(),
            status.latency_ms.unwrap_or_default()
        );
        ExitCode::SUCCESS
    } else {
        eprintln!(
            "{} {}: {}",
            "Unreachable".red().bold(),
            client.endpoint(),
            status.error.unwrap_or_default()
        );
        ExitCode::FAILURE
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    let client = HttpAnalysisClient::new(&config).context("Failed to create analysis client")?;
    let endpoint: Url = client.endpoint().clone();

    if cli.check {
        return Ok(run_check(&client).await);
    }

    let Some(image) = cli.image.as_ref() else {
        anyhow::bail!("No image given");
    };
    let candidate = FileCandidate::from_path(image)
        .with_context(|| format!("Failed to read image: {}", image.display()))?;

    if !cli.json {
        print_header(&config, image);
    }

    let session = UploadSession::new(Arc::new(client));
    info!(backend = session.backend_name(), "Session started");

    if let Err(e) = session.file_chosen(candidate) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        return Ok(ExitCode::FAILURE);
    }

    // Render every transition as it happens
    let mut updates = session.subscribe();
    let quiet = cli.json;
    let renderer = async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            if !quiet {
                print_state(&state);
            }
            if matches!(state, ViewState::Success(_) | ViewState::Failed(_)) {
                break;
            }
        }
    };

    let (outcome, _) = tokio::join!(session.analyze(), renderer);
    let state = match outcome {
        Ok(state) => state,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return Ok(ExitCode::FAILURE);
        }
    };

    match state {
        ViewState::Success(result) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                write_results(&mut std::io::stdout().lock(), &result_rows(&result, &endpoint))
                    .context("Failed to write results")?;
            }
            Ok(ExitCode::SUCCESS)
        }
        ViewState::Failed(error) => {
            if cli.json {
                eprintln!("{error}");
            }
            Ok(ExitCode::FAILURE)
        }
        other => {
            eprintln!("{}", status_line(&other));
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    info!("Starting lashfit v{}", env!("CARGO_PKG_VERSION"));
    run(cli).await
}
