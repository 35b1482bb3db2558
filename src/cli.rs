use crate::config::Config;
use crate::contract::TokioSleeper;
use crate::credentials::{authorized_client, CachedToken};
use crate::download::HttpFetcher;
use crate::link::LinkPattern;
use crate::listing::DriveListingClient;
use crate::load_config::load_config;
use crate::synchronise::{synchronise, Mode, SynchroniseReport};
use crate::table::Table;
use crate::upload::HttpPublisher;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI for drive-relink: re-host Drive folder contents referenced from a CSV table.
#[derive(Parser)]
#[clap(
    name = "drive-relink",
    version,
    about = "Rewrite Drive folder links in a CSV table with re-hosted resource links"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download every file of each referenced folder, re-upload it and write the new links
    Rehost(RunArgs),
    /// Replace each folder reference with viewer links to its files, without re-hosting
    Links(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the YAML config file
    #[clap(long)]
    pub config: PathBuf,
    /// Input CSV; overrides table.input
    #[clap(long)]
    pub input: Option<PathBuf>,
    /// Output CSV; overrides table.output
    #[clap(long)]
    pub output: Option<PathBuf>,
}

impl RunArgs {
    fn paths(&self, config: &Config) -> Result<(PathBuf, PathBuf)> {
        let input = self
            .input
            .clone()
            .or_else(|| config.table.input.clone())
            .context("no input table given (use --input or table.input)")?;
        let output = self
            .output
            .clone()
            .or_else(|| config.table.output.clone())
            .unwrap_or_else(|| default_output_path(&input));
        Ok((input, output))
    }
}

/// `OUTPUT_<name>` next to the input.
pub fn default_output_path(input: &std::path::Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table.csv".to_string());
    input.with_file_name(format!("OUTPUT_{name}"))
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<SynchroniseReport> {
    match cli.command {
        Commands::Rehost(args) => {
            tracing::info!(command = "rehost", "Starting re-host run");
            run_pipeline(&args, true).await
        }
        Commands::Links(args) => {
            tracing::info!(command = "links", "Starting link-only run");
            run_pipeline(&args, false).await
        }
    }
}

async fn run_pipeline(args: &RunArgs, rehost: bool) -> Result<SynchroniseReport> {
    let config = load_config(&args.config)?;
    let (input, output) = args.paths(&config)?;
    let timeout = config.http.timeout();

    let token = CachedToken::from_file(&config.drive.token_path)?;
    let drive_client = authorized_client(&token, timeout)?;
    let lister = DriveListingClient::new(drive_client, config.drive.api_base.clone());
    let sleeper = TokioSleeper;

    let mut table = Table::read_csv(&input)?;

    let report = if rehost {
        let fetcher = HttpFetcher::new(&config.download, timeout)?;
        let publisher = HttpPublisher::new(config.upload.clone(), timeout)?;
        let mode = Mode::Rehost {
            fetcher: &fetcher,
            publisher: &publisher,
        };
        synchronise(
            config.synchronise_config(LinkPattern::Download),
            &lister,
            &sleeper,
            mode,
            &mut table,
        )
        .await?
    } else {
        synchronise(
            config.synchronise_config(LinkPattern::View),
            &lister,
            &sleeper,
            Mode::LinkOnly,
            &mut table,
        )
        .await?
    };

    table
        .write_csv(&output)
        .with_context(|| format!("writing output table {}", output.display()))?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        relinked = report.relinked(),
        skipped = report.skipped(),
        failed = report.failed(),
        links = report.links(),
        "Run complete"
    );
    Ok(report)
}
