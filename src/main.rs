use anyhow::Result;
use clap::Parser;
use drive_relink::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing for the CLI.
    tracing_subscriber::fmt::init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    match run(cli).await {
        Ok(report) => {
            println!(
                "Relink complete: {} rows relinked, {} skipped, {} listing failures, {} links written.",
                report.relinked(),
                report.skipped(),
                report.failed(),
                report.links()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "CLI exited with error");
            Err(e)
        }
    }
}
