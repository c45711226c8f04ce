mod config;
mod display;
mod pipeline;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use fiscaldash_core::DashboardReport;
use fiscaldash_fetch::{HttpFetcher, SourceFetcher, TableCache, TableLoader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Cli, Command, OutputFormat};
use pipeline::Dashboard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    info!("fiscaldash v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let http = HttpFetcher::with_timeout(cli.analysis.http_timeout())
        .context("building HTTP client")?;
    let loader = TableLoader::new(
        SourceFetcher::new(http),
        TableCache::new(cli.analysis.cache_ttl()),
    );
    let dashboard = Dashboard::new(
        loader,
        cli.sources.sources(),
        cli.analysis.normalize_options(),
        cli.analysis.report_options(),
    );

    match cli.command.unwrap_or_default() {
        Command::Report { format } => {
            let report = dashboard.run().await.inspect_err(print_load_hint)?;
            print_report(&report, format)?;
        }
        Command::Watch { interval, format } => {
            watch(&dashboard, Duration::from_secs(interval), format).await?;
        }
    }
    Ok(())
}

/// Refresh until Ctrl-C. Failed passes are reported and retried next tick.
async fn watch(
    dashboard: &Dashboard,
    interval: Duration,
    format: OutputFormat,
) -> anyhow::Result<()> {
    loop {
        // Without a TTL every refresh must re-read the sources.
        if dashboard.loader().cache().ttl().is_none() {
            dashboard.loader().cache().clear();
        }
        match dashboard.run().await {
            Ok(report) => print_report(&report, format)?,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "dashboard refresh failed");
                print_load_hint(&err);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping watch");
                return Ok(());
            }
        }
    }
}

fn print_report(report: &DashboardReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", display::render_text(report, chrono::Utc::now())),
        OutputFormat::Json => println!("{}", display::render_json(report)?),
    }
    Ok(())
}

fn print_load_hint(err: &anyhow::Error) {
    eprintln!("error: {err:#}");
    eprintln!(
        "Check that each sheet link is correct and that the workbook is shared via \
         File > Share > Publish to web as CSV."
    );
}
