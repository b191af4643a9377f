use clap::Parser;
use provenance_harvest::Harvest;
use std::process::ExitCode;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    // Configuration problems are fatal before any crawling starts
    let mut harvest = match Harvest::from_config_dir(&args.config_dir) {
        Ok(harvest) => harvest.with_output_dir(&args.out_dir),
        Err(e) => {
            ::log::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(concurrency) = args.concurrency {
        harvest = harvest.with_max_concurrency(concurrency);
    }

    // Ctrl-C stops dequeuing; whatever was saved still lands in the manifest
    let cancel = harvest.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ::log::warn!("Interrupt received, finishing in-flight items");
            cancel.cancel();
        }
    });

    match harvest.run().await {
        Ok(report) => {
            ::log::info!(
                "Harvested {} items ({} dequeued, {} skipped)",
                report.manifest.items.len(),
                report.stats.dequeued,
                report.stats.skipped
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            ::log::error!("Harvest failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
