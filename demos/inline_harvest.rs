use clap::Parser;
use provenance_harvest::{AllowListConfig, Harvest, HarvestConfig, HarvestInputs, SeedsConfig};
use std::error::Error;
use url::Url;

/// Harvest a single site without writing any config files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Seed URL; its host becomes the only allowed host
    #[arg(short, long)]
    seed: String,

    /// Path globs allowed on the seed host (repeatable)
    #[arg(short, long)]
    glob: Vec<String>,

    /// Maximum link depth
    #[arg(short = 'd', long, default_value_t = 1)]
    max_depth: u32,

    /// Output root
    #[arg(short, long, default_value = "dist-demo")]
    out_dir: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let seed = Url::parse(&args.seed)?;
    let host = match (seed.host_str(), seed.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(format!("seed has no host: {}", seed).into()),
    };

    let inputs = HarvestInputs {
        config: HarvestConfig {
            max_depth: args.max_depth,
            ..HarvestConfig::default()
        },
        allow_list: AllowListConfig::Paths([(host, args.glob)].into_iter().collect()),
        seeds: SeedsConfig::List(vec![args.seed.clone()]),
    };

    let harvest = Harvest::new(inputs).with_output_dir(&args.out_dir);
    let cancel = harvest.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let start_time = std::time::Instant::now();
    let report = harvest.run().await?;

    for item in &report.manifest.items {
        println!("{:>8} bytes  {}  {}", item.bytes, item.saved_path, item.url);
    }
    println!(
        "Harvest complete. Saved {} items ({} rejected by policy, {} failed) in {:.2} seconds.",
        report.stats.saved,
        report.stats.policy_rejected,
        report.stats.failed,
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
