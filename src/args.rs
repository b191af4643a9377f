use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "provenance-harvest")]
#[command(about = "Allow-listed crawler that saves text and PDFs with provenance")]
#[command(version)]
pub struct Args {
    /// Directory holding config.json, allowlist.json and seeds.json
    #[arg(short = 'C', long, default_value = "config")]
    pub config_dir: PathBuf,

    /// Output root (wiped and recreated on every run)
    #[arg(short, long, default_value = provenance_harvest::DEFAULT_OUTPUT_DIR)]
    pub out_dir: PathBuf,

    /// Override the number of concurrent workers
    #[arg(short, long)]
    pub concurrency: Option<usize>,
}
