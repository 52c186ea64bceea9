use anyhow::Context;
use clap::Parser;
use ctfvm_observe::{LoggerConfig, logger_init};
use tracing::info;

mod config;
mod duration;
mod serve;

use config::{Args, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log = LoggerConfig::new(args.log_format, args.log_level.as_str());
    logger_init(&log).context("logger init")?;
    info!(version = env!("CARGO_PKG_VERSION"), "ctfvm-agentd starting");

    match args.command.unwrap_or_default() {
        Command::Serve(opts) => serve::run(opts).await,
        Command::Seed(seed) => {
            let report = ctfvm_catalog::seed(&seed.source, &seed.catalog_path)
                .with_context(|| format!("seed from {}", seed.source.display()))?;
            info!(
                added = report.added,
                updated = report.updated,
                skipped = report.skipped,
                "seed finished"
            );
            Ok(())
        }
    }
}
