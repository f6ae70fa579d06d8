use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use customer_normalizer::cli::Cli;
use customer_normalizer::logging::init_logging;
use customer_normalizer::orchestrator;
use customer_normalizer::util::envfile::{load_dotenv_if_present, write_env_template};

fn main() {
    // .env must be applied before clap reads CUSTNORM_* and before the logger reads RUST_LOG
    let dotenv = load_dotenv_if_present();
    init_logging();
    match dotenv {
        Ok(n) if n > 0 => info!("Applied {} variable(s) from .env", n),
        Ok(_) => {}
        Err(e) => log::warn!("Ignoring .env: {:#}", e),
    }

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.write_env_template {
        write_env_template(path)?;
        println!(
            "Wrote {}. Copy to .env and edit values as needed.",
            path.display()
        );
        return Ok(());
    }

    let cfg = cli.to_app_config().context("invalid configuration")?;
    if let Ok(json) = serde_json::to_string(&cfg) {
        log::debug!("Effective configuration: {}", json);
    }

    let summary = orchestrator::run(&cfg, &cli.uploads)?;
    if !summary.unmatched.is_empty() {
        println!("Unmatched names ({}):", summary.unmatched.len());
        for name in &summary.unmatched {
            println!("  {}", name);
        }
    }
    println!("Normalized: {}", summary.normalized_path.display());
    println!(
        "Filtered:   {} ({} rows)",
        summary.filtered_path.display(),
        summary.filtered_rows
    );
    Ok(())
}
