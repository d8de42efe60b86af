//! Batch runner that appends the latest COVID-19 case counts by zip code to
//! one CSV table per region.

mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use reqwest::Client;
use tracing::{error, info};
use zipcases_core::{plugin::PluginRegistry, service::ZipcasesService};
use zipcases_provider_arcgis as arcgis;

use crate::config::ZipcasesConfig;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "zipcases", version, about)]
struct Args {
    /// TOML file overriding the built-in region table.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the region tables.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Only update the named region (repeatable).
    #[arg(long = "region", value_name = "NAME")]
    regions: Vec<String>,
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    logging::init_logging(args.verbose);

    let mut cfg = ZipcasesConfig::load(args.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        cfg.data_dir = data_dir;
    }

    // HTTP + service setup
    let client = Client::builder().user_agent(cfg.user_agent.as_str()).build()?;

    let plugins = cfg
        .regions
        .iter()
        .map(|source| arcgis::plugin(client.clone(), source))
        .collect();
    let mut registry = PluginRegistry::new(plugins);
    if !args.regions.is_empty() {
        registry.retain(|plugin| args.regions.contains(&plugin.meta.name));
    }
    if registry.is_empty() {
        anyhow::bail!("no regions selected");
    }
    let registry = Arc::new(registry);
    let service = ZipcasesService::new(registry, cfg.data_dir);

    info!(
        regions = service.regions().len(),
        data_dir = %service.data_dir().display(),
        "starting batch"
    );
    let report = service.run_batch().await;

    for update in &report.succeeded {
        info!(region = %update.region, date = %update.date, path = %update.path.display(), "updated");
    }
    for (region, reason) in &report.failed {
        error!(region = %region, reason = %reason, "not updated");
    }
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "batch finished"
    );

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
