//!
//! warden-sync operator command
//! -----------------------------
//! Builds the permission registry from the configured metadata source and pushes its declared
//! role grants into the policy store once. Safe to re-run: grants already present are skipped
//! and nothing is ever removed.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use warden::authz::{build, sync_from_registry};
use warden::config::{conf_path_from_args, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    let cfg = Config::resolve(conf_path_from_args(&args).as_deref())?;
    cfg.validate_sync()?;

    let source = warden::server::metadata_source(&cfg);
    let snapshot = build(source.as_ref()).context("While building the permission registry")?;
    let engine = warden::server::open_engine(&cfg)?;
    let report = sync_from_registry(&snapshot, engine.as_ref()).await.context("While syncing registry grants")?;
    println!("registry v{}: {} grant(s) submitted, {} newly inserted", snapshot.version(), report.submitted, report.inserted);
    Ok(())
}
