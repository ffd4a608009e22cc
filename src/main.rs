//!
//! warden server binary
//! ---------------------
//! Starts the HTTP server. Configuration comes from `--conf <path>` (JSON) and `WARDEN_*`
//! environment variables; see `warden::config`.

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    let conf = warden::config::conf_path_from_args(&args);
    let cfg = warden::config::Config::load(conf.as_deref())?;

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "warden {} starting: RUST_LOG='{}', http_addr={}, auto_sync={}, policy_path={:?}, manifest_path={:?}",
        env!("CARGO_PKG_VERSION"), rust_log, cfg.server.http_addr, cfg.authz.auto_sync, cfg.authz.policy_path, cfg.authz.manifest_path
    );

    warden::server::run(cfg).await
}
