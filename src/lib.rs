pub mod config;
pub mod dashboard;
pub mod error;
pub mod identity;
pub mod shell;
pub mod store;
pub mod types;
pub mod ui;
pub mod workflow;

use std::sync::Arc;

use config::Config;
use dashboard::Dashboard;
use error::DashboardError;
use identity::IdentityStore;
use store::{MemoryStore, PostgrestStore};

/// Initialise `env_logger`, defaulting to `info` unless `RUST_LOG` is set.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    // Tests and embedders may have installed a logger already.
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Start the dashboard against the configured store.
///
/// Missing store credentials abort here, before anything is shown. With
/// `offline` the session uses an in-process store instead.
pub async fn run(offline: bool) -> Result<(), DashboardError> {
    let identities = IdentityStore::in_dir(&config::state_dir()?);

    if offline {
        log::info!("Running offline: values are kept in memory only");
        let dashboard = Dashboard::open(Arc::new(MemoryStore::new()), identities);
        return shell::run(dashboard).await;
    }

    let settings = Config::load()?.store_settings()?;
    let store = PostgrestStore::new(&settings).map_err(|e| {
        DashboardError::Configuration(format!("Failed to build store client: {}", e))
    })?;
    log::info!(
        "Using chart store {} (table {})",
        settings.url,
        settings.table
    );

    let dashboard = Dashboard::open(Arc::new(store), identities);
    shell::run(dashboard).await
}
