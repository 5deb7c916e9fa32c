pub mod bootstrap; // Database bootstrap state machine
pub mod config;
pub mod core_state; // Composition root
pub mod db;
pub mod features; // Practice-type feature policy
pub mod local_store;
pub mod models;
pub mod notify;
pub mod outcome;
pub mod patients;
pub mod practice; // Practice settings store
pub mod session;
pub mod tenant;
pub mod validation;

pub use bootstrap::{BootstrapPhase, BootstrapSequencer, BootstrapStatus};
pub use config::{AppConfig, DataMode};
pub use core_state::{CoreError, CoreState};
pub use features::{resolve_features, Feature, FeaturePolicy};
pub use outcome::OpOutcome;

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, honouring `RUST_LOG`.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

/// Start from the process environment: logging, configuration, storage,
/// then session and settings restore.
pub fn start() -> Result<CoreState, CoreError> {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let state = CoreState::open(AppConfig::from_env()?)?;
    state.init()?;
    Ok(state)
}
