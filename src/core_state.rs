//! Application composition root.
//!
//! `CoreState` owns every collaborator (data client, local store,
//! notifier) and the stores built on them. Nothing is ambient: embedders
//! build one `CoreState`, call `init()`, and pass it around behind an `Arc`.

use std::sync::Arc;

use thiserror::Error;

use crate::bootstrap::BootstrapSequencer;
use crate::config::{AppConfig, ConfigError};
use crate::db::{audit, DataClient, DatabaseError, SqliteDataClient};
use crate::features::{Feature, FeaturePolicy};
use crate::local_store::{FileStore, LocalStore, StoreError};
use crate::models::{Credentials, PracticeSettings, Session};
use crate::notify::{Notifier, TracingNotifier};
use crate::outcome::OpOutcome;
use crate::patients::PatientService;
use crate::practice::PracticeSettingsStore;
use crate::session::{SessionError, SessionStore};
use crate::tenant::{TenantConfig, TenantError, TenantRegistry};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    client: Arc<dyn DataClient>,
    notifier: Arc<dyn Notifier>,
    tenant: TenantConfig,
    tenants: TenantRegistry,
    session: SessionStore,
    settings: PracticeSettingsStore,
}

impl CoreState {
    /// Open the on-disk store and database described by `config`.
    ///
    /// The database is scoped to the tenant selected in local storage.
    pub fn open(config: AppConfig) -> Result<Self, CoreError> {
        let store: Arc<dyn LocalStore> = Arc::new(FileStore::open(&config.data_dir)?);
        let tenant = TenantRegistry::new(store.clone()).current();
        let client = Arc::new(SqliteDataClient::open(&config.database_path, tenant.id)?);
        tracing::info!(
            tenant = %tenant.id,
            database = %config.database_path.display(),
            "Core state opened"
        );
        Ok(Self::with_parts(config, client, store, Arc::new(TracingNotifier)))
    }

    /// Assemble from explicit collaborators.
    pub fn with_parts(
        config: AppConfig,
        client: Arc<dyn DataClient>,
        store: Arc<dyn LocalStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let tenants = TenantRegistry::new(store.clone());
        Self {
            config,
            tenant: tenants.current(),
            tenants,
            session: SessionStore::new(store.clone()),
            settings: PracticeSettingsStore::new(store, notifier.clone()),
            client,
            notifier,
        }
    }

    /// Restore the persisted session and load practice settings.
    pub fn init(&self) -> Result<Option<Session>, CoreError> {
        let session = self.session.restore_on_startup()?;
        self.settings.load();
        tracing::info!(
            authenticated = session.is_some(),
            practice_configured = self.settings.settings().is_some(),
            "Core state initialized"
        );
        Ok(session)
    }

    /// Log out and drop in-memory settings.
    pub fn reset(&self) -> Result<(), CoreError> {
        self.session.logout()?;
        self.settings.reset();
        tracing::info!("Core state reset");
        Ok(())
    }

    // ── Session ─────────────────────────────────────────────

    pub fn login(&self, credentials: &Credentials) -> OpOutcome<Session> {
        match self.session.login(credentials) {
            Ok(outcome) => {
                if let Some(session) = outcome.data() {
                    audit::record(
                        self.client.as_ref(),
                        "login",
                        "session",
                        Some(&session.email),
                    );
                }
                outcome
            }
            Err(e) => {
                tracing::warn!("Login failed: {e}");
                OpOutcome::failed(e.to_string())
            }
        }
    }

    pub fn logout(&self) -> Result<(), CoreError> {
        if let Some(session) = self.session.current() {
            audit::record(
                self.client.as_ref(),
                "logout",
                "session",
                Some(&session.email),
            );
        }
        self.session.logout()?;
        Ok(())
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session.current()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    fn require_session(&self) -> Result<Session, CoreError> {
        self.session.current().ok_or(CoreError::NoActiveSession)
    }

    // ── Database ────────────────────────────────────────────

    /// Bootstrap sequencer for the current tenant. Requires a session.
    pub fn bootstrap(&self) -> Result<BootstrapSequencer, CoreError> {
        self.require_session()?;
        Ok(BootstrapSequencer::new(self.client.clone())
            .with_completion_delay(self.config.completion_delay))
    }

    /// Patient records service. Requires a session.
    pub fn patients(&self) -> Result<PatientService, CoreError> {
        self.require_session()?;
        Ok(PatientService::new(
            self.client.clone(),
            self.notifier.clone(),
            self.config.data_mode,
        ))
    }

    // ── Practice settings ───────────────────────────────────

    pub fn practice_settings(&self) -> Option<PracticeSettings> {
        self.settings.settings()
    }

    /// Saved settings, or a prefill from the tenant for the settings form.
    pub fn suggested_settings(&self) -> PracticeSettings {
        self.settings.settings().unwrap_or_else(|| {
            PracticeSettings::new(self.tenant.name, self.tenant.practice_type_hint)
        })
    }

    pub fn save_settings(&self, settings: PracticeSettings) -> OpOutcome<PracticeSettings> {
        let outcome = self.settings.save(settings);
        if outcome.is_success() {
            let actor = self.session.current().map(|s| s.email);
            audit::record(
                self.client.as_ref(),
                "save",
                "practice_settings",
                actor.as_deref(),
            );
        }
        outcome
    }

    pub fn is_loading_settings(&self) -> bool {
        self.settings.is_loading()
    }

    pub fn features(&self) -> FeaturePolicy {
        self.settings.features()
    }

    pub fn is_feature_enabled(&self, feature: Feature) -> bool {
        self.settings.features().is_enabled(feature)
    }

    // ── Tenants ─────────────────────────────────────────────

    /// Tenant this state was opened for.
    pub fn tenant(&self) -> TenantConfig {
        self.tenant
    }

    pub fn tenants(&self) -> &'static [TenantConfig] {
        self.tenants.list()
    }

    /// Persist a tenant selection; it applies on the next `open`.
    pub fn select_tenant(&self, id: &str) -> Result<TenantConfig, CoreError> {
        Ok(self.tenants.select(id)?)
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("No active session")]
    NoActiveSession,
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Local storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error("Tenant error: {0}")]
    Tenant(#[from] TenantError),
}
