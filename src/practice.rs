//! Practice settings store.
//!
//! Holds the current practice configuration and the feature policy
//! derived from it. `features` always matches the practice type of the
//! last successful load or save.

use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::features::FeaturePolicy;
use crate::local_store::{LocalStore, StorageKey, StoreError};
use crate::models::PracticeSettings;
use crate::notify::{Notification, Notifier};
use crate::outcome::OpOutcome;
use crate::validation::is_valid_email;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Practice name is required")]
    MissingName,
    #[error("Invalid practice email: {0}")]
    InvalidEmail(String),
    #[error("Settings storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("Settings encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Internal lock error")]
    LockPoisoned,
}

#[derive(Debug, Clone)]
struct SettingsState {
    settings: Option<PracticeSettings>,
    features: FeaturePolicy,
    loading: bool,
}

pub struct PracticeSettingsStore {
    store: Arc<dyn LocalStore>,
    notifier: Arc<dyn Notifier>,
    state: RwLock<SettingsState>,
}

impl PracticeSettingsStore {
    pub fn new(store: Arc<dyn LocalStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            state: RwLock::new(SettingsState {
                settings: None,
                features: FeaturePolicy::default(),
                loading: true,
            }),
        }
    }

    /// Load persisted settings, if any.
    ///
    /// A value that is not a settings object is dropped and the practice
    /// keeps running on defaults; it is not retried. An unrecognized
    /// practice type keeps the record and resolves to the all-off policy.
    /// Loading ends in every case.
    pub fn load(&self) {
        let loaded = match self.store.get(StorageKey::PracticeSettings) {
            Ok(Some(raw)) => match serde_json::from_str::<PracticeSettings>(&raw) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    tracing::warn!("Discarding unreadable practice settings: {e}");
                    if let Err(e) = self.store.remove(StorageKey::PracticeSettings) {
                        tracing::warn!("Failed to remove practice settings: {e}");
                    }
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read practice settings: {e}");
                None
            }
        };

        if let Ok(mut state) = self.state.write() {
            if let Some(settings) = loaded {
                state.features = FeaturePolicy::for_practice_type(settings.practice_type);
                tracing::info!(practice_type = %settings.practice_type, "Practice settings loaded");
                state.settings = Some(settings);
            }
            state.loading = false;
        }
    }

    /// Validate, persist, then publish new settings.
    ///
    /// All-or-nothing: in-memory state changes only after the write
    /// succeeds. Success and failure are both reported to the notifier.
    pub fn save(&self, settings: PracticeSettings) -> OpOutcome<PracticeSettings> {
        match self.try_save(settings) {
            Ok(saved) => {
                self.notifier
                    .notify(Notification::success("Practice settings saved"));
                OpOutcome::ok(saved)
            }
            Err(e) => {
                tracing::warn!("Saving practice settings failed: {e}");
                self.notifier
                    .notify(Notification::error(format!("Failed to save settings: {e}")));
                OpOutcome::failed(e.to_string())
            }
        }
    }

    fn try_save(&self, mut settings: PracticeSettings) -> Result<PracticeSettings, SettingsError> {
        settings.practice_name = settings.practice_name.trim().to_string();
        if settings.practice_name.is_empty() {
            return Err(SettingsError::MissingName);
        }
        settings.email = settings.email.trim().to_string();
        if !settings.email.is_empty() && !is_valid_email(&settings.email) {
            return Err(SettingsError::InvalidEmail(settings.email));
        }

        if settings.id.is_none() {
            let existing = self.settings().and_then(|current| current.id);
            settings.id = Some(existing.unwrap_or_else(new_practice_id));
        }
        let features = FeaturePolicy::for_practice_type(settings.practice_type);

        self.store
            .set(StorageKey::PracticeSettings, &serde_json::to_string(&settings)?)?;

        let mut state = self.state.write().map_err(|_| SettingsError::LockPoisoned)?;
        state.settings = Some(settings.clone());
        state.features = features;
        tracing::info!(practice_type = %settings.practice_type, "Practice settings saved");
        Ok(settings)
    }

    /// Stored settings, or `None` when the practice is unconfigured.
    pub fn settings(&self) -> Option<PracticeSettings> {
        self.state.read().ok().and_then(|state| state.settings.clone())
    }

    /// Stored settings, falling back to the implicit defaults.
    pub fn effective_settings(&self) -> PracticeSettings {
        self.settings().unwrap_or_default()
    }

    pub fn features(&self) -> FeaturePolicy {
        self.state
            .read()
            .map(|state| state.features)
            .unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().map(|state| state.loading).unwrap_or(false)
    }

    /// Forget in-memory settings; persisted settings are kept.
    pub fn reset(&self) {
        if let Ok(mut state) = self.state.write() {
            state.settings = None;
            state.features = FeaturePolicy::default();
            state.loading = true;
        }
    }
}

fn new_practice_id() -> String {
    format!("practice-{}", chrono::Utc::now().timestamp_millis())
}
