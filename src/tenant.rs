//! Tenant registry.
//!
//! Tenants are a fixed, compiled-in list. The selected tenant id is kept
//! in local storage; a missing, unknown or unreadable value falls back to
//! the default tenant.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::db::TenantId;
use crate::local_store::{LocalStore, StorageKey, StoreError};
use crate::models::PracticeType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    #[serde(serialize_with = "serialize_tenant_id")]
    pub id: TenantId,
    pub name: &'static str,
    /// Practice type suggested when the tenant has no saved settings.
    pub practice_type_hint: PracticeType,
}

fn serialize_tenant_id<S: serde::Serializer>(id: &TenantId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(id.as_str())
}

pub const TENANTS: [TenantConfig; 3] = [
    TenantConfig {
        id: TenantId::new_static("medlinkx"),
        name: "MedLinkX General Hospital",
        practice_type_hint: PracticeType::Hospital,
    },
    TenantConfig {
        id: TenantId::new_static("northside_family"),
        name: "Northside Family Practice",
        practice_type_hint: PracticeType::FamilyPractice,
    },
    TenantConfig {
        id: TenantId::new_static("solo_clinic"),
        name: "Solo Clinic",
        practice_type_hint: PracticeType::Individual,
    },
];

pub const DEFAULT_TENANT: TenantConfig = TENANTS[0];

#[derive(Error, Debug)]
pub enum TenantError {
    #[error("Unknown tenant: {0}")]
    Unknown(String),
    #[error("Tenant storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("Tenant encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub fn find_tenant(id: &str) -> Option<TenantConfig> {
    TENANTS.iter().copied().find(|t| t.id.as_str() == id)
}

pub struct TenantRegistry {
    store: Arc<dyn LocalStore>,
}

impl TenantRegistry {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> &'static [TenantConfig] {
        &TENANTS
    }

    /// Selected tenant, or the default.
    pub fn current(&self) -> TenantConfig {
        let raw = match self.store.get(StorageKey::Tenant) {
            Ok(Some(raw)) => raw,
            Ok(None) => return DEFAULT_TENANT,
            Err(e) => {
                tracing::warn!("Failed to read tenant selection: {e}");
                return DEFAULT_TENANT;
            }
        };
        match serde_json::from_str::<String>(&raw)
            .ok()
            .and_then(|id| find_tenant(&id))
        {
            Some(tenant) => tenant,
            None => {
                tracing::warn!("Discarding invalid tenant selection");
                if let Err(e) = self.store.remove(StorageKey::Tenant) {
                    tracing::warn!("Failed to remove tenant selection: {e}");
                }
                DEFAULT_TENANT
            }
        }
    }

    /// Persist a tenant selection. Takes effect the next time the data
    /// client is opened.
    pub fn select(&self, id: &str) -> Result<TenantConfig, TenantError> {
        let tenant = find_tenant(id).ok_or_else(|| TenantError::Unknown(id.to_string()))?;
        self.store
            .set(StorageKey::Tenant, &serde_json::to_string(tenant.id.as_str())?)?;
        tracing::info!(tenant = %tenant.id, "Tenant selected");
        Ok(tenant)
    }
}
