//! Typed table registry.
//!
//! Every table the application touches is a `Table` variant. Physical
//! names are derived from a `(TenantId, Table)` pair in exactly one place
//! (`TableName`), so no call site assembles table names from strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical tables, in the order the bootstrap creates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Patients,
    Visits,
    Vitals,
    Prescriptions,
    Invoices,
    InventoryItems,
    AuditLog,
}

impl Table {
    /// Primary domain table the bootstrap checks for rows.
    pub const PRIMARY: Table = Table::Patients;

    /// Creation order: the primary table first, dependents after it.
    pub const BOOTSTRAP_ORDER: [Table; 7] = [
        Table::Patients,
        Table::Visits,
        Table::Vitals,
        Table::Prescriptions,
        Table::Invoices,
        Table::InventoryItems,
        Table::AuditLog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patients => "patients",
            Self::Visits => "visits",
            Self::Vitals => "vitals",
            Self::Prescriptions => "prescriptions",
            Self::Invoices => "invoices",
            Self::InventoryItems => "inventory_items",
            Self::AuditLog => "audit_log",
        }
    }

    /// Row field holding the parent id, and the parent table it references.
    pub fn parent(&self) -> Option<(&'static str, Table)> {
        match self {
            Self::Visits | Self::Vitals | Self::Prescriptions | Self::Invoices => {
                Some(("patientId", Table::Patients))
            }
            Self::Patients | Self::InventoryItems | Self::AuditLog => None,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant identifier. Only constructible from the static tenant registry,
/// so it is always a lowercase SQL-safe identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TenantId(&'static str);

impl TenantId {
    pub(crate) const fn new_static(id: &'static str) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Physical, tenant-scoped table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn new(tenant: TenantId, table: Table) -> Self {
        Self(format!("{}_{}", tenant.as_str(), table.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table.
    ///
    /// Rows are JSON documents; dependents carry an indexed parent column
    /// with a foreign key to the parent table of the same tenant.
    pub fn ddl(tenant: TenantId, table: Table) -> String {
        let name = Self::new(tenant, table);
        match table.parent() {
            None => format!(
                "CREATE TABLE IF NOT EXISTS {name} (
                    id TEXT PRIMARY KEY NOT NULL,
                    data TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );"
            ),
            Some((_, parent)) => {
                let parent_name = Self::new(tenant, parent);
                format!(
                    "CREATE TABLE IF NOT EXISTS {name} (
                        id TEXT PRIMARY KEY NOT NULL,
                        parent_id TEXT REFERENCES {parent_name}(id) ON DELETE CASCADE,
                        data TEXT NOT NULL,
                        created_at TEXT NOT NULL DEFAULT (datetime('now'))
                    );
                    CREATE INDEX IF NOT EXISTS idx_{name}_parent ON {name}(parent_id);"
                )
            }
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
