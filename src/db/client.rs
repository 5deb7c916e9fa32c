//! Data client seam.
//!
//! The hosted database is consumed only through this trait: CRUD with
//! simple filters, raw SQL, and idempotent table creation. Rows are JSON
//! objects keyed by a string `id`.

use serde_json::{Map, Value};

use super::{DatabaseError, Table};

/// One record as exchanged with the data client.
pub type Row = Map<String, Value>;

/// Comparison applied to a row field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Gte(String, Value),
    Lte(String, Value),
}

impl Filter {
    pub fn field(&self) -> &str {
        match self {
            Self::Eq(field, _) | Self::Gte(field, _) | Self::Lte(field, _) => field,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Self::Eq(_, value) | Self::Gte(_, value) | Self::Lte(_, value) => value,
        }
    }

    pub fn operator(&self) -> &'static str {
        match self {
            Self::Eq(..) => "=",
            Self::Gte(..) => ">=",
            Self::Lte(..) => "<=",
        }
    }
}

/// Select query: filters are AND-ed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<(String, bool)>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn gte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(field.to_string(), value.into()));
        self
    }

    pub fn lte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte(field.to_string(), value.into()));
        self
    }

    /// Order by a row field; `ascending = false` sorts newest/largest first.
    pub fn order_by(mut self, field: &str, ascending: bool) -> Self {
        self.order = Some((field.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Capability surface of the remote database.
///
/// Implementations must be shareable across the composition root, hence
/// `Send + Sync`; calls are otherwise issued one at a time.
pub trait DataClient: Send + Sync {
    fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, DatabaseError>;

    fn count(&self, table: Table) -> Result<u64, DatabaseError>;

    /// Insert a row. A missing `id` is generated; the stored row is returned.
    fn insert(&self, table: Table, row: Row) -> Result<Row, DatabaseError>;

    /// Merge `changes` into the row with `id`; returns the merged row.
    fn update(&self, table: Table, id: &str, changes: Row) -> Result<Row, DatabaseError>;

    fn delete(&self, table: Table, id: &str) -> Result<(), DatabaseError>;

    /// Raw SQL execution (`exec_sql` RPC).
    fn exec_sql(&self, sql: &str) -> Result<(), DatabaseError>;

    fn table_exists(&self, table: Table) -> Result<bool, DatabaseError>;

    /// Idempotent creation (`create_table_if_not_exists` RPC). Backends may
    /// still report `DbErrorKind::AlreadyExists`; callers treat it as success.
    fn create_table_if_not_exists(&self, table: Table) -> Result<(), DatabaseError>;
}

/// Read a string field from a row.
pub fn row_str<'a>(row: &'a Row, field: &str) -> Option<&'a str> {
    row.get(field).and_then(Value::as_str)
}
