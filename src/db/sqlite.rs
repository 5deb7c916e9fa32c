use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use super::client::{row_str, DataClient, Query, Row};
use super::{DatabaseError, Table, TableName, TenantId};

/// Open a SQLite connection to the given path with the standard pragmas.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// SQLite-backed data client.
///
/// Each logical table is a tenant-scoped table of JSON documents. The
/// connection sits behind a mutex so the client can be shared; calls are
/// serialized.
pub struct SqliteDataClient {
    conn: Mutex<Connection>,
    tenant: TenantId,
}

impl SqliteDataClient {
    pub fn new(conn: Connection, tenant: TenantId) -> Self {
        Self {
            conn: Mutex::new(conn),
            tenant,
        }
    }

    pub fn open(path: &Path, tenant: TenantId) -> Result<Self, DatabaseError> {
        Ok(Self::new(open_database(path)?, tenant))
    }

    pub fn open_in_memory(tenant: TenantId) -> Result<Self, DatabaseError> {
        Ok(Self::new(open_memory_database()?, tenant))
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }

    fn name(&self, table: Table) -> TableName {
        TableName::new(self.tenant, table)
    }

    fn fetch(
        conn: &Connection,
        name: &TableName,
        id: &str,
    ) -> Result<Option<Row>, DatabaseError> {
        let raw: Option<String> = conn
            .query_row(
                &format!("SELECT data FROM {name} WHERE id = ?1"),
                [id],
                |row| row.get(0),
            )
            .optional()?;
        raw.as_deref().map(parse_row).transpose()
    }
}

impl DataClient for SqliteDataClient {
    fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, DatabaseError> {
        let name = self.name(table);
        let mut sql = format!("SELECT data FROM {name}");
        let mut bound: Vec<SqlValue> = Vec::new();

        for (index, filter) in query.filters.iter().enumerate() {
            sql.push_str(if index == 0 { " WHERE " } else { " AND " });
            sql.push_str(&format!("json_extract(data, ?) {} ?", filter.operator()));
            bound.push(SqlValue::Text(json_path(filter.field())?));
            bound.push(to_sql_value(filter.value()));
        }
        if let Some((field, ascending)) = &query.order {
            let direction = if *ascending { "ASC" } else { "DESC" };
            sql.push_str(&format!(" ORDER BY json_extract(data, ?) {direction}, rowid ASC"));
            bound.push(SqlValue::Text(json_path(field)?));
        } else {
            sql.push_str(" ORDER BY created_at ASC, rowid ASC");
        }
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bound.push(SqlValue::Integer(i64::from(limit)));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params_from_iter(bound.iter()), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        raws.iter().map(|raw| parse_row(raw)).collect()
    }

    fn count(&self, table: Table) -> Result<u64, DatabaseError> {
        let name = self.name(table);
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {name}"), [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn insert(&self, table: Table, mut row: Row) -> Result<Row, DatabaseError> {
        let existing = row_str(&row, "id")
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                row.insert("id".into(), Value::String(id.clone()));
                id
            }
        };
        let data = serde_json::to_string(&row)?;
        let name = self.name(table);
        let conn = self.conn()?;

        match table.parent() {
            Some((field, _)) => {
                conn.execute(
                    &format!("INSERT INTO {name} (id, parent_id, data) VALUES (?1, ?2, ?3)"),
                    params![id, row_str(&row, field), data],
                )?;
            }
            None => {
                conn.execute(
                    &format!("INSERT INTO {name} (id, data) VALUES (?1, ?2)"),
                    params![id, data],
                )?;
            }
        }
        Ok(row)
    }

    fn update(&self, table: Table, id: &str, mut changes: Row) -> Result<Row, DatabaseError> {
        let name = self.name(table);
        let conn = self.conn()?;
        let mut row = Self::fetch(&conn, &name, id)?.ok_or_else(|| DatabaseError::NotFound {
            entity_type: table.as_str().to_string(),
            id: id.to_string(),
        })?;

        changes.remove("id");
        row.extend(changes);
        let data = serde_json::to_string(&row)?;

        match table.parent() {
            Some((field, _)) => {
                conn.execute(
                    &format!("UPDATE {name} SET data = ?1, parent_id = ?2 WHERE id = ?3"),
                    params![data, row_str(&row, field), id],
                )?;
            }
            None => {
                conn.execute(
                    &format!("UPDATE {name} SET data = ?1 WHERE id = ?2"),
                    params![data, id],
                )?;
            }
        }
        Ok(row)
    }

    fn delete(&self, table: Table, id: &str) -> Result<(), DatabaseError> {
        let name = self.name(table);
        let conn = self.conn()?;
        let deleted = conn.execute(&format!("DELETE FROM {name} WHERE id = ?1"), [id])?;
        if deleted == 0 {
            return Err(DatabaseError::NotFound {
                entity_type: table.as_str().to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn exec_sql(&self, sql: &str) -> Result<(), DatabaseError> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    fn table_exists(&self, table: Table) -> Result<bool, DatabaseError> {
        let name = self.name(table);
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?1",
            [name.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn create_table_if_not_exists(&self, table: Table) -> Result<(), DatabaseError> {
        let ddl = TableName::ddl(self.tenant, table);
        self.conn()?.execute_batch(&ddl)?;
        tracing::debug!(table = %self.name(table), "Ensured table exists");
        Ok(())
    }
}

/// JSON path for a row field. Field names are plain identifiers.
fn json_path(field: &str) -> Result<String, DatabaseError> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(DatabaseError::InvalidRow(format!(
            "invalid field name in query: {field:?}"
        )));
    }
    Ok(format!("$.{field}"))
}

/// `json_extract` yields 1/0 for booleans and native numbers; bind to match.
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => SqlValue::Real(number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn parse_row(raw: &str) -> Result<Row, DatabaseError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(row) => Ok(row),
        other => Err(DatabaseError::InvalidRow(format!(
            "expected JSON object, found {other}"
        ))),
    }
}
