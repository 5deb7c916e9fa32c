use serde_json::json;

use super::client::DataClient;
use super::Table;

/// Append an entry to the audit log.
///
/// Best effort: a missing table (before bootstrap) is expected and logged
/// at debug; other failures are logged as warnings. Never fails the caller.
pub fn record(client: &dyn DataClient, action: &str, entity: &str, actor: Option<&str>) {
    let row = json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "action": action,
        "entity": entity,
        "actor": actor,
    });
    let serde_json::Value::Object(row) = row else {
        return;
    };
    match client.insert(Table::AuditLog, row) {
        Ok(_) => {}
        Err(e) if e.is_missing_table() => {
            tracing::debug!(action, "Audit log not available yet");
        }
        Err(e) => tracing::warn!(action, "Failed to write audit entry: {e}"),
    }
}
