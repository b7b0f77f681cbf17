//! Staff roster management.
//!
//! Staff members are referenced by sales records through their display
//! name captured at sale time, so renames and deletions never rewrite
//! history.

use rusqlite::params;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::db::DbState;

/// Add a staff member. The name is trimmed and must be non-empty.
pub fn add_staff(db: &DbState, tenant_id: &str, name: &str) -> Result<Value, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Staff name must not be empty".into());
    }

    let staff_id = Uuid::new_v4().to_string();
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO staff (id, tenant_id, name) VALUES (?1, ?2, ?3)",
        params![staff_id, tenant_id, name],
    )
    .map_err(|e| format!("insert staff: {e}"))?;

    info!(tenant_id, staff_id = %staff_id, name, "Staff member added");
    Ok(serde_json::json!({ "success": true, "id": staff_id, "name": name }))
}

/// Rename a staff member.
pub fn rename_staff(
    db: &DbState,
    tenant_id: &str,
    staff_id: &str,
    name: &str,
) -> Result<Value, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Staff name must not be empty".into());
    }

    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let n = conn
        .execute(
            "UPDATE staff SET name = ?1, updated_at = datetime('now')
             WHERE tenant_id = ?2 AND id = ?3",
            params![name, tenant_id, staff_id],
        )
        .map_err(|e| format!("update staff: {e}"))?;
    if n == 0 {
        return Err(format!("Staff member not found: {staff_id}"));
    }
    Ok(serde_json::json!({ "success": true, "id": staff_id, "name": name }))
}

/// Remove a staff member. Past sales keep the captured name.
pub fn delete_staff(db: &DbState, tenant_id: &str, staff_id: &str) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let n = conn
        .execute(
            "DELETE FROM staff WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, staff_id],
        )
        .map_err(|e| format!("delete staff: {e}"))?;
    if n == 0 {
        return Err(format!("Staff member not found: {staff_id}"));
    }
    info!(tenant_id, staff_id, "Staff member removed");
    Ok(serde_json::json!({ "success": true }))
}

/// List staff alphabetically.
pub fn list_staff(db: &DbState, tenant_id: &str) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare("SELECT id, name FROM staff WHERE tenant_id = ?1 ORDER BY name COLLATE NOCASE")
        .map_err(|e| format!("prepare list staff: {e}"))?;

    let rows = stmt
        .query_map(params![tenant_id], |row| {
            Ok(serde_json::json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
            }))
        })
        .map_err(|e| format!("query staff: {e}"))?;

    Ok(Value::Array(rows.filter_map(|r| r.ok()).collect()))
}

// ===========================================================================
// Tests
// ===========================================================================
