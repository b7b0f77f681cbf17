//! Supplier order tracking.
//!
//! Orders move through Pending, Shipped, Received, and Cancelled.
//! Received orders count as purchase costs in the profit/loss report.

use chrono::Utc;
use rusqlite::params;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::db::DbState;
use crate::{value_f64, value_str};

/// Order lifecycle states, stored as display strings.
pub const ORDER_STATUSES: &[&str] = &["Pending", "Shipped", "Received", "Cancelled"];

fn validate_status(status: &str) -> Result<(), String> {
    if ORDER_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(format!(
            "Invalid status: {status}. Must be one of {ORDER_STATUSES:?}"
        ))
    }
}

/// Add a supplier order from `{ supplier, total?, status?, date? }`.
///
/// New orders default to Pending, dated now.
pub fn add_order(db: &DbState, tenant_id: &str, payload: &Value) -> Result<Value, String> {
    let supplier = value_str(payload, &["supplier"]).ok_or("Missing supplier")?;
    let total = value_f64(payload, &["total"]).unwrap_or(0.0);
    if total < 0.0 {
        return Err("Total must not be negative".into());
    }
    let status = value_str(payload, &["status"]).unwrap_or_else(|| "Pending".to_string());
    validate_status(&status)?;
    let date = value_str(payload, &["date"]).unwrap_or_else(|| Utc::now().to_rfc3339());

    let order_id = Uuid::new_v4().to_string();
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO supplier_orders (id, tenant_id, supplier, date, status, total)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![order_id, tenant_id, supplier, date, status, total],
    )
    .map_err(|e| format!("insert order: {e}"))?;

    info!(tenant_id, order_id = %order_id, supplier = %supplier, total, "Supplier order added");
    Ok(serde_json::json!({
        "success": true,
        "id": order_id,
        "supplier": supplier,
        "date": date,
        "status": status,
        "total": total,
    }))
}

/// Update supplier and/or total on an existing order.
pub fn update_order(
    db: &DbState,
    tenant_id: &str,
    order_id: &str,
    payload: &Value,
) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let (supplier, total) = conn
        .query_row(
            "SELECT supplier, total FROM supplier_orders WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, order_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
        )
        .map_err(|_| format!("Order not found: {order_id}"))?;

    let supplier = value_str(payload, &["supplier"]).unwrap_or(supplier);
    let total = value_f64(payload, &["total"]).unwrap_or(total);
    if total < 0.0 {
        return Err("Total must not be negative".into());
    }

    conn.execute(
        "UPDATE supplier_orders SET supplier = ?1, total = ?2, updated_at = datetime('now')
         WHERE tenant_id = ?3 AND id = ?4",
        params![supplier, total, tenant_id, order_id],
    )
    .map_err(|e| format!("update order: {e}"))?;

    Ok(serde_json::json!({ "success": true, "id": order_id, "supplier": supplier, "total": total }))
}

/// Set an order's lifecycle status.
pub fn set_status(
    db: &DbState,
    tenant_id: &str,
    order_id: &str,
    status: &str,
) -> Result<Value, String> {
    validate_status(status)?;

    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let n = conn
        .execute(
            "UPDATE supplier_orders SET status = ?1, updated_at = datetime('now')
             WHERE tenant_id = ?2 AND id = ?3",
            params![status, tenant_id, order_id],
        )
        .map_err(|e| format!("update order status: {e}"))?;
    if n == 0 {
        return Err(format!("Order not found: {order_id}"));
    }

    info!(tenant_id, order_id, status, "Supplier order status changed");
    Ok(serde_json::json!({ "success": true, "id": order_id, "status": status }))
}

/// Delete an order.
pub fn delete_order(db: &DbState, tenant_id: &str, order_id: &str) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let n = conn
        .execute(
            "DELETE FROM supplier_orders WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, order_id],
        )
        .map_err(|e| format!("delete order: {e}"))?;
    if n == 0 {
        return Err(format!("Order not found: {order_id}"));
    }
    Ok(serde_json::json!({ "success": true }))
}

/// List orders newest first, optionally filtered by status, with the
/// running total of the listed orders.
pub fn list_orders(
    db: &DbState,
    tenant_id: &str,
    status: Option<&str>,
) -> Result<Value, String> {
    if let Some(s) = status {
        validate_status(s)?;
    }

    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT id, supplier, date, status, total FROM supplier_orders
             WHERE tenant_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY date DESC",
        )
        .map_err(|e| format!("prepare list orders: {e}"))?;

    let rows = stmt
        .query_map(params![tenant_id, status], |row| {
            Ok(serde_json::json!({
                "id": row.get::<_, String>(0)?,
                "supplier": row.get::<_, String>(1)?,
                "date": row.get::<_, String>(2)?,
                "status": row.get::<_, String>(3)?,
                "total": row.get::<_, f64>(4)?,
            }))
        })
        .map_err(|e| format!("query orders: {e}"))?;

    let orders: Vec<Value> = rows.filter_map(|r| r.ok()).collect();
    let running_total: f64 = orders
        .iter()
        .filter_map(|o| o["total"].as_f64())
        .sum();

    Ok(serde_json::json!({ "orders": orders, "total": running_total }))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use rusqlite::Connection;

    fn test_db() -> DbState {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .expect("pragma setup");
        db::run_migrations_for_test(&conn);
        DbState {
            conn: std::sync::Mutex::new(conn),
            db_path: std::path::PathBuf::from(":memory:"),
        }
    }

    #[test]
    fn test_add_defaults_to_pending_now() {
        let db = test_db();
        let added = add_order(
            &db,
            "t1",
            &serde_json::json!({ "supplier": "CleanCo", "total": 120.5 }),
        )
        .expect("add");
        assert_eq!(added["status"], "Pending");
        assert!(added["date"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_status_transitions_validated() {
        let db = test_db();
        let id = add_order(&db, "t1", &serde_json::json!({ "supplier": "CleanCo" })).unwrap()
            ["id"]
            .as_str()
            .unwrap()
            .to_string();

        set_status(&db, "t1", &id, "Shipped").expect("ship");
        set_status(&db, "t1", &id, "Received").expect("receive");
        assert!(set_status(&db, "t1", &id, "Teleported").is_err());
        assert!(set_status(&db, "t1", "ghost", "Shipped").is_err());
    }

    #[test]
    fn test_list_filter_and_running_total() {
        let db = test_db();
        let a = add_order(
            &db,
            "t1",
            &serde_json::json!({ "supplier": "A", "total": 100.0 }),
        )
        .unwrap();
        add_order(
            &db,
            "t1",
            &serde_json::json!({ "supplier": "B", "total": 40.0 }),
        )
        .unwrap();
        set_status(&db, "t1", a["id"].as_str().unwrap(), "Received").unwrap();

        let all = list_orders(&db, "t1", None).unwrap();
        assert_eq!(all["orders"].as_array().unwrap().len(), 2);
        assert_eq!(all["total"], 140.0);

        let received = list_orders(&db, "t1", Some("Received")).unwrap();
        assert_eq!(received["orders"].as_array().unwrap().len(), 1);
        assert_eq!(received["total"], 100.0);

        assert!(list_orders(&db, "t1", Some("Nonsense")).is_err());
    }

    #[test]
    fn test_update_and_delete() {
        let db = test_db();
        let id = add_order(
            &db,
            "t1",
            &serde_json::json!({ "supplier": "A", "total": 10.0 }),
        )
        .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();

        let updated =
            update_order(&db, "t1", &id, &serde_json::json!({ "total": 25.0 })).expect("update");
        assert_eq!(updated["supplier"], "A");
        assert_eq!(updated["total"], 25.0);
        assert!(update_order(&db, "t1", &id, &serde_json::json!({ "total": -1.0 })).is_err());

        delete_order(&db, "t1", &id).expect("delete");
        assert!(delete_order(&db, "t1", &id).is_err());
    }
}
