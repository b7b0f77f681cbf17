//! Reporting: date-ranged aggregations over sales, orders, and stock.
//!
//! Date ranges are inclusive ISO-8601 bounds compared lexically, which
//! is sound because every stored date is RFC 3339 UTC.

use rusqlite::params;
use serde_json::Value;
use tracing::debug;

use crate::db::DbState;
use crate::inventory::{self, StockStatus};

/// Detailed list of sales in a range, with totals.
pub fn sales_by_date(
    db: &DbState,
    tenant_id: &str,
    from: &str,
    to: &str,
) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT id, service, staff_name, date, amount, commission, payment_method
             FROM sales
             WHERE tenant_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date DESC",
        )
        .map_err(|e| format!("prepare sales_by_date: {e}"))?;

    let rows = stmt
        .query_map(params![tenant_id, from, to], |row| {
            Ok(serde_json::json!({
                "id": row.get::<_, String>(0)?,
                "service": row.get::<_, String>(1)?,
                "staffName": row.get::<_, String>(2)?,
                "date": row.get::<_, String>(3)?,
                "amount": row.get::<_, f64>(4)?,
                "commission": row.get::<_, f64>(5)?,
                "paymentMethod": row.get::<_, String>(6)?,
            }))
        })
        .map_err(|e| format!("query sales_by_date: {e}"))?;

    let sales: Vec<Value> = rows.filter_map(|r| r.ok()).collect();
    let total_amount: f64 = sales.iter().filter_map(|s| s["amount"].as_f64()).sum();
    let total_commission: f64 = sales.iter().filter_map(|s| s["commission"].as_f64()).sum();

    debug!(tenant_id, from, to, count = sales.len(), "sales_by_date");
    Ok(serde_json::json!({
        "sales": sales,
        "count": sales.len(),
        "totalAmount": total_amount,
        "totalCommission": total_commission,
    }))
}

/// Revenue breakdown per service, with each service's share of the total.
pub fn sales_by_service(
    db: &DbState,
    tenant_id: &str,
    from: &str,
    to: &str,
) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT service, COUNT(*), SUM(amount)
             FROM sales
             WHERE tenant_id = ?1 AND date >= ?2 AND date <= ?3
             GROUP BY service
             ORDER BY SUM(amount) DESC",
        )
        .map_err(|e| format!("prepare sales_by_service: {e}"))?;

    let rows = stmt
        .query_map(params![tenant_id, from, to], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })
        .map_err(|e| format!("query sales_by_service: {e}"))?;

    let grouped: Vec<(String, i64, f64)> = rows.filter_map(|r| r.ok()).collect();
    let total_amount: f64 = grouped.iter().map(|(_, _, v)| v).sum();

    let breakdown: Vec<Value> = grouped
        .into_iter()
        .map(|(service, count, revenue)| {
            let share = if total_amount > 0.0 {
                revenue / total_amount
            } else {
                0.0
            };
            serde_json::json!({
                "service": service,
                "count": count,
                "revenue": revenue,
                "share": share,
            })
        })
        .collect();

    Ok(serde_json::json!({ "services": breakdown, "totalAmount": total_amount }))
}

/// Per-staff performance: sale count, revenue, and commission earned.
pub fn sales_by_staff(
    db: &DbState,
    tenant_id: &str,
    from: &str,
    to: &str,
) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT staff_name, COUNT(*), SUM(amount), SUM(commission)
             FROM sales
             WHERE tenant_id = ?1 AND date >= ?2 AND date <= ?3
             GROUP BY staff_name
             ORDER BY SUM(amount) DESC",
        )
        .map_err(|e| format!("prepare sales_by_staff: {e}"))?;

    let rows = stmt
        .query_map(params![tenant_id, from, to], |row| {
            Ok(serde_json::json!({
                "staffName": row.get::<_, String>(0)?,
                "count": row.get::<_, i64>(1)?,
                "revenue": row.get::<_, f64>(2)?,
                "commission": row.get::<_, f64>(3)?,
            }))
        })
        .map_err(|e| format!("query sales_by_staff: {e}"))?;

    Ok(Value::Array(rows.filter_map(|r| r.ok()).collect()))
}

/// Profit and loss: revenue minus commissions and received order costs.
pub fn profit_loss(db: &DbState, tenant_id: &str, from: &str, to: &str) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;

    let (total_revenue, total_commission): (f64, f64) = conn
        .query_row(
            "SELECT COALESCE(SUM(amount), 0), COALESCE(SUM(commission), 0)
             FROM sales WHERE tenant_id = ?1 AND date >= ?2 AND date <= ?3",
            params![tenant_id, from, to],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| format!("sum sales: {e}"))?;

    // Only Received orders have actually cost money
    let total_order_cost: f64 = conn
        .query_row(
            "SELECT COALESCE(SUM(total), 0) FROM supplier_orders
             WHERE tenant_id = ?1 AND status = 'Received' AND date >= ?2 AND date <= ?3",
            params![tenant_id, from, to],
            |row| row.get(0),
        )
        .map_err(|e| format!("sum orders: {e}"))?;

    let total_expenses = total_commission + total_order_cost;
    let net_profit = total_revenue - total_expenses;

    Ok(serde_json::json!({
        "totalRevenue": total_revenue,
        "totalCommission": total_commission,
        "totalOrderCost": total_order_cost,
        "totalExpenses": total_expenses,
        "netProfit": net_profit,
    }))
}

/// Received supplier orders in a range, with their cost total.
pub fn purchases_by_date(
    db: &DbState,
    tenant_id: &str,
    from: &str,
    to: &str,
) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT id, supplier, date, total FROM supplier_orders
             WHERE tenant_id = ?1 AND status = 'Received' AND date >= ?2 AND date <= ?3
             ORDER BY date DESC",
        )
        .map_err(|e| format!("prepare purchases_by_date: {e}"))?;

    let rows = stmt
        .query_map(params![tenant_id, from, to], |row| {
            Ok(serde_json::json!({
                "id": row.get::<_, String>(0)?,
                "supplier": row.get::<_, String>(1)?,
                "date": row.get::<_, String>(2)?,
                "total": row.get::<_, f64>(3)?,
            }))
        })
        .map_err(|e| format!("query purchases_by_date: {e}"))?;

    let purchases: Vec<Value> = rows.filter_map(|r| r.ok()).collect();
    let total: f64 = purchases.iter().filter_map(|p| p["total"].as_f64()).sum();

    Ok(serde_json::json!({ "purchases": purchases, "total": total }))
}

/// Current stock levels for all items. The one report without a date range.
pub fn inventory_report(db: &DbState, tenant_id: &str) -> Result<Value, String> {
    let items = inventory::list_items(db, tenant_id, None)?;
    let arr = items.as_array().cloned().unwrap_or_default();

    let total_quantity: i64 = arr.iter().filter_map(|i| i["quantity"].as_i64()).sum();
    let low_stock = arr
        .iter()
        .filter(|i| {
            i["status"] == StockStatus::LowStock.as_str()
                || i["status"] == StockStatus::OutOfStock.as_str()
        })
        .count();

    Ok(serde_json::json!({
        "items": arr,
        "totalQuantity": total_quantity,
        "attentionCount": low_stock,
    }))
}

/// Dashboard roll-up: headline numbers plus low-stock and recent-sale lists.
pub fn dashboard_summary(db: &DbState, tenant_id: &str) -> Result<Value, String> {
    let (total_revenue, sale_count): (f64, i64) = {
        let conn = db.conn.lock().map_err(|e| e.to_string())?;
        conn.query_row(
            "SELECT COALESCE(SUM(amount), 0), COUNT(*) FROM sales WHERE tenant_id = ?1",
            params![tenant_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| format!("sum revenue: {e}"))?
    };

    let inventory = inventory_report(db, tenant_id)?;
    let low_stock_items: Vec<Value> = inventory["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|i| i["status"] != StockStatus::InStock.as_str())
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let recent_sales: Vec<Value> = {
        let conn = db.conn.lock().map_err(|e| e.to_string())?;
        let mut stmt = conn
            .prepare(
                "SELECT id, service, staff_name, date, amount FROM sales
                 WHERE tenant_id = ?1 ORDER BY date DESC LIMIT 5",
            )
            .map_err(|e| format!("prepare recent sales: {e}"))?;
        let rows = stmt
            .query_map(params![tenant_id], |row| {
                Ok(serde_json::json!({
                    "id": row.get::<_, String>(0)?,
                    "service": row.get::<_, String>(1)?,
                    "staffName": row.get::<_, String>(2)?,
                    "date": row.get::<_, String>(3)?,
                    "amount": row.get::<_, f64>(4)?,
                }))
            })
            .map_err(|e| format!("query recent sales: {e}"))?;
        rows.filter_map(|r| r.ok()).collect()
    };

    Ok(serde_json::json!({
        "totalRevenue": total_revenue,
        "saleCount": sale_count,
        "totalStockQuantity": inventory["totalQuantity"],
        "lowStockCount": low_stock_items.len(),
        "lowStockItems": low_stock_items,
        "recentSales": recent_sales,
    }))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbState;
    use crate::{db, inventory, orders};
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

    fn insert_sale(
        db: &DbState,
        id: &str,
        service: &str,
        staff: &str,
        date: &str,
        amount: f64,
        commission: f64,
    ) {
        let conn = db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sales (id, tenant_id, service, staff_name, date, amount, commission, payment_method)
             VALUES (?1, 't1', ?2, ?3, ?4, ?5, ?6, 'cash')",
            params![id, service, staff, date, amount, commission],
        )
        .expect("insert sale");
    }

    const FROM: &str = "2024-05-01T00:00:00+00:00";
    const TO: &str = "2024-05-31T23:59:59+00:00";

    #[test]
    fn test_sales_by_date_range_is_inclusive() {
        let db = test_db();
        insert_sale(&db, "s1", "Full Wash", "Ali", "2024-05-01T00:00:00+00:00", 25.0, 10.0);
        insert_sale(&db, "s2", "Water Only", "Ali", "2024-05-15T12:00:00+00:00", 10.0, 4.0);
        insert_sale(&db, "s3", "Full Wash", "Omar", "2024-06-01T00:00:00+00:00", 30.0, 12.0);

        let report = sales_by_date(&db, "t1", FROM, TO).expect("report");
        assert_eq!(report["count"], 2);
        assert_eq!(report["totalAmount"], 35.0);
        assert_eq!(report["totalCommission"], 14.0);
        // Newest first
        assert_eq!(report["sales"][0]["id"], "s2");
    }

    #[test]
    fn test_sales_by_service_shares() {
        let db = test_db();
        insert_sale(&db, "s1", "Full Wash", "Ali", "2024-05-02T10:00:00+00:00", 75.0, 30.0);
        insert_sale(&db, "s2", "Water Only", "Ali", "2024-05-03T10:00:00+00:00", 25.0, 10.0);

        let report = sales_by_service(&db, "t1", FROM, TO).expect("report");
        let services = report["services"].as_array().unwrap();
        assert_eq!(services[0]["service"], "Full Wash");
        assert_eq!(services[0]["share"], 0.75);
        assert_eq!(services[1]["share"], 0.25);
        assert_eq!(report["totalAmount"], 100.0);
    }

    #[test]
    fn test_sales_by_staff_groups_commission() {
        let db = test_db();
        insert_sale(&db, "s1", "Full Wash", "Ali", "2024-05-02T10:00:00+00:00", 25.0, 10.0);
        insert_sale(&db, "s2", "Full Wash", "Ali", "2024-05-03T10:00:00+00:00", 25.0, 10.0);
        insert_sale(&db, "s3", "Water Only", "Omar", "2024-05-04T10:00:00+00:00", 10.0, 4.0);

        let report = sales_by_staff(&db, "t1", FROM, TO).expect("report");
        let arr = report.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["staffName"], "Ali");
        assert_eq!(arr[0]["count"], 2);
        assert_eq!(arr[0]["commission"], 20.0);
    }

    #[test]
    fn test_profit_loss_counts_only_received_orders() {
        let db = test_db();
        insert_sale(&db, "s1", "Full Wash", "Ali", "2024-05-02T10:00:00+00:00", 100.0, 40.0);

        let a = orders::add_order(
            &db,
            "t1",
            &serde_json::json!({ "supplier": "A", "total": 30.0, "date": "2024-05-05T00:00:00+00:00" }),
        )
        .unwrap();
        orders::set_status(&db, "t1", a["id"].as_str().unwrap(), "Received").unwrap();
        // Pending order, not a cost yet
        orders::add_order(
            &db,
            "t1",
            &serde_json::json!({ "supplier": "B", "total": 500.0, "date": "2024-05-06T00:00:00+00:00" }),
        )
        .unwrap();

        let report = profit_loss(&db, "t1", FROM, TO).expect("report");
        assert_eq!(report["totalRevenue"], 100.0);
        assert_eq!(report["totalCommission"], 40.0);
        assert_eq!(report["totalOrderCost"], 30.0);
        assert_eq!(report["totalExpenses"], 70.0);
        assert_eq!(report["netProfit"], 30.0);
    }

    #[test]
    fn test_purchases_by_date() {
        let db = test_db();
        let a = orders::add_order(
            &db,
            "t1",
            &serde_json::json!({ "supplier": "A", "total": 30.0, "date": "2024-05-05T00:00:00+00:00" }),
        )
        .unwrap();
        orders::set_status(&db, "t1", a["id"].as_str().unwrap(), "Received").unwrap();

        let report = purchases_by_date(&db, "t1", FROM, TO).expect("report");
        assert_eq!(report["purchases"].as_array().unwrap().len(), 1);
        assert_eq!(report["total"], 30.0);
    }

    #[test]
    fn test_dashboard_summary() {
        let db = test_db();
        insert_sale(&db, "s1", "Full Wash", "Ali", "2024-05-02T10:00:00+00:00", 25.0, 10.0);
        inventory::add_item(
            &db,
            "t1",
            &serde_json::json!({ "name": "Shampoo", "quantity": 3 }),
        )
        .unwrap();
        inventory::add_item(
            &db,
            "t1",
            &serde_json::json!({ "name": "Towels", "quantity": 50 }),
        )
        .unwrap();

        let summary = dashboard_summary(&db, "t1").expect("summary");
        assert_eq!(summary["totalRevenue"], 25.0);
        assert_eq!(summary["saleCount"], 1);
        assert_eq!(summary["totalStockQuantity"], 53);
        assert_eq!(summary["lowStockCount"], 1);
        assert_eq!(summary["lowStockItems"][0]["name"], "Shampoo");
        assert_eq!(summary["recentSales"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_ranges_produce_zeroes_not_errors() {
        let db = test_db();
        let report = profit_loss(&db, "t1", FROM, TO).expect("report");
        assert_eq!(report["netProfit"], 0.0);

        let by_service = sales_by_service(&db, "t1", FROM, TO).expect("report");
        assert!(by_service["services"].as_array().unwrap().is_empty());
        assert_eq!(by_service["totalAmount"], 0.0);
    }
}
