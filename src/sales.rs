//! Sale recording for the car-wash manager.
//!
//! A sale is resolved through the pricing module against the catalog
//! snapshot loaded at submission time, then persisted verbatim. An
//! admin price edit racing an in-flight submission is accepted: the
//! sale gets whichever snapshot the load returned.

use chrono::Utc;
use rusqlite::params;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog;
use crate::db::DbState;
use crate::pricing::{self, PaymentMethod, SaleRequest};
use crate::{value_bool, value_str};

/// Record a sale.
///
/// Expects `serviceId`, `staffId`, `paymentMethod`, optional `carSize`
/// and `waxAddOn`. The amount and commission are never taken from the
/// payload; they come from the resolver so a stale or tampered form
/// cannot write its own numbers.
pub fn record_sale(db: &DbState, tenant_id: &str, payload: &Value) -> Result<Value, String> {
    let service_id = value_str(payload, &["serviceId", "service_id"]).ok_or("Missing serviceId")?;
    let staff_id = value_str(payload, &["staffId", "staff_id"]).ok_or("Missing staffId")?;
    let payment_raw =
        value_str(payload, &["paymentMethod", "payment_method"]).ok_or("Missing paymentMethod")?;
    let payment_method = PaymentMethod::parse(&payment_raw)
        .ok_or_else(|| format!("Invalid paymentMethod: {payment_raw}"))?;
    let car_size = value_str(payload, &["carSize", "car_size"]);
    let wax_add_on = value_bool(payload, &["waxAddOn", "wax_add_on"]).unwrap_or(false);

    let staff_name: String = {
        let conn = db.conn.lock().map_err(|e| e.to_string())?;
        conn.query_row(
            "SELECT name FROM staff WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, staff_id],
            |row| row.get(0),
        )
        .map_err(|_| format!("Staff member not found: {staff_id}"))?
    };

    let snapshot = catalog::load(db, tenant_id)?;
    let service = snapshot
        .get(&service_id)
        .ok_or_else(|| format!("Unknown service: {service_id}"))?;
    let service_name = service.name.clone();

    let request = SaleRequest {
        service_id: service_id.clone(),
        car_size: car_size.clone(),
        payment_method,
        wax_add_on,
    };
    let quote = match pricing::resolve(&snapshot, &request) {
        Some(q) => q,
        None => {
            // The form should have kept submit disabled; reject rather
            // than persist a half-priced record.
            warn!(tenant_id, service_id = %service_id, "Sale submitted with incomplete selection");
            return Err("Incomplete selection: service, size, or price entry unresolved".into());
        }
    };

    let sale_id = Uuid::new_v4().to_string();
    let date = Utc::now().to_rfc3339();
    let has_coupon = payment_method == PaymentMethod::Coupon;
    let is_paid = payment_method.is_paid();

    {
        let conn = db.conn.lock().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO sales (
                id, tenant_id, service, staff_name, car_size, date,
                amount, commission, has_coupon, payment_method, wax_add_on, is_paid
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                sale_id,
                tenant_id,
                service_name,
                staff_name,
                car_size,
                date,
                quote.amount,
                quote.commission,
                has_coupon,
                payment_method.as_str(),
                wax_add_on,
                is_paid,
            ],
        )
        .map_err(|e| format!("insert sale: {e}"))?;
    }

    info!(
        tenant_id,
        sale_id = %sale_id,
        service = %service_name,
        amount = quote.amount,
        commission = quote.commission,
        "Sale recorded"
    );

    Ok(serde_json::json!({
        "success": true,
        "id": sale_id,
        "service": service_name,
        "staffName": staff_name,
        "carSize": car_size,
        "date": date,
        "amount": quote.amount,
        "commission": quote.commission,
        "hasCoupon": has_coupon,
        "paymentMethod": payment_method.as_str(),
        "waxAddOn": wax_add_on,
        "isPaid": is_paid,
    }))
}

/// List a tenant's sales, newest first.
pub fn list_sales(db: &DbState, tenant_id: &str) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT id, service, staff_name, car_size, date, amount, commission,
                    has_coupon, payment_method, wax_add_on, is_paid
             FROM sales WHERE tenant_id = ?1 ORDER BY date DESC",
        )
        .map_err(|e| format!("prepare list sales: {e}"))?;

    let rows = stmt
        .query_map(params![tenant_id], |row| {
            Ok(serde_json::json!({
                "id": row.get::<_, String>(0)?,
                "service": row.get::<_, String>(1)?,
                "staffName": row.get::<_, String>(2)?,
                "carSize": row.get::<_, Option<String>>(3)?,
                "date": row.get::<_, String>(4)?,
                "amount": row.get::<_, f64>(5)?,
                "commission": row.get::<_, f64>(6)?,
                "hasCoupon": row.get::<_, bool>(7)?,
                "paymentMethod": row.get::<_, String>(8)?,
                "waxAddOn": row.get::<_, bool>(9)?,
                "isPaid": row.get::<_, bool>(10)?,
            }))
        })
        .map_err(|e| format!("query sales: {e}"))?;

    Ok(Value::Array(rows.filter_map(|r| r.ok()).collect()))
}

/// Delete one sale record.
pub fn delete_sale(db: &DbState, tenant_id: &str, sale_id: &str) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let n = conn
        .execute(
            "DELETE FROM sales WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, sale_id],
        )
        .map_err(|e| format!("delete sale: {e}"))?;
    if n == 0 {
        return Err(format!("Sale not found: {sale_id}"));
    }
    info!(tenant_id, sale_id, "Sale deleted");
    Ok(serde_json::json!({ "success": true }))
}

// ===========================================================================
// Tests
// ===========================================================================
