//! Inventory tracking: consumables and supplies with stock status.

use rusqlite::params;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::db::DbState;
use crate::{value_f64, value_i64, value_str};

/// Quantities below this count as low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Stock status derived from quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn for_quantity(quantity: i64) -> Self {
        if quantity <= 0 {
            StockStatus::OutOfStock
        } else if quantity < LOW_STOCK_THRESHOLD {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::InStock => "in-stock",
            StockStatus::LowStock => "low-stock",
            StockStatus::OutOfStock => "out-of-stock",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in-stock" => Some(StockStatus::InStock),
            "low-stock" => Some(StockStatus::LowStock),
            "out-of-stock" => Some(StockStatus::OutOfStock),
            _ => None,
        }
    }
}

/// Add an inventory item from `{ name, category?, quantity?, purchasePrice? }`.
pub fn add_item(db: &DbState, tenant_id: &str, payload: &Value) -> Result<Value, String> {
    let name = value_str(payload, &["name"]).ok_or("Missing name")?;
    let category = value_str(payload, &["category"]).unwrap_or_default();
    let quantity = value_i64(payload, &["quantity"]).unwrap_or(0);
    let purchase_price =
        value_f64(payload, &["purchasePrice", "purchase_price"]).unwrap_or(0.0);
    if quantity < 0 {
        return Err("Quantity must not be negative".into());
    }
    if purchase_price < 0.0 {
        return Err("Purchase price must not be negative".into());
    }

    let item_id = Uuid::new_v4().to_string();
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO inventory_items (id, tenant_id, name, category, quantity, purchase_price)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![item_id, tenant_id, name, category, quantity, purchase_price],
    )
    .map_err(|e| format!("insert item: {e}"))?;

    info!(tenant_id, item_id = %item_id, name = %name, "Inventory item added");
    Ok(item_json(
        &item_id,
        &name,
        &category,
        quantity,
        purchase_price,
    ))
}

/// Update an item's fields; absent payload fields keep their value.
pub fn update_item(
    db: &DbState,
    tenant_id: &str,
    item_id: &str,
    payload: &Value,
) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let (name, category, quantity, purchase_price) = conn
        .query_row(
            "SELECT name, category, quantity, purchase_price
             FROM inventory_items WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, item_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            },
        )
        .map_err(|_| format!("Item not found: {item_id}"))?;

    let name = value_str(payload, &["name"]).unwrap_or(name);
    let category = value_str(payload, &["category"]).unwrap_or(category);
    let quantity = value_i64(payload, &["quantity"]).unwrap_or(quantity);
    let purchase_price =
        value_f64(payload, &["purchasePrice", "purchase_price"]).unwrap_or(purchase_price);
    if quantity < 0 {
        return Err("Quantity must not be negative".into());
    }
    if purchase_price < 0.0 {
        return Err("Purchase price must not be negative".into());
    }

    conn.execute(
        "UPDATE inventory_items SET
            name = ?1, category = ?2, quantity = ?3, purchase_price = ?4,
            updated_at = datetime('now')
         WHERE tenant_id = ?5 AND id = ?6",
        params![name, category, quantity, purchase_price, tenant_id, item_id],
    )
    .map_err(|e| format!("update item: {e}"))?;

    Ok(item_json(item_id, &name, &category, quantity, purchase_price))
}

/// Delete an item.
pub fn delete_item(db: &DbState, tenant_id: &str, item_id: &str) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let n = conn
        .execute(
            "DELETE FROM inventory_items WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, item_id],
        )
        .map_err(|e| format!("delete item: {e}"))?;
    if n == 0 {
        return Err(format!("Item not found: {item_id}"));
    }
    info!(tenant_id, item_id, "Inventory item deleted");
    Ok(serde_json::json!({ "success": true }))
}

/// List items, optionally filtered by derived stock status.
pub fn list_items(
    db: &DbState,
    tenant_id: &str,
    status: Option<StockStatus>,
) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT id, name, category, quantity, purchase_price
             FROM inventory_items WHERE tenant_id = ?1 ORDER BY name COLLATE NOCASE",
        )
        .map_err(|e| format!("prepare list items: {e}"))?;

    let rows = stmt
        .query_map(params![tenant_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })
        .map_err(|e| format!("query items: {e}"))?;

    let items: Vec<Value> = rows
        .filter_map(|r| r.ok())
        .filter(|(_, _, _, quantity, _)| {
            status.map_or(true, |s| StockStatus::for_quantity(*quantity) == s)
        })
        .map(|(id, name, category, quantity, purchase_price)| {
            item_json(&id, &name, &category, quantity, purchase_price)
        })
        .collect();

    Ok(Value::Array(items))
}

fn item_json(id: &str, name: &str, category: &str, quantity: i64, purchase_price: f64) -> Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "category": category,
        "quantity": quantity,
        "purchasePrice": purchase_price,
        "status": StockStatus::for_quantity(quantity).as_str(),
    })
}

// ===========================================================================
// Tests
// ===========================================================================
