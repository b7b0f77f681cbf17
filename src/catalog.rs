//! Service catalog: the set of wash services and their price tables.
//!
//! Catalog documents are stored as JSON rows in the `services` table,
//! one per service, keeping the flat document shape of the hosted
//! dashboard. The shape is loosely typed at rest and validated here,
//! at the load boundary, into strongly-typed definitions — lookup
//! sites never re-check the shape.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::DbState;

/// Price key used by services that do not vary by car size.
pub const DEFAULT_PRICE_KEY: &str = "default";

/// Well-known id of the wax add-on service, composed onto eligible washes.
pub const WAX_ADD_ON_ID: &str = "wax-add-on";

// ---------------------------------------------------------------------------
// Typed model
// ---------------------------------------------------------------------------

/// One row of a service's price table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEntry {
    pub price: f64,
    pub commission: f64,
    /// Commission paid when the sale is coupon-paid. Absent means the
    /// coupon tier is not offered for this size, even if the service
    /// as a whole has coupons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_commission: Option<f64>,
}

/// A validated service definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub needs_size: bool,
    pub has_coupon: bool,
    /// Whether the wax add-on may be composed onto this service.
    pub wax_eligible: bool,
    /// Display position in menus and forms.
    pub order: i64,
    /// Size key (or `"default"`) to price entry.
    pub prices: BTreeMap<String, PriceEntry>,
}

/// Catalog keyed by service id.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    services: BTreeMap<String, ServiceDefinition>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("service {id}: malformed document: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("service {id}: empty price table")]
    EmptyPriceTable { id: String },
    #[error("service {id}: needsSize is false but no \"default\" price entry exists")]
    MissingDefaultEntry { id: String },
    #[error("service {id}: {field} for size {size:?} is negative")]
    NegativeMoney {
        id: String,
        size: String,
        field: &'static str,
    },
}

/// Raw document shape as stored. Converted to [`ServiceDefinition`]
/// only through [`ServiceDoc::into_definition`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDoc {
    name: String,
    #[serde(default)]
    needs_size: bool,
    #[serde(default)]
    has_coupon: bool,
    /// Legacy documents predate this flag; see `into_definition`.
    #[serde(default)]
    wax_eligible: Option<bool>,
    #[serde(default)]
    order: i64,
    prices: BTreeMap<String, PriceEntry>,
}

impl ServiceDoc {
    /// Validate and promote a stored document to a typed definition.
    ///
    /// Documents written before the explicit `waxEligible` flag existed
    /// fall back to the historical rule: the display name contains
    /// "wash" (case-insensitive). Newly written documents always carry
    /// the flag, so the substring rule only ever decides for legacy data.
    fn into_definition(self, id: &str) -> Result<ServiceDefinition, CatalogError> {
        if self.prices.is_empty() {
            return Err(CatalogError::EmptyPriceTable { id: id.to_string() });
        }
        if !self.needs_size && !self.prices.contains_key(DEFAULT_PRICE_KEY) {
            return Err(CatalogError::MissingDefaultEntry { id: id.to_string() });
        }
        for (size, entry) in &self.prices {
            let checks: [(&'static str, f64); 3] = [
                ("price", entry.price),
                ("commission", entry.commission),
                ("couponCommission", entry.coupon_commission.unwrap_or(0.0)),
            ];
            for (field, value) in checks {
                if value < 0.0 {
                    return Err(CatalogError::NegativeMoney {
                        id: id.to_string(),
                        size: size.clone(),
                        field,
                    });
                }
            }
        }

        let wax_eligible = self
            .wax_eligible
            .unwrap_or_else(|| default_wax_eligibility(&self.name));

        Ok(ServiceDefinition {
            id: id.to_string(),
            name: self.name,
            needs_size: self.needs_size,
            has_coupon: self.has_coupon,
            wax_eligible,
            order: self.order,
            prices: self.prices,
        })
    }
}

/// Historical wax-add-on eligibility rule for documents without an
/// explicit flag: the display name mentions "wash".
fn default_wax_eligibility(name: &str) -> bool {
    name.to_lowercase().contains("wash")
}

impl ServiceCatalog {
    /// Build a catalog from raw `(id, json)` documents, validating each.
    pub fn from_documents(
        docs: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Self, CatalogError> {
        let mut services = BTreeMap::new();
        for (id, data) in docs {
            let doc: ServiceDoc =
                serde_json::from_value(data).map_err(|source| CatalogError::Malformed {
                    id: id.clone(),
                    source,
                })?;
            let def = doc.into_definition(&id)?;
            services.insert(id, def);
        }
        Ok(Self { services })
    }

    pub fn get(&self, service_id: &str) -> Option<&ServiceDefinition> {
        self.services.get(service_id)
    }

    /// The wax add-on's default price entry, if the catalog has one.
    pub fn wax_entry(&self) -> Option<&PriceEntry> {
        self.services
            .get(WAX_ADD_ON_ID)
            .and_then(|s| s.prices.get(DEFAULT_PRICE_KEY))
    }

    /// Services in display order.
    pub fn ordered(&self) -> Vec<&ServiceDefinition> {
        let mut list: Vec<_> = self.services.values().collect();
        list.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Persistence operations
// ---------------------------------------------------------------------------

/// Load and validate a tenant's full catalog.
pub fn load(db: &DbState, tenant_id: &str) -> Result<ServiceCatalog, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare("SELECT id, data FROM services WHERE tenant_id = ?1")
        .map_err(|e| format!("prepare catalog load: {e}"))?;

    let rows = stmt
        .query_map(params![tenant_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| format!("query catalog: {e}"))?;

    let mut docs = Vec::new();
    for row in rows.flatten() {
        let (id, raw) = row;
        let data: Value =
            serde_json::from_str(&raw).map_err(|e| format!("service {id}: corrupt row: {e}"))?;
        docs.push((id, data));
    }

    ServiceCatalog::from_documents(docs).map_err(|e| e.to_string())
}

/// List a tenant's services in display order as JSON documents.
pub fn list_services(db: &DbState, tenant_id: &str) -> Result<Value, String> {
    let catalog = load(db, tenant_id)?;
    let list: Vec<Value> = catalog
        .ordered()
        .into_iter()
        .map(|s| {
            let mut doc = serde_json::to_value(s).unwrap_or_else(|_| serde_json::json!({}));
            if let Some(obj) = doc.as_object_mut() {
                obj.insert("id".into(), Value::String(s.id.clone()));
            }
            doc
        })
        .collect();
    Ok(Value::Array(list))
}

/// Insert or replace a full service document after validating it.
pub fn upsert_service(
    db: &DbState,
    tenant_id: &str,
    service_id: &str,
    data: &Value,
) -> Result<Value, String> {
    // Validate before writing so a bad document can never enter the store.
    let doc: ServiceDoc = serde_json::from_value(data.clone())
        .map_err(|e| format!("service {service_id}: malformed document: {e}"))?;
    let def = doc
        .into_definition(service_id)
        .map_err(|e| e.to_string())?;

    // Persist with the flag resolved, so the document no longer depends
    // on the legacy name rule. The id lives in its own column.
    let stored = serde_json::to_value(&def).map_err(|e| e.to_string())?;

    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO services (tenant_id, id, data, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(tenant_id, id) DO UPDATE SET
            data = excluded.data,
            updated_at = excluded.updated_at",
        params![tenant_id, service_id, stored.to_string()],
    )
    .map_err(|e| format!("upsert service: {e}"))?;

    info!(tenant_id, service_id, "Service upserted");
    Ok(serde_json::json!({ "success": true, "id": service_id }))
}

/// Update one price entry of one service.
///
/// `coupon_commission = None` clears the coupon tier for that size.
pub fn update_price_entry(
    db: &DbState,
    tenant_id: &str,
    service_id: &str,
    size_key: &str,
    entry: PriceEntry,
) -> Result<Value, String> {
    let mut doc = fetch_document(db, tenant_id, service_id)?;
    let prices = doc
        .get_mut("prices")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| format!("service {service_id}: document has no price table"))?;

    prices.insert(
        size_key.to_string(),
        serde_json::to_value(entry).map_err(|e| e.to_string())?,
    );

    upsert_service(db, tenant_id, service_id, &doc)
}

/// Toggle the coupon tier for a whole service.
pub fn set_coupon_enabled(
    db: &DbState,
    tenant_id: &str,
    service_id: &str,
    enabled: bool,
) -> Result<Value, String> {
    let mut doc = fetch_document(db, tenant_id, service_id)?;
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("hasCoupon".into(), Value::Bool(enabled));
    }
    upsert_service(db, tenant_id, service_id, &doc)
}

/// Delete a service document.
pub fn delete_service(db: &DbState, tenant_id: &str, service_id: &str) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let n = conn
        .execute(
            "DELETE FROM services WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, service_id],
        )
        .map_err(|e| format!("delete service: {e}"))?;
    if n == 0 {
        return Err(format!("Service not found: {service_id}"));
    }
    info!(tenant_id, service_id, "Service deleted");
    Ok(serde_json::json!({ "success": true }))
}

fn fetch_document(db: &DbState, tenant_id: &str, service_id: &str) -> Result<Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let raw: String = conn
        .query_row(
            "SELECT data FROM services WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, service_id],
            |row| row.get(0),
        )
        .map_err(|_| format!("Service not found: {service_id}"))?;
    serde_json::from_str(&raw).map_err(|e| format!("service {service_id}: corrupt row: {e}"))
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// Insert any stock services a tenant is missing. Existing documents,
/// including edited prices, are left untouched.
pub fn seed_defaults(db: &DbState, tenant_id: &str) -> Result<Value, String> {
    let existing: Vec<String> = {
        let conn = db.conn.lock().map_err(|e| e.to_string())?;
        let mut stmt = conn
            .prepare("SELECT id FROM services WHERE tenant_id = ?1")
            .map_err(|e| format!("prepare seed check: {e}"))?;
        let ids = stmt
            .query_map(params![tenant_id], |row| row.get(0))
            .map_err(|e| format!("query seed check: {e}"))?
            .filter_map(|r| r.ok())
            .collect();
        ids
    };

    let mut seeded = Vec::new();
    for (id, doc) in default_services() {
        if existing.iter().any(|e| e == id) {
            continue;
        }
        upsert_service(db, tenant_id, id, &doc)?;
        seeded.push(id);
    }

    if seeded.is_empty() {
        info!(tenant_id, "All stock services already present");
    } else {
        warn!(tenant_id, count = seeded.len(), "Seeded missing stock services");
    }

    Ok(serde_json::json!({ "success": true, "seeded": seeded }))
}

/// The stock catalog shipped with a new tenant.
fn default_services() -> Vec<(&'static str, Value)> {
    vec![
        (
            "full-wash",
            serde_json::json!({
                "name": "Full Wash",
                "needsSize": true,
                "hasCoupon": true,
                "order": 1,
                "prices": {
                    "small": { "price": 20, "commission": 8, "couponCommission": 4 },
                    "medium": { "price": 25, "commission": 10, "couponCommission": 5 },
                    "large": { "price": 30, "commission": 12, "couponCommission": 6 },
                    "big": { "price": 35, "commission": 14 },
                    "long-gmc": { "price": 40, "commission": 16 },
                    "microbus": { "price": 45, "commission": 18 },
                    "long-coaster": { "price": 50, "commission": 20 }
                }
            }),
        ),
        (
            "outside-only",
            serde_json::json!({
                "name": "Outside Only",
                "needsSize": true,
                "hasCoupon": false,
                "order": 2,
                "prices": {
                    "small": { "price": 15, "commission": 6 },
                    "medium": { "price": 20, "commission": 8 },
                    "large": { "price": 25, "commission": 10 },
                    "big": { "price": 30, "commission": 12 },
                    "long-gmc": { "price": 35, "commission": 14 },
                    "microbus": { "price": 40, "commission": 16 },
                    "long-coaster": { "price": 45, "commission": 18 }
                }
            }),
        ),
        (
            "interior-only",
            serde_json::json!({
                "name": "Interior Only",
                "needsSize": false,
                "hasCoupon": false,
                "order": 3,
                "prices": { "default": { "price": 15, "commission": 7 } }
            }),
        ),
        (
            "water-only",
            serde_json::json!({
                "name": "Water Only",
                "needsSize": false,
                "hasCoupon": false,
                "order": 4,
                "prices": { "default": { "price": 10, "commission": 4 } }
            }),
        ),
        (
            "engine-wash-only",
            serde_json::json!({
                "name": "Engine Wash Only",
                "needsSize": false,
                "hasCoupon": false,
                "order": 5,
                "prices": { "default": { "price": 25, "commission": 10 } }
            }),
        ),
        (
            "mirrors-only",
            serde_json::json!({
                "name": "Mirrors Only",
                "needsSize": false,
                "hasCoupon": false,
                "order": 6,
                "prices": { "default": { "price": 5, "commission": 2 } }
            }),
        ),
        (
            "carpets-covering",
            serde_json::json!({
                "name": "Carpets Covering",
                "needsSize": false,
                "hasCoupon": false,
                "order": 7,
                "prices": { "default": { "price": 5, "commission": 2 } }
            }),
        ),
        (
            "carpet-cleaning",
            serde_json::json!({
                "name": "Carpet Cleaning",
                "needsSize": false,
                "hasCoupon": false,
                "order": 8,
                "prices": { "default": { "price": 20, "commission": 8 } }
            }),
        ),
        (
            "air-conditioner-wash",
            serde_json::json!({
                "name": "Air Conditioner Wash",
                "needsSize": false,
                "hasCoupon": false,
                "order": 9,
                "prices": { "default": { "price": 30, "commission": 12 } }
            }),
        ),
        (
            WAX_ADD_ON_ID,
            serde_json::json!({
                "name": "Wax Add-on",
                "needsSize": false,
                "hasCoupon": false,
                "waxEligible": false,
                "order": 10,
                "prices": { "default": { "price": 5, "commission": 2 } }
            }),
        ),
    ]
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
    fn test_seed_then_load_validates() {
        let db = test_db();
        let result = seed_defaults(&db, "t1").expect("seed");
        assert_eq!(result["success"], true);
        assert_eq!(result["seeded"].as_array().unwrap().len(), 10);

        let catalog = load(&db, "t1").expect("load");
        assert_eq!(catalog.len(), 10);

        let full_wash = catalog.get("full-wash").expect("full-wash");
        assert!(full_wash.needs_size);
        assert!(full_wash.has_coupon);
        let medium = full_wash.prices.get("medium").expect("medium entry");
        assert_eq!(medium.price, 25.0);
        assert_eq!(medium.commission, 10.0);
        assert_eq!(medium.coupon_commission, Some(5.0));
        // "big" has no coupon tier even though the service does
        assert_eq!(full_wash.prices.get("big").unwrap().coupon_commission, None);
    }

    #[test]
    fn test_seed_is_insert_only() {
        let db = test_db();
        seed_defaults(&db, "t1").expect("seed");

        // Operator edits the water-only price
        update_price_entry(
            &db,
            "t1",
            "water-only",
            DEFAULT_PRICE_KEY,
            PriceEntry {
                price: 12.0,
                commission: 5.0,
                coupon_commission: None,
            },
        )
        .expect("update");

        // Re-seeding must not revert the edit
        let result = seed_defaults(&db, "t1").expect("re-seed");
        assert!(result["seeded"].as_array().unwrap().is_empty());

        let catalog = load(&db, "t1").expect("load");
        let entry = catalog
            .get("water-only")
            .unwrap()
            .prices
            .get(DEFAULT_PRICE_KEY)
            .unwrap();
        assert_eq!(entry.price, 12.0);
    }

    #[test]
    fn test_wax_eligibility_derived_for_legacy_documents() {
        let docs = vec![
            (
                "full-wash".to_string(),
                serde_json::json!({
                    "name": "Full Wash",
                    "needsSize": false,
                    "prices": { "default": { "price": 20, "commission": 8 } }
                }),
            ),
            (
                "mirrors-only".to_string(),
                serde_json::json!({
                    "name": "Mirrors Only",
                    "needsSize": false,
                    "prices": { "default": { "price": 5, "commission": 2 } }
                }),
            ),
            (
                "deluxe".to_string(),
                serde_json::json!({
                    "name": "Deluxe Detailing",
                    "needsSize": false,
                    // Explicit flag wins over the name rule
                    "waxEligible": true,
                    "prices": { "default": { "price": 60, "commission": 20 } }
                }),
            ),
        ];
        let catalog = ServiceCatalog::from_documents(docs).expect("valid");
        assert!(catalog.get("full-wash").unwrap().wax_eligible);
        assert!(!catalog.get("mirrors-only").unwrap().wax_eligible);
        assert!(catalog.get("deluxe").unwrap().wax_eligible);
    }

    #[test]
    fn test_validation_rejects_bad_documents() {
        let empty = ServiceCatalog::from_documents(vec![(
            "x".to_string(),
            serde_json::json!({ "name": "X", "prices": {} }),
        )]);
        assert!(matches!(empty, Err(CatalogError::EmptyPriceTable { .. })));

        let no_default = ServiceCatalog::from_documents(vec![(
            "x".to_string(),
            serde_json::json!({
                "name": "X",
                "needsSize": false,
                "prices": { "small": { "price": 5, "commission": 1 } }
            }),
        )]);
        assert!(matches!(
            no_default,
            Err(CatalogError::MissingDefaultEntry { .. })
        ));

        let negative = ServiceCatalog::from_documents(vec![(
            "x".to_string(),
            serde_json::json!({
                "name": "X",
                "needsSize": false,
                "prices": { "default": { "price": -5, "commission": 1 } }
            }),
        )]);
        assert!(matches!(negative, Err(CatalogError::NegativeMoney { .. })));
    }

    #[test]
    fn test_set_coupon_enabled_and_delete() {
        let db = test_db();
        seed_defaults(&db, "t1").expect("seed");

        set_coupon_enabled(&db, "t1", "water-only", true).expect("toggle");
        let catalog = load(&db, "t1").expect("load");
        assert!(catalog.get("water-only").unwrap().has_coupon);

        delete_service(&db, "t1", "water-only").expect("delete");
        let catalog = load(&db, "t1").expect("reload");
        assert!(catalog.get("water-only").is_none());
        assert!(delete_service(&db, "t1", "water-only").is_err());
    }

    #[test]
    fn test_list_services_display_order() {
        let db = test_db();
        seed_defaults(&db, "t1").expect("seed");
        let list = list_services(&db, "t1").expect("list");
        let arr = list.as_array().unwrap();
        assert_eq!(arr[0]["id"], "full-wash");
        assert_eq!(arr[1]["id"], "outside-only");
        assert_eq!(arr[9]["id"], WAX_ADD_ON_ID);
        // Stored documents carry the resolved eligibility flag
        assert_eq!(arr[0]["waxEligible"], true);
        assert_eq!(arr[1]["waxEligible"], false);
    }
}
