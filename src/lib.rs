//! Car-wash business manager backend.
//!
//! Multi-tenant bookkeeping for a car-wash operation: the service
//! catalog with its price/commission tables, sale recording through
//! the pricing resolver, inventory and supplier-order tracking, the
//! staff roster, reports, and per-device display settings. State lives
//! in a local SQLite database; every business operation takes the
//! shared [`db::DbState`] plus a tenant id.

pub mod catalog;
pub mod db;
pub mod inventory;
pub mod logging;
pub mod orders;
pub mod pricing;
pub mod reports;
pub mod sales;
pub mod settings;
pub mod staff;

/// First non-empty string under any of `keys`, trimmed.
pub(crate) fn value_str(v: &serde_json::Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = v.get(*key).and_then(|x| x.as_str()) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

pub(crate) fn value_f64(v: &serde_json::Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        if let Some(n) = v.get(*key).and_then(|x| x.as_f64()) {
            return Some(n);
        }
    }
    None
}

pub(crate) fn value_i64(v: &serde_json::Value, keys: &[&str]) -> Option<i64> {
    for key in keys {
        if let Some(n) = v.get(*key).and_then(|x| x.as_i64()) {
            return Some(n);
        }
    }
    None
}

pub(crate) fn value_bool(v: &serde_json::Value, keys: &[&str]) -> Option<bool> {
    for key in keys {
        if let Some(b) = v.get(*key).and_then(|x| x.as_bool()) {
            return Some(b);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_helpers_alias_fallback() {
        let payload = serde_json::json!({
            "service_id": "full-wash",
            "waxAddOn": true,
            "quantity": 7,
            "total": 12.5,
            "blank": "   ",
        });

        assert_eq!(
            value_str(&payload, &["serviceId", "service_id"]).as_deref(),
            Some("full-wash")
        );
        assert_eq!(value_str(&payload, &["blank"]), None);
        assert_eq!(value_bool(&payload, &["waxAddOn", "wax_add_on"]), Some(true));
        assert_eq!(value_i64(&payload, &["quantity"]), Some(7));
        assert_eq!(value_f64(&payload, &["total"]), Some(12.5));
        assert_eq!(value_f64(&payload, &["missing"]), None);
    }
}
