//! Pricing resolution: service + car size + payment method + wax flag
//! to a concrete (amount, commission) pair.
//!
//! The resolver is a pure function over a catalog snapshot. It never
//! fails: a selection that cannot yet be priced (unknown service, size
//! not chosen, size not offered) resolves to `None`, and the caller
//! keeps the submit path closed until it resolves to `Some`. The sale
//! form recomputes on every input change, so this runs constantly and
//! must stay cheap and side-effect free.
//!
//! Money stays full-precision `f64` here; two-decimal rounding is a
//! display concern (see the settings module).

use serde::{Deserialize, Serialize};

use crate::catalog::{ServiceCatalog, DEFAULT_PRICE_KEY};

/// How the customer settled the sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Coupon,
    Cash,
    Machine,
    NotPaid,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Coupon => "coupon",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Machine => "machine",
            PaymentMethod::NotPaid => "not-paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "coupon" => Some(PaymentMethod::Coupon),
            "cash" => Some(PaymentMethod::Cash),
            "machine" => Some(PaymentMethod::Machine),
            "not-paid" => Some(PaymentMethod::NotPaid),
            _ => None,
        }
    }

    /// Whether money was actually collected.
    pub fn is_paid(self) -> bool {
        self != PaymentMethod::NotPaid
    }
}

/// The operator's current selection on the sale form.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRequest {
    pub service_id: String,
    pub car_size: Option<String>,
    pub payment_method: PaymentMethod,
    pub wax_add_on: bool,
}

/// A fully resolved price/commission pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quote {
    pub amount: f64,
    pub commission: f64,
}

/// Resolve a sale request against a catalog snapshot.
///
/// Returns `None` while the selection is incomplete: unknown service,
/// size required but not supplied, or no price entry at the resolved
/// key. Invalid combinations that do have a price (coupon chosen for a
/// size without a coupon tier) fall back to the normal tier rather
/// than failing; the form is expected not to offer the coupon option
/// there in the first place.
pub fn resolve(catalog: &ServiceCatalog, request: &SaleRequest) -> Option<Quote> {
    let service = catalog.get(&request.service_id)?;

    let price_key = if service.needs_size {
        request.car_size.as_deref()?
    } else {
        DEFAULT_PRICE_KEY
    };
    let entry = service.prices.get(price_key)?;

    let (mut amount, mut commission) = match (request.payment_method, entry.coupon_commission) {
        // Coupon sales collect no cash; the coupon commission compensates
        // staff instead of the full rate.
        (PaymentMethod::Coupon, Some(coupon_commission)) if service.has_coupon => {
            (0.0, coupon_commission)
        }
        _ => (entry.price, entry.commission),
    };

    if request.wax_add_on && service.wax_eligible {
        if let Some(wax) = catalog.wax_entry() {
            amount += wax.price;
            commission += wax.commission;
        }
    }

    // An unpaid sale charges nothing, but the staff member still earned
    // the commission for work performed.
    if !request.payment_method.is_paid() {
        amount = 0.0;
    }

    Some(Quote { amount, commission })
}

// ===========================================================================
// Tests
// ===========================================================================
