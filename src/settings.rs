//! Display preferences: currency symbol, theme, locale.
//!
//! The hosted dashboard kept these in ambient browser state; here they
//! are an explicit value object loaded from `local_settings` and passed
//! to whatever formats output. Two-decimal rounding of money happens
//! here and only here; stored amounts keep full precision.

use serde::{Deserialize, Serialize};

use crate::db::{self, DbState};

const CATEGORY: &str = "display";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

/// Per-device display preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    pub currency_symbol: String,
    pub theme: Theme,
    pub locale: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            currency_symbol: "SAR".to_string(),
            theme: Theme::Light,
            locale: "en".to_string(),
        }
    }
}

impl DisplaySettings {
    /// Load settings, falling back to defaults for anything unset or
    /// unparseable.
    pub fn load(db: &DbState) -> Result<Self, String> {
        let conn = db.conn.lock().map_err(|e| e.to_string())?;
        let defaults = Self::default();

        let currency_symbol =
            db::get_setting(&conn, CATEGORY, "currency_symbol").unwrap_or(defaults.currency_symbol);
        let theme = db::get_setting(&conn, CATEGORY, "theme")
            .and_then(|s| Theme::parse(&s))
            .unwrap_or(defaults.theme);
        let locale = db::get_setting(&conn, CATEGORY, "locale").unwrap_or(defaults.locale);

        Ok(Self {
            currency_symbol,
            theme,
            locale,
        })
    }

    /// Persist all fields.
    pub fn save(&self, db: &DbState) -> Result<(), String> {
        let conn = db.conn.lock().map_err(|e| e.to_string())?;
        db::set_setting(&conn, CATEGORY, "currency_symbol", &self.currency_symbol)?;
        db::set_setting(&conn, CATEGORY, "theme", self.theme.as_str())?;
        db::set_setting(&conn, CATEGORY, "locale", &self.locale)?;
        Ok(())
    }

    /// Render an amount for display: two decimals plus the currency
    /// symbol. This is the only place money is ever rounded.
    pub fn format_amount(&self, amount: f64) -> String {
        format!("{amount:.2} {}", self.currency_symbol)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
