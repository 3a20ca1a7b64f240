//! User settings model
//!
//! Singleton settings document: security gate configuration, financial
//! display options and UI preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::currency::CurrencyCode;

/// Fixed document id of the singleton settings
pub const SETTINGS_DOC_ID: &str = "settings::user";

/// Default gate session duration in minutes
pub const DEFAULT_GATE_DURATION_MIN: u32 = 5;

/// Which secondary-factor gate protects the ledger, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GateMethod {
    /// Short secret verified through a slow key-derivation function
    Pin,
    /// Platform-authenticator credential ceremony
    Webauthn,
    /// No gate configured
    #[default]
    None,
}

/// Per-user configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    /// Configured gate method
    pub gate_method: GateMethod,

    /// How long an unlocked gate session lasts
    pub gate_duration_min: u32,

    /// Override of the profile's home currency for displays
    pub home_currency_override: Option<CurrencyCode>,

    /// Mask balances in listings until explicitly revealed
    pub hide_balances: bool,

    /// UI theme preference
    pub theme: String,

    /// Landing view after unlock
    pub default_view: String,

    /// When the settings were created
    pub created_at: DateTime<Utc>,

    /// When the settings were last modified
    pub updated_at: DateTime<Utc>,
}

impl Default for UserSettings {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            gate_method: GateMethod::None,
            gate_duration_min: DEFAULT_GATE_DURATION_MIN,
            home_currency_override: None,
            hide_balances: false,
            theme: "system".to_string(),
            default_view: "dashboard".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = UserSettings::default();
        assert_eq!(settings.gate_method, GateMethod::None);
        assert_eq!(settings.gate_duration_min, DEFAULT_GATE_DURATION_MIN);
        assert!(!settings.hide_balances);
    }

    #[test]
    fn test_gate_method_serialization() {
        assert_eq!(
            serde_json::to_string(&GateMethod::Webauthn).unwrap(),
            "\"webauthn\""
        );
        let parsed: GateMethod = serde_json::from_str("\"pin\"").unwrap();
        assert_eq!(parsed, GateMethod::Pin);
    }

    #[test]
    fn test_serialization_round_trip() {
        let settings = UserSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: UserSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.gate_method, settings.gate_method);
        assert_eq!(back.theme, settings.theme);
    }
}
