//! Currency registry
//!
//! Maps ISO-style currency codes to their canonical minor-unit precision and
//! display metadata. All monetary storage uses integer minor units, so the
//! registry is the single source of truth for how many decimal places a
//! currency carries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A currency code such as "USD" or "BTC"
///
/// Codes are stored uppercase. Unknown codes are allowed (the registry only
/// provides canonical precision for the ones it knows about).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Registry metadata for this code, if known
    pub fn info(&self) -> Option<&'static CurrencyInfo> {
        lookup(&self.0)
    }

    /// Canonical minor-unit precision; unknown codes default to 2
    pub fn minor_unit(&self) -> u32 {
        self.info().map(|i| i.minor_unit).unwrap_or(DEFAULT_MINOR_UNIT)
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Fallback precision for codes the registry does not know
pub const DEFAULT_MINOR_UNIT: u32 = 2;

/// Registry entry for a known currency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyInfo {
    /// Uppercase currency code
    pub code: &'static str,
    /// Number of decimal places in the minor unit (0-8)
    pub minor_unit: u32,
    /// Display symbol
    pub symbol: &'static str,
    /// Human-readable name
    pub name: &'static str,
}

/// Known currencies, minor units per ISO 4217 (BTC uses satoshis)
static REGISTRY: &[CurrencyInfo] = &[
    CurrencyInfo { code: "USD", minor_unit: 2, symbol: "$", name: "US Dollar" },
    CurrencyInfo { code: "EUR", minor_unit: 2, symbol: "\u{20ac}", name: "Euro" },
    CurrencyInfo { code: "GBP", minor_unit: 2, symbol: "\u{a3}", name: "British Pound" },
    CurrencyInfo { code: "JPY", minor_unit: 0, symbol: "\u{a5}", name: "Japanese Yen" },
    CurrencyInfo { code: "CHF", minor_unit: 2, symbol: "CHF", name: "Swiss Franc" },
    CurrencyInfo { code: "CAD", minor_unit: 2, symbol: "$", name: "Canadian Dollar" },
    CurrencyInfo { code: "AUD", minor_unit: 2, symbol: "$", name: "Australian Dollar" },
    CurrencyInfo { code: "CLP", minor_unit: 0, symbol: "$", name: "Chilean Peso" },
    CurrencyInfo { code: "COP", minor_unit: 2, symbol: "$", name: "Colombian Peso" },
    CurrencyInfo { code: "MXN", minor_unit: 2, symbol: "$", name: "Mexican Peso" },
    CurrencyInfo { code: "BRL", minor_unit: 2, symbol: "R$", name: "Brazilian Real" },
    CurrencyInfo { code: "ARS", minor_unit: 2, symbol: "$", name: "Argentine Peso" },
    CurrencyInfo { code: "KRW", minor_unit: 0, symbol: "\u{20a9}", name: "South Korean Won" },
    CurrencyInfo { code: "CNY", minor_unit: 2, symbol: "\u{a5}", name: "Chinese Yuan" },
    CurrencyInfo { code: "INR", minor_unit: 2, symbol: "\u{20b9}", name: "Indian Rupee" },
    CurrencyInfo { code: "BTC", minor_unit: 8, symbol: "\u{20bf}", name: "Bitcoin" },
];

/// Look up a currency by code (case-insensitive)
pub fn lookup(code: &str) -> Option<&'static CurrencyInfo> {
    let upper = code.trim().to_uppercase();
    REGISTRY.iter().find(|c| c.code == upper)
}

/// All known currencies
pub fn all() -> &'static [CurrencyInfo] {
    REGISTRY
}
