//! Money type for representing currency amounts
//!
//! Internally stores amounts as integers in the currency's minor unit (cents
//! for USD, satoshis for BTC, whole pesos for CLP) to avoid floating-point
//! precision issues. Arithmetic across different currencies fails with a
//! `CurrencyMismatch` error instead of silently mixing units.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{LedgerError, LedgerResult, ValidationError};

use super::currency::CurrencyCode;

/// An immutable monetary amount: integer minor units plus a currency code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: i64,
    currency: CurrencyCode,
}

impl Money {
    /// Create from a raw minor-unit amount
    ///
    /// # Examples
    /// ```
    /// use pocket_ledger::models::Money;
    /// let amount = Money::from_minor(1050, "USD"); // $10.50
    /// ```
    pub fn from_minor(amount: i64, currency: impl Into<CurrencyCode>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    /// Create a zero amount in the given currency
    pub fn zero(currency: impl Into<CurrencyCode>) -> Self {
        Self::from_minor(0, currency)
    }

    /// Parse a user-entered decimal string onto the currency's minor-unit grid
    ///
    /// `"10.50"` USD becomes 1050; `"1000"` CLP becomes 1000; `"0.00000001"`
    /// BTC becomes 1. Digits beyond the currency's precision are rounded
    /// half-up. Accepts a leading sign; no grouping separators.
    pub fn from_user_input(input: &str, currency: impl Into<CurrencyCode>) -> LedgerResult<Self> {
        let currency = currency.into();
        let minor_unit = currency.minor_unit();
        let s = input.trim();

        if s.is_empty() {
            return Err(ValidationError::single("amount", "must not be empty").into());
        }

        let (negative, s) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid_amount(input));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid_amount(input));
        }

        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid_amount(input))?
        };

        let scale = 10i64.pow(minor_unit);
        let mut minor = whole.checked_mul(scale).ok_or_else(|| invalid_amount(input))?;

        if !frac_part.is_empty() {
            let precision = minor_unit as usize;
            let (kept, excess) = if frac_part.len() > precision {
                frac_part.split_at(precision)
            } else {
                (frac_part, "")
            };

            let mut frac: i64 = if kept.is_empty() {
                0
            } else {
                kept.parse().map_err(|_| invalid_amount(input))?
            };
            // Right-pad to the full precision: "5" in USD means 50 cents
            frac *= 10i64.pow((precision - kept.len()) as u32);

            // Round half-up on the first excess digit
            if excess.chars().next().is_some_and(|c| c >= '5') {
                frac += 1;
            }

            minor = minor.checked_add(frac).ok_or_else(|| invalid_amount(input))?;
        }

        if negative {
            minor = -minor;
        }

        Ok(Self::from_minor(minor, currency))
    }

    /// Create from a plain decimal number, rounding once onto the minor grid
    pub fn from_decimal(value: f64, currency: impl Into<CurrencyCode>) -> LedgerResult<Self> {
        let currency = currency.into();
        if !value.is_finite() {
            return Err(ValidationError::single("amount", "must be a finite number").into());
        }
        let scale = 10f64.powi(currency.minor_unit() as i32);
        let scaled = (value * scale).round();
        if scaled > i64::MAX as f64 || scaled < i64::MIN as f64 {
            return Err(ValidationError::single("amount", "out of range").into());
        }
        Ok(Self::from_minor(scaled as i64, currency))
    }

    /// Raw amount in minor units
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Currency code
    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// Absolute value
    pub fn abs(&self) -> Self {
        Self::from_minor(self.amount.abs(), self.currency.clone())
    }

    /// Negated value
    pub fn negate(&self) -> Self {
        Self::from_minor(-self.amount, self.currency.clone())
    }

    /// Add another amount of the same currency
    pub fn add(&self, other: &Money) -> LedgerResult<Money> {
        self.check_currency(other)?;
        Ok(Self::from_minor(
            self.amount + other.amount,
            self.currency.clone(),
        ))
    }

    /// Subtract another amount of the same currency
    pub fn subtract(&self, other: &Money) -> LedgerResult<Money> {
        self.check_currency(other)?;
        Ok(Self::from_minor(
            self.amount - other.amount,
            self.currency.clone(),
        ))
    }

    /// Multiply by an integer factor
    pub fn multiply(&self, factor: i64) -> Money {
        Self::from_minor(self.amount * factor, self.currency.clone())
    }

    /// Divide by an integer divisor, rounding half away from zero
    pub fn divide(&self, divisor: i64) -> LedgerResult<Money> {
        if divisor == 0 {
            return Err(LedgerError::DivisionByZero);
        }
        let quotient = self.amount / divisor;
        let remainder = self.amount % divisor;
        let rounded = if remainder.abs() * 2 >= divisor.abs() {
            quotient + (self.amount.signum() * divisor.signum())
        } else {
            quotient
        };
        Ok(Self::from_minor(rounded, self.currency.clone()))
    }

    /// Compare two amounts of the same currency
    pub fn compare(&self, other: &Money) -> LedgerResult<Ordering> {
        self.check_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    fn check_currency(&self, other: &Money) -> LedgerResult<()> {
        if self.currency != other.currency {
            return Err(LedgerError::CurrencyMismatch {
                left: self.currency.to_string(),
                right: other.currency.to_string(),
            });
        }
        Ok(())
    }

    /// Decimal rendering without the currency code (e.g. "-50.00")
    pub fn to_decimal_string(&self) -> String {
        let minor_unit = self.currency.minor_unit();
        if minor_unit == 0 {
            return format!("{}", self.amount);
        }
        let scale = 10i64.pow(minor_unit);
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.abs();
        format!(
            "{}{}.{:0width$}",
            sign,
            abs / scale,
            abs % scale,
            width = minor_unit as usize
        )
    }

    /// Format with the registry symbol, falling back to the code
    pub fn format_with_symbol(&self) -> String {
        match self.currency.info() {
            Some(info) => {
                if self.amount < 0 {
                    format!("-{}{}", info.symbol, self.abs().to_decimal_string())
                } else {
                    format!("{}{}", info.symbol, self.to_decimal_string())
                }
            }
            None => self.to_string(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal_string(), self.currency)
    }
}

fn invalid_amount(input: &str) -> LedgerError {
    ValidationError::single("amount", format!("invalid amount: {input}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let m = Money::from_minor(1050, "USD");
        assert_eq!(m.amount(), 1050);
        assert_eq!(m.currency().as_str(), "USD");
    }

    #[test]
    fn test_from_user_input_usd() {
        assert_eq!(Money::from_user_input("10.50", "USD").unwrap().amount(), 1050);
        assert_eq!(Money::from_user_input("-10.50", "USD").unwrap().amount(), -1050);
        assert_eq!(Money::from_user_input("10", "USD").unwrap().amount(), 1000);
        assert_eq!(Money::from_user_input("10.5", "USD").unwrap().amount(), 1050);
        assert_eq!(Money::from_user_input("0.05", "USD").unwrap().amount(), 5);
    }

    #[test]
    fn test_from_user_input_zero_decimal_currency() {
        assert_eq!(Money::from_user_input("1000", "CLP").unwrap().amount(), 1000);
        assert_eq!(Money::from_user_input("-250", "CLP").unwrap().amount(), -250);
    }

    #[test]
    fn test_from_user_input_btc_satoshi() {
        assert_eq!(
            Money::from_user_input("0.00000001", "BTC").unwrap().amount(),
            1
        );
        assert_eq!(
            Money::from_user_input("1", "BTC").unwrap().amount(),
            100_000_000
        );
    }

    #[test]
    fn test_from_user_input_rounds_excess_digits() {
        // Third decimal in USD rounds half-up
        assert_eq!(Money::from_user_input("1.005", "USD").unwrap().amount(), 101);
        assert_eq!(Money::from_user_input("1.004", "USD").unwrap().amount(), 100);
        // CLP has no decimals at all
        assert_eq!(Money::from_user_input("10.6", "CLP").unwrap().amount(), 11);
    }

    #[test]
    fn test_from_user_input_rejects_garbage() {
        assert!(Money::from_user_input("", "USD").is_err());
        assert!(Money::from_user_input("abc", "USD").is_err());
        assert!(Money::from_user_input("1,000.00", "USD").is_err());
        assert!(Money::from_user_input(".", "USD").is_err());
    }

    #[test]
    fn test_from_decimal() {
        assert_eq!(Money::from_decimal(10.50, "USD").unwrap().amount(), 1050);
        assert_eq!(Money::from_decimal(-0.25, "USD").unwrap().amount(), -25);
        assert!(Money::from_decimal(f64::NAN, "USD").is_err());
        assert!(Money::from_decimal(f64::INFINITY, "USD").is_err());
    }

    #[test]
    fn test_add_subtract_same_currency() {
        let a = Money::from_minor(1000, "USD");
        let b = Money::from_minor(250, "USD");
        assert_eq!(a.add(&b).unwrap().amount(), 1250);
        assert_eq!(a.subtract(&b).unwrap().amount(), 750);
    }

    #[test]
    fn test_currency_mismatch() {
        let usd = Money::from_minor(100, "USD");
        let eur = Money::from_minor(100, "EUR");
        assert!(matches!(
            usd.add(&eur),
            Err(LedgerError::CurrencyMismatch { .. })
        ));
        assert!(usd.compare(&eur).is_err());
        // Equality is currency-checked through derive: not equal
        assert_ne!(usd, eur);
    }

    #[test]
    fn test_multiply_divide() {
        let m = Money::from_minor(1000, "USD");
        assert_eq!(m.multiply(3).amount(), 3000);
        assert_eq!(m.divide(3).unwrap().amount(), 333);
        // Half away from zero
        assert_eq!(Money::from_minor(5, "USD").divide(2).unwrap().amount(), 3);
        assert_eq!(Money::from_minor(-5, "USD").divide(2).unwrap().amount(), -3);
    }

    #[test]
    fn test_divide_by_zero() {
        let m = Money::from_minor(100, "USD");
        assert!(matches!(m.divide(0), Err(LedgerError::DivisionByZero)));
    }

    #[test]
    fn test_predicates_abs_negate() {
        assert!(Money::zero("USD").is_zero());
        assert!(Money::from_minor(1, "USD").is_positive());
        assert!(Money::from_minor(-1, "USD").is_negative());
        assert_eq!(Money::from_minor(-1050, "USD").abs().amount(), 1050);
        assert_eq!(Money::from_minor(1050, "USD").negate().amount(), -1050);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(-5000, "USD").to_string(), "-50.00 USD");
        assert_eq!(Money::from_minor(1000, "CLP").to_string(), "1000 CLP");
        assert_eq!(Money::from_minor(1, "BTC").to_string(), "0.00000001 BTC");
        assert_eq!(Money::from_minor(5, "USD").to_string(), "0.05 USD");
    }

    #[test]
    fn test_format_with_symbol() {
        assert_eq!(Money::from_minor(1050, "USD").format_with_symbol(), "$10.50");
        assert_eq!(
            Money::from_minor(-1050, "USD").format_with_symbol(),
            "-$10.50"
        );
    }

    #[test]
    fn test_json_round_trip() {
        let m = Money::from_minor(-5000, "USD");
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"amount":-5000,"currency":"USD"}"#);
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_compare() {
        let a = Money::from_minor(1000, "USD");
        let b = Money::from_minor(500, "USD");
        assert_eq!(a.compare(&b).unwrap(), Ordering::Greater);
        assert_eq!(b.compare(&a).unwrap(), Ordering::Less);
        assert_eq!(a.compare(&a).unwrap(), Ordering::Equal);
    }
}
