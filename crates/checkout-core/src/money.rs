//! # Money Types
//!
//! Currency and price types. Amounts are held in the smallest currency unit
//! (paise for INR) so arithmetic never touches floating point; conversion to
//! decimal happens only at the gateway and document boundaries.

use serde::{Deserialize, Serialize};

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    INR,
    USD,
    EUR,
    GBP,
}

impl Currency {
    /// Returns the ISO 4217 currency code as the gateway expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::INR => "INR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
        }
    }

    /// Parse an ISO code, case-insensitively
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "INR" => Some(Currency::INR),
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            _ => None,
        }
    }

    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u8 {
        2
    }

    /// Display symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::INR => "₹",
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
        }
    }

    /// Convert a decimal amount to the smallest currency unit
    pub fn to_smallest_unit(&self, amount: f64) -> i64 {
        let multiplier = 10_f64.powi(self.decimal_places() as i32);
        (amount * multiplier).round() as i64
    }

    /// Convert from smallest unit back to decimal
    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        let divisor = 10_f64.powi(self.decimal_places() as i32);
        amount as f64 / divisor
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::INR
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price with amount in smallest currency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in smallest currency unit (paise for INR)
    pub amount: i64,
    /// Currency
    pub currency: Currency,
}

impl Price {
    /// Create a new price from decimal amount
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self {
            amount: currency.to_smallest_unit(amount),
            currency,
        }
    }

    /// Create a price from the smallest unit
    pub fn from_minor(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency
    pub fn zero(currency: Currency) -> Self {
        Self::from_minor(0, currency)
    }

    /// Get the decimal amount
    pub fn as_decimal(&self) -> f64 {
        self.currency.from_smallest_unit(self.amount)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Multiply by a quantity, saturating at the numeric bounds
    pub fn times(&self, quantity: u32) -> Self {
        Self::from_minor(self.amount.saturating_mul(i64::from(quantity)), self.currency)
    }

    /// Multiply by a quantity, or `None` on overflow
    pub fn checked_times(&self, quantity: u32) -> Option<Self> {
        self.amount
            .checked_mul(i64::from(quantity))
            .map(|amount| Self::from_minor(amount, self.currency))
    }

    /// Add another price of the same currency, saturating at the numeric bounds
    pub fn plus(&self, other: Price) -> Self {
        debug_assert_eq!(self.currency, other.currency);
        Self::from_minor(self.amount.saturating_add(other.amount), self.currency)
    }

    /// Add another price of the same currency, or `None` on overflow
    pub fn checked_plus(&self, other: Price) -> Option<Self> {
        debug_assert_eq!(self.currency, other.currency);
        self.amount
            .checked_add(other.amount)
            .map(|amount| Self::from_minor(amount, self.currency))
    }

    /// Subtract another price of the same currency, clamping at zero
    pub fn saturating_minus(&self, other: Price) -> Self {
        debug_assert_eq!(self.currency, other.currency);
        Self::from_minor(self.amount.saturating_sub(other.amount).max(0), self.currency)
    }

    /// Format for display (e.g., "₹499.00")
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency.symbol(), self.as_decimal())
    }
}
