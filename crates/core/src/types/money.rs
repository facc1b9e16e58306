//! Money amounts using decimal arithmetic.
//!
//! Prices, line totals and order totals are all `rust_decimal::Decimal` in the
//! store's single configured currency. Amounts are rounded to two places with
//! banker's rounding disabled (half away from zero), matching what a shopper
//! sees on a receipt.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A money amount in the store currency.
pub type Money = Decimal;

/// Round an amount to two decimal places, half away from zero.
#[must_use]
pub fn round_money(amount: Money) -> Money {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount with exactly two decimal places (e.g. `"1299.00"`).
///
/// Payment gateways sign the amount as a string, so the formatting must be
/// stable: `1299`, `1299.0` and `1299.000` all render as `1299.00`.
#[must_use]
pub fn format_amount(amount: Money) -> String {
    format!("{:.2}", round_money(amount))
}

/// ISO 4217 currency codes supported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    PLN,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// The ISO code as a string.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::PLN => "PLN",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }

    /// Display symbol for receipts and emails.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::PLN => "zł",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Render an amount for humans, e.g. `₹1299.00`.
    #[must_use]
    pub fn display(&self, amount: Money) -> String {
        format!("{}{}", self.symbol(), format_amount(amount))
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "PLN" => Ok(Self::PLN),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}
