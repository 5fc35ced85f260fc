use crate::error::PaymentError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest amount a card or charge may carry (`DECIMAL(10, 2)` in the card schema).
pub const MAX_AMOUNT: Decimal = dec!(99999999.99);

/// Number of fractional digits an amount may carry.
pub const AMOUNT_SCALE: u32 = 2;

/// A positive monetary amount with at most two fractional digits.
///
/// This wraps `rust_decimal::Decimal` so that any value of this type already
/// satisfies the range and precision rules shared by cards and charges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value <= Decimal::ZERO {
            return Err(PaymentError::InvalidRequest(
                "\"amount\" must be a positive number".to_string(),
            ));
        }
        if value.normalize().scale() > AMOUNT_SCALE {
            return Err(PaymentError::InvalidRequest(
                "\"amount\" must have no more than 2 decimal places".to_string(),
            ));
        }
        if value > MAX_AMOUNT {
            return Err(PaymentError::InvalidRequest(format!(
                "\"amount\" must be less than or equal to {MAX_AMOUNT}"
            )));
        }

        let mut value = value;
        value.rescale(AMOUNT_SCALE);
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Gbp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                PaymentError::InvalidRequest(
                    "\"currency\" must be one of [USD, EUR, GBP]".to_string(),
                )
            })
    }
}
