//! Money helpers
//!
//! Prices and totals are `rust_decimal::Decimal` with two decimal places,
//! matching the `NUMERIC(12,2)` columns. Every line total and every cart or
//! order total is computed through this module so the in-memory store and the
//! PostgreSQL store agree to the cent.

use rust_decimal::prelude::*;
use thiserror::Error;

/// Decimal places kept for prices and totals
pub const MONEY_SCALE: u32 = 2;

/// Largest accepted unit price (fits NUMERIC(12,2))
const MAX_PRICE: i64 = 9_999_999_999;

/// Money validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must be greater than zero")]
    NotPositive,

    #[error("amount has {provided} decimal places, at most {max} allowed")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("amount too large")]
    Overflow,
}

/// Validate a client supplied price or amount.
///
/// Rejects zero or negative values, more than two decimal places, and values
/// the database column cannot hold. The input scale is kept as given.
pub fn validate_price(price: Decimal) -> Result<Decimal, MoneyError> {
    if price <= Decimal::ZERO {
        return Err(MoneyError::NotPositive);
    }
    let scale = price.normalize().scale();
    if scale > MONEY_SCALE {
        return Err(MoneyError::PrecisionOverflow {
            provided: scale,
            max: MONEY_SCALE,
        });
    }
    if price > Decimal::from(MAX_PRICE) {
        return Err(MoneyError::Overflow);
    }
    Ok(price)
}

/// quantity × price, rounded to cents
pub fn line_total(price: Decimal, quantity: i32) -> Decimal {
    (price * Decimal::from(quantity)).round_dp(MONEY_SCALE)
}

/// Sum of line totals
pub fn sum_totals<I>(totals: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    totals.into_iter().fold(Decimal::ZERO, |acc, t| acc + t)
}

/// Whole currency units, rounded up. M-Pesa only accepts integer amounts.
pub fn whole_units_ceil(amount: Decimal) -> Option<u64> {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::AwayFromZero)
        .to_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(d("10"), 2), d("20"));
        assert_eq!(line_total(d("19.99"), 3), d("59.97"));
        assert_eq!(line_total(d("0.10"), 0), Decimal::ZERO);
    }

    #[test]
    fn test_sum_totals() {
        let total = sum_totals([line_total(d("10"), 2), line_total(d("20"), 1)]);
        assert_eq!(total, d("40"));
        assert_eq!(sum_totals(Vec::<Decimal>::new()), Decimal::ZERO);
    }

    #[test]
    fn test_validate_price() {
        assert_eq!(validate_price(d("12.50")), Ok(d("12.50")));
        assert_eq!(validate_price(d("0")), Err(MoneyError::NotPositive));
        assert_eq!(validate_price(d("-1")), Err(MoneyError::NotPositive));
        assert_eq!(
            validate_price(d("1.005")),
            Err(MoneyError::PrecisionOverflow {
                provided: 3,
                max: 2
            })
        );
        assert_eq!(validate_price(d("10000000000")), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_whole_units_ceil() {
        assert_eq!(whole_units_ceil(d("100")), Some(100));
        assert_eq!(whole_units_ceil(d("100.01")), Some(101));
        assert_eq!(whole_units_ceil(d("-1")), None);
    }
}
