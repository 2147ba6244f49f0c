//! Currency rounding and overflow-checked sums.
//!
//! All rounding in the engine is round-half-up (away from zero) to the
//! currency's smallest unit. Each tax line is rounded exactly once, after its
//! own computation; intermediate values are never rounded.
//!
//! Amounts are summed with [`checked_sum`]; `Decimal`'s `+` panics once a
//! total leaves its 96-bit range.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places used for reported percentage rates.
pub const PERCENTAGE_DECIMAL_PLACES: u32 = 2;

/// Rounds an amount to the currency's smallest unit using half-up rounding.
///
/// # Examples
///
/// ```
/// use tax_engine::calculation::round_currency;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// assert_eq!(round_currency(Decimal::from_str("52499.5").unwrap(), 0), Decimal::from(52500));
/// assert_eq!(round_currency(Decimal::from_str("52499.49").unwrap(), 0), Decimal::from(52499));
/// assert_eq!(round_currency(Decimal::from_str("10.005").unwrap(), 2), Decimal::from_str("10.01").unwrap());
/// ```
pub fn round_currency(amount: Decimal, decimal_places: u32) -> Decimal {
    amount.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero)
}

/// Sums amounts, returning `None` if the total leaves `Decimal`'s range.
///
/// # Example
///
/// ```
/// use tax_engine::calculation::checked_sum;
/// use rust_decimal::Decimal;
///
/// assert_eq!(checked_sum([Decimal::ONE, Decimal::TWO]), Some(Decimal::from(3)));
/// assert_eq!(checked_sum([Decimal::MAX, Decimal::ONE]), None);
/// ```
pub fn checked_sum<I>(amounts: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
}

/// Expresses `part / whole` as a percentage rounded to two places.
///
/// Returns zero when `whole` is zero or the ratio is out of range.
pub fn percentage_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map_or(Decimal::ZERO, |percent| {
            percent.round_dp_with_strategy(
                PERCENTAGE_DECIMAL_PLACES,
                RoundingStrategy::MidpointAwayFromZero,
            )
        })
}
