//! Fixed-point money helpers shared by the quotation engine and the renderer.
//!
//! Money is stored with two decimal places and tax rates with four. Rounding
//! uses banker's rounding (midpoint to even) and is applied at write time.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for money amounts
pub const MONEY_SCALE: u32 = 2;

/// Decimal places kept for tax rates
pub const RATE_SCALE: u32 = 4;

/// Round a money amount to two places using banker's rounding.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use environovalab_api::money::round_money;
///
/// assert_eq!(round_money(dec!(0.125)), dec!(0.12));
/// assert_eq!(round_money(dec!(0.135)), dec!(0.14));
/// assert_eq!(round_money(dec!(30)), dec!(30.00));
/// ```
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(MONEY_SCALE);
    rounded
}

pub fn round_rate(rate: Decimal) -> Decimal {
    let mut rounded = rate.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(RATE_SCALE);
    rounded
}

/// Largest accepted unit price, `999999999.99`
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_215_752_191, 23, 0, false, 2);

/// Largest accepted line quantity
pub const MAX_QUANTITY: i32 = 1_000_000;

/// An amount left the range `Decimal` can represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("El importe excede el máximo admitido")]
pub struct AmountOverflow;

/// Line subtotal: `unit_price * quantity`, rounded
pub fn line_subtotal(unit_price: Decimal, quantity: i32) -> Result<Decimal, AmountOverflow> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .map(round_money)
        .ok_or(AmountOverflow)
}

/// Totals derived from a proforma's line subtotals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

impl Totals {
    /// Sums the line subtotals and applies `tax_rate`
    pub fn compute<I>(line_subtotals: I, tax_rate: Decimal) -> Result<Self, AmountOverflow>
    where
        I: IntoIterator<Item = Decimal>,
    {
        let sum = line_subtotals
            .into_iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line))
            .ok_or(AmountOverflow)?;
        let subtotal = round_money(sum);
        let tax_amount = round_money(
            subtotal
                .checked_mul(round_rate(tax_rate))
                .ok_or(AmountOverflow)?,
        );
        let total = subtotal.checked_add(tax_amount).ok_or(AmountOverflow)?;
        Ok(Totals {
            subtotal,
            tax_amount,
            total: round_money(total),
        })
    }
}

/// `$1234.50` style rendering used in documents
pub fn format_money(amount: Decimal) -> String {
    format!("${}", round_money(amount))
}

/// Percentage label for a rate: `0.12` becomes `12`, `0.125` becomes `12.5`
pub fn percent_label(rate: Decimal) -> String {
    (round_rate(rate) * Decimal::ONE_HUNDRED).normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn totals_for_two_lines_at_twelve_percent() {
        let totals = Totals::compute(
            [
                line_subtotal(dec!(100), 2).unwrap(),
                line_subtotal(dec!(50), 1).unwrap(),
            ],
            dec!(0.12),
        )
        .unwrap();
        assert_eq!(totals.subtotal, dec!(250.00));
        assert_eq!(totals.tax_amount, dec!(30.00));
        assert_eq!(totals.total, dec!(280.00));
    }

    #[test]
    fn empty_proforma_has_zero_totals() {
        let totals = Totals::compute(Vec::<Decimal>::new(), dec!(0.12)).unwrap();
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn max_unit_price_constant() {
        assert_eq!(MAX_UNIT_PRICE, dec!(999999999.99));
    }

    #[test]
    fn oversized_amounts_overflow_instead_of_panicking() {
        let huge = Decimal::MAX;
        assert_eq!(line_subtotal(huge, 2), Err(AmountOverflow));
        assert_eq!(Totals::compute([huge, huge], dec!(0.12)), Err(AmountOverflow));
        assert_eq!(Totals::compute([huge], dec!(0.12)), Err(AmountOverflow));
    }

    #[test]
    fn largest_accepted_line_fits() {
        let subtotal = line_subtotal(MAX_UNIT_PRICE, MAX_QUANTITY).unwrap();
        assert_eq!(subtotal, dec!(999999999990000.00));
        assert!(Totals::compute([subtotal; 100], dec!(1)).is_ok());
    }

    #[test]
    fn formats_with_two_places() {
        assert_eq!(format_money(dec!(30)), "$30.00");
        assert_eq!(format_money(dec!(1234.5)), "$1234.50");
        assert_eq!(format_money(dec!(0.125)), "$0.12");
    }

    #[test]
    fn percent_label_drops_trailing_zeros() {
        assert_eq!(percent_label(dec!(0.12)), "12");
        assert_eq!(percent_label(dec!(0.1250)), "12.5");
        assert_eq!(percent_label(Decimal::ZERO), "0");
    }

    proptest! {
        #[test]
        fn total_is_subtotal_plus_tax(
            cents in proptest::collection::vec(0i64..10_000_000, 0..20),
            rate_bp in 0i64..10_000,
        ) {
            let lines: Vec<Decimal> = cents.iter().map(|c| Decimal::new(*c, 2)).collect();
            let rate = Decimal::new(rate_bp, 4);
            let totals = Totals::compute(lines.clone(), rate).unwrap();

            let expected_subtotal: Decimal = lines.iter().copied().sum();
            prop_assert_eq!(totals.subtotal, expected_subtotal);
            prop_assert_eq!(totals.total, totals.subtotal + totals.tax_amount);
            prop_assert_eq!(totals.tax_amount, round_money(totals.subtotal * rate));
        }
    }
}
