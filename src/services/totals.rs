//! Purchase order totals: subtotal, VAT, VAT withholding and net payable.
//!
//! All arithmetic is exact decimal arithmetic and nothing is rounded here;
//! rounding for display belongs to whoever renders the amounts.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Fixed VAT rate applied to every order subtotal.
pub const VAT_RATE: Decimal = dec!(0.16);

/// Withholding percentage used when neither the caller nor the provider supplies one.
pub const DEFAULT_WITHHOLDING_PERCENT: Decimal = dec!(75);

/// Largest unit price, in absolute value, accepted for a line.
///
/// With `i32` quantities this keeps every line total below 2.2e21, far inside
/// the range `Decimal` arithmetic can represent.
pub const MAX_UNIT_PRICE: Decimal = dec!(1000000000000);

/// Rejects a unit price whose magnitude exceeds [`MAX_UNIT_PRICE`].
///
/// `line_number` is 1-based and only used in the error message.
pub fn check_unit_price(line_number: usize, unit_price: Decimal) -> Result<(), ServiceError> {
    if unit_price.abs() > MAX_UNIT_PRICE {
        return Err(ServiceError::ValidationError(format!(
            "Line {} unit price exceeds {}",
            line_number, MAX_UNIT_PRICE
        )));
    }
    Ok(())
}

/// Anything with a quantity and a unit price can be totalled.
pub trait PricedLine {
    fn quantity(&self) -> Decimal;
    fn unit_price(&self) -> Decimal;
}

impl PricedLine for (i32, Decimal) {
    fn quantity(&self) -> Decimal {
        Decimal::from(self.0)
    }

    fn unit_price(&self) -> Decimal {
        self.1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub vat: Decimal,
    pub vat_withheld: Decimal,
    pub net_payable: Decimal,
}

/// quantity × unit price for a single line
pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    Decimal::from(quantity) * unit_price
}

/// Computes order totals from priced lines.
///
/// `withholding_percent` of `None` means [`DEFAULT_WITHHOLDING_PERCENT`].
/// Negative quantities or prices are not rejected.
pub fn compute_totals<L: PricedLine>(
    lines: &[L],
    withholding_percent: Option<Decimal>,
) -> OrderTotals {
    let withholding_percent = withholding_percent.unwrap_or(DEFAULT_WITHHOLDING_PERCENT);

    let subtotal = lines
        .iter()
        .fold(Decimal::ZERO, |acc, line| acc + line.quantity() * line.unit_price());
    let vat = subtotal * VAT_RATE;
    let vat_withheld = vat * (withholding_percent / Decimal::ONE_HUNDRED);
    let net_payable = subtotal + vat - vat_withheld;

    OrderTotals {
        subtotal,
        vat,
        vat_withheld,
        net_payable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn computes_reference_example() {
        let lines = [(2, dec!(100)), (1, dec!(50))];
        let totals = compute_totals(&lines, Some(dec!(75)));

        assert_eq!(totals.subtotal, dec!(250));
        assert_eq!(totals.vat, dec!(40));
        assert_eq!(totals.vat_withheld, dec!(30));
        assert_eq!(totals.net_payable, dec!(260));
    }

    #[test]
    fn missing_withholding_defaults_to_seventy_five_percent() {
        let lines = [(3, dec!(19.99)), (7, dec!(4.25))];
        assert_eq!(
            compute_totals(&lines, None),
            compute_totals(&lines, Some(dec!(75)))
        );
    }

    #[test]
    fn empty_lines_yield_zero_totals() {
        let lines: [(i32, Decimal); 0] = [];
        let totals = compute_totals(&lines, Some(dec!(100)));
        assert_eq!(totals, OrderTotals::default());
    }

    #[rstest]
    #[case(dec!(0), dec!(116))]
    #[case(dec!(75), dec!(104))]
    #[case(dec!(100), dec!(100))]
    fn withholding_percent_drives_net_payable(#[case] percent: Decimal, #[case] net: Decimal) {
        let totals = compute_totals(&[(1, dec!(100))], Some(percent));
        assert_eq!(totals.net_payable, net);
    }

    #[test]
    fn negative_amounts_pass_through_unvalidated() {
        let totals = compute_totals(&[(-2, dec!(10))], None);
        assert_eq!(totals.subtotal, dec!(-20));
        assert_eq!(totals.vat, dec!(-3.2));
    }

    #[test]
    fn largest_accepted_lines_do_not_overflow() {
        let lines = [(i32::MAX, MAX_UNIT_PRICE), (i32::MIN, -MAX_UNIT_PRICE)];
        assert!(check_unit_price(1, MAX_UNIT_PRICE).is_ok());
        assert!(check_unit_price(2, -MAX_UNIT_PRICE).is_ok());

        let totals = compute_totals(&lines, Some(dec!(100)));
        assert_eq!(totals.net_payable, totals.subtotal);
    }

    #[test]
    fn unit_price_above_limit_is_rejected() {
        assert!(matches!(
            check_unit_price(3, MAX_UNIT_PRICE + dec!(0.01)),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            check_unit_price(1, Decimal::MIN),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn line_total_multiplies_quantity_by_price() {
        assert_eq!(line_total(4, dec!(12.5)), dec!(50));
    }
}
