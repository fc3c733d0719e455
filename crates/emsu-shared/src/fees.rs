//! Fee payment status derivation.

use rust_decimal::Decimal;

use crate::types::string_enum;

string_enum! {
    /// Settlement state of a fee structure for one student.
    FeeStatus {
        Pending => "pending",
        Partial => "partial",
        Paid => "paid",
    }
}

impl FeeStatus {
    /// Derive the status from the structure amount and the cumulative amount
    /// paid against it.
    pub fn derive(amount: Decimal, paid: Decimal) -> Self {
        if paid >= amount {
            FeeStatus::Paid
        } else if paid > Decimal::ZERO {
            FeeStatus::Partial
        } else {
            FeeStatus::Pending
        }
    }
}

/// Outstanding amount, never negative.
pub fn balance(amount: Decimal, paid: Decimal) -> Decimal {
    (amount - paid).max(Decimal::ZERO)
}
