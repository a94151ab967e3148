use core::str::FromStr;

use serde::{Deserialize, Serialize};

use forgepos_core::{DomainError, DomainResult, Money};

use crate::cart::{Cart, calculate_subtotal, calculate_total};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

impl core::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            other => Err(DomainError::validation(format!(
                "unknown payment method '{other}' (expected cash, card or transfer)"
            ))),
        }
    }
}

/// How the customer pays, plus the cart-level discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    /// Tendered amount. Required for cash; defaults to the total otherwise.
    #[serde(default)]
    pub amount_paid: Option<Money>,
    #[serde(default)]
    pub discount: Money,
}

/// Priced checkout: what the receipt shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub amount_paid: Money,
    /// Present for cash payments only.
    pub change: Option<Money>,
}

/// Validate the cart and payment and compute the totals.
///
/// The cart discount must lie in `[0, subtotal]`. Cash must cover the total;
/// non-cash payments are taken at exactly the total.
pub fn price_checkout(cart: &Cart, payment: &PaymentDetails) -> DomainResult<CheckoutTotals> {
    cart.validate()?;

    let subtotal = calculate_subtotal(cart)?;
    if payment.discount.is_negative() {
        return Err(DomainError::validation("discount cannot be negative"));
    }
    if payment.discount > subtotal {
        return Err(DomainError::validation(format!(
            "discount {} exceeds subtotal {}",
            payment.discount, subtotal
        )));
    }
    let total = calculate_total(cart, payment.discount)?;

    let (amount_paid, change) = match payment.method {
        PaymentMethod::Cash => {
            let paid = payment
                .amount_paid
                .ok_or_else(|| DomainError::validation("amount paid is required for cash"))?;
            if paid < total {
                return Err(DomainError::validation(format!(
                    "insufficient payment: paid {paid}, total {total}"
                )));
            }
            (paid, Some(paid.checked_sub(total)?))
        }
        PaymentMethod::Card | PaymentMethod::Transfer => {
            let paid = payment.amount_paid.unwrap_or(total);
            if paid != total {
                return Err(DomainError::validation(format!(
                    "{} payments must equal the total ({total})",
                    payment.method
                )));
            }
            (paid, None)
        }
    };

    Ok(CheckoutTotals {
        subtotal,
        discount: payment.discount,
        total,
        amount_paid,
        change,
    })
}
