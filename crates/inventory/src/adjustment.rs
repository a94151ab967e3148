use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use forgepos_core::{AggregateId, DomainError, DomainResult, UserId};

/// Why stock changed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentType {
    /// Goods received from a supplier (quantity > 0).
    Purchase,
    /// Shrinkage, damage, theft (quantity < 0).
    Loss,
    /// Stock count correction (any sign).
    Correction,
    /// Goods sent back to a supplier (quantity < 0).
    Return,
    /// Checkout decrement (quantity < 0). Never entered by hand.
    Sale,
}

impl AdjustmentType {
    pub const ALL: [AdjustmentType; 5] = [
        AdjustmentType::Purchase,
        AdjustmentType::Loss,
        AdjustmentType::Correction,
        AdjustmentType::Return,
        AdjustmentType::Sale,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AdjustmentType::Purchase => "purchase",
            AdjustmentType::Loss => "loss",
            AdjustmentType::Correction => "correction",
            AdjustmentType::Return => "return",
            AdjustmentType::Sale => "sale",
        }
    }

    /// Whether this type may be recorded through the manual adjustment path.
    pub fn is_manual(self) -> bool {
        !matches!(self, AdjustmentType::Sale)
    }

    /// Check the sign of `quantity` for this type.
    pub fn check_quantity(self, quantity: i64) -> DomainResult<()> {
        match self {
            AdjustmentType::Purchase if quantity <= 0 => Err(DomainError::validation(
                "purchase quantity must be positive",
            )),
            AdjustmentType::Loss | AdjustmentType::Return | AdjustmentType::Sale
                if quantity >= 0 =>
            {
                Err(DomainError::validation(format!(
                    "{} quantity must be negative",
                    self.as_str()
                )))
            }
            _ => Ok(()),
        }
    }
}

impl core::fmt::Display for AdjustmentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjustmentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "purchase" => Ok(AdjustmentType::Purchase),
            "loss" => Ok(AdjustmentType::Loss),
            "correction" => Ok(AdjustmentType::Correction),
            "return" => Ok(AdjustmentType::Return),
            "sale" => Ok(AdjustmentType::Sale),
            other => Err(DomainError::validation(format!(
                "unknown adjustment type '{other}' (expected purchase, loss, correction, return or sale)"
            ))),
        }
    }
}

/// Validate an adjustment against the current stock and return the new stock.
///
/// Sign rules come from [`AdjustmentType::check_quantity`]; on top of that the
/// result may never be negative.
pub fn plan_adjustment(
    previous_stock: i64,
    quantity: i64,
    adjustment_type: AdjustmentType,
) -> DomainResult<i64> {
    adjustment_type.check_quantity(quantity)?;

    let new_stock = previous_stock
        .checked_add(quantity)
        .ok_or_else(|| DomainError::validation("stock quantity overflow"))?;

    if new_stock < 0 {
        return Err(DomainError::invariant(format!(
            "insufficient stock: have {previous_stock}, adjustment of {quantity} would leave {new_stock}"
        )));
    }

    Ok(new_stock)
}

/// Append-only audit record of one stock change.
///
/// `new_stock == previous_stock + adjustment_quantity` always holds. Names are
/// denormalized at the time of the adjustment so history survives renames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub adjustment_id: Uuid,
    pub product_id: AggregateId,
    pub product_name: String,
    pub previous_stock: i64,
    pub adjustment_quantity: i64,
    pub new_stock: i64,
    pub adjustment_type: AdjustmentType,
    pub supplier_id: Option<AggregateId>,
    pub supplier_name: Option<String>,
    pub user_id: UserId,
    pub user_name: String,
    pub transaction_id: Option<AggregateId>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
