//! Stock ledger rules (pure, no IO).
//!
//! Stock itself lives on the product stream; this crate defines what a valid
//! adjustment is, the audit record every adjustment produces, and when a
//! product needs reordering.

pub mod adjustment;
pub mod level;

pub use adjustment::{AdjustmentType, StockAdjustment, plan_adjustment};
pub use level::{StockLevel, StockStatus};
