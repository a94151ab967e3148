use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    Low,
    OutOfStock,
}

/// Current stock measured against a product's reorder threshold.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub stock: i64,
    pub low_stock_threshold: i64,
}

impl StockLevel {
    pub fn new(stock: i64, low_stock_threshold: i64) -> Self {
        Self {
            stock,
            low_stock_threshold,
        }
    }

    pub fn status(&self) -> StockStatus {
        if self.stock <= 0 {
            StockStatus::OutOfStock
        } else if self.stock < self.low_stock_threshold {
            StockStatus::Low
        } else {
            StockStatus::InStock
        }
    }

    /// Low or out of stock.
    pub fn needs_reorder(&self) -> bool {
        self.status() != StockStatus::InStock
    }

    /// Units missing to reach the threshold (0 when at or above it).
    pub fn shortfall(&self) -> i64 {
        (self.low_stock_threshold - self.stock).max(0)
    }
}
