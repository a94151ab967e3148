//! Catalog domain module (event-sourced).
//!
//! A product's event stream doubles as its stock ledger: current stock is the
//! initial stock from `ProductCreated` plus every `StockAdjusted` quantity.

pub mod category;
pub mod product;

pub use category::{
    CATEGORY_AGGREGATE, Category, CategoryCommand, CategoryCreated, CategoryDeleted, CategoryEvent, CategoryId,
    CategoryRenamed, CreateCategory, DeleteCategory, RenameCategory,
};
pub use product::{
    AdjustStock, CreateProduct, PRODUCT_AGGREGATE, DeactivateProduct, Product, ProductCommand, ProductCreated,
    ProductDeactivated, ProductEvent, ProductId, ProductReactivated, ProductUpdated,
    ReactivateProduct, StockAdjusted, UpdateProduct,
};
