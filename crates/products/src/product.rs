use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use forgepos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId, UserId};
use forgepos_events::Event;
use forgepos_inventory::{AdjustmentType, StockAdjustment, StockLevel, plan_adjustment};

use crate::CategoryId;

/// Stream type for product aggregates.
pub const PRODUCT_AGGREGATE: &str = "products.product";

/// Product identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Product (catalog entry + stock ledger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    sku: String,
    name: String,
    price: Money,
    cost: Money,
    stock: i64,
    low_stock_threshold: i64,
    category_id: Option<CategoryId>,
    active: bool,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            sku: String::new(),
            name: String::new(),
            price: Money::ZERO,
            cost: Money::ZERO,
            stock: 0,
            low_stock_threshold: 0,
            category_id: None,
            active: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn cost(&self) -> Money {
        self.cost
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn low_stock_threshold(&self) -> i64 {
        self.low_stock_threshold
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stock_level(&self) -> StockLevel {
        StockLevel::new(self.stock, self.low_stock_threshold)
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub price: Money,
    pub cost: Money,
    pub initial_stock: i64,
    pub low_stock_threshold: i64,
    pub category_id: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProduct. `None` leaves a field unchanged; for the category,
/// `Some(None)` clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: Option<String>,
    pub price: Option<Money>,
    pub cost: Option<Money>,
    pub low_stock_threshold: Option<i64>,
    pub category_id: Option<Option<CategoryId>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock.
///
/// Carries everything the audit record needs besides what the aggregate
/// already knows (product name, previous stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub adjustment_id: Uuid,
    pub quantity: i64,
    pub adjustment_type: AdjustmentType,
    pub supplier_id: Option<AggregateId>,
    pub supplier_name: Option<String>,
    pub user_id: UserId,
    pub user_name: String,
    pub transaction_id: Option<AggregateId>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProduct(UpdateProduct),
    DeactivateProduct(DeactivateProduct),
    ReactivateProduct(ReactivateProduct),
    AdjustStock(AdjustStock),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub price: Money,
    pub cost: Money,
    pub initial_stock: i64,
    pub low_stock_threshold: i64,
    pub category_id: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductUpdated. Carries the full editable state after the update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub cost: Money,
    pub low_stock_threshold: i64,
    pub category_id: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeactivated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReactivated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted. One ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub adjustment: StockAdjustment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    ProductDeactivated(ProductDeactivated),
    ProductReactivated(ProductReactivated),
    StockAdjusted(StockAdjusted),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::ProductUpdated(_) => "products.product.updated",
            ProductEvent::ProductDeactivated(_) => "products.product.deactivated",
            ProductEvent::ProductReactivated(_) => "products.product.reactivated",
            ProductEvent::StockAdjusted(_) => "products.product.stock_adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::ProductDeactivated(e) => e.occurred_at,
            ProductEvent::ProductReactivated(e) => e.occurred_at,
            ProductEvent::StockAdjusted(e) => e.adjustment.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.price = e.price;
                self.cost = e.cost;
                self.stock = e.initial_stock;
                self.low_stock_threshold = e.low_stock_threshold;
                self.category_id = e.category_id;
                self.active = true;
                self.created = true;
            }
            ProductEvent::ProductUpdated(e) => {
                self.name = e.name.clone();
                self.price = e.price;
                self.cost = e.cost;
                self.low_stock_threshold = e.low_stock_threshold;
                self.category_id = e.category_id;
            }
            ProductEvent::ProductDeactivated(_) => {
                self.active = false;
            }
            ProductEvent::ProductReactivated(_) => {
                self.active = true;
            }
            ProductEvent::StockAdjusted(e) => {
                self.stock += e.adjustment.adjustment_quantity;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProduct(cmd) => self.handle_update(cmd),
            ProductCommand::DeactivateProduct(cmd) => self.handle_deactivate(cmd),
            ProductCommand::ReactivateProduct(cmd) => self.handle_reactivate(cmd),
            ProductCommand::AdjustStock(cmd) => self.handle_adjust_stock(cmd),
        }
    }
}

fn ensure_non_negative_money(field: &str, value: Money) -> Result<(), DomainError> {
    if value.is_negative() {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}

impl Product {
    fn ensure_exists(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        ensure_non_negative_money("price", cmd.price)?;
        ensure_non_negative_money("cost", cmd.cost)?;
        if cmd.initial_stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }
        if cmd.low_stock_threshold < 0 {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }

        // SKU uniqueness is checked by the catalog service against the read model.
        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sku: cmd.sku.trim().to_string(),
            name: cmd.name.trim().to_string(),
            price: cmd.price,
            cost: cmd.cost,
            initial_stock: cmd.initial_stock,
            low_stock_threshold: cmd.low_stock_threshold,
            category_id: cmd.category_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;

        let name = match &cmd.name {
            Some(n) if n.trim().is_empty() => {
                return Err(DomainError::validation("name cannot be empty"));
            }
            Some(n) => n.trim().to_string(),
            None => self.name.clone(),
        };
        let price = cmd.price.unwrap_or(self.price);
        let cost = cmd.cost.unwrap_or(self.cost);
        ensure_non_negative_money("price", price)?;
        ensure_non_negative_money("cost", cost)?;

        let low_stock_threshold = cmd.low_stock_threshold.unwrap_or(self.low_stock_threshold);
        if low_stock_threshold < 0 {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }
        let category_id = cmd.category_id.unwrap_or(self.category_id);

        let unchanged = name == self.name
            && price == self.price
            && cost == self.cost
            && low_stock_threshold == self.low_stock_threshold
            && category_id == self.category_id;
        if unchanged {
            return Ok(Vec::new());
        }

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            name,
            price,
            cost,
            low_stock_threshold,
            category_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;
        if !self.active {
            return Err(DomainError::conflict("product is already inactive"));
        }
        Ok(vec![ProductEvent::ProductDeactivated(ProductDeactivated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;
        if self.active {
            return Err(DomainError::conflict("product is already active"));
        }
        Ok(vec![ProductEvent::ProductReactivated(ProductReactivated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust_stock(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;

        if cmd.adjustment_type == AdjustmentType::Sale && !self.active {
            return Err(DomainError::invariant(format!(
                "product '{}' is inactive and cannot be sold",
                self.sku
            )));
        }

        let new_stock = plan_adjustment(self.stock, cmd.quantity, cmd.adjustment_type)?;

        Ok(vec![ProductEvent::StockAdjusted(StockAdjusted {
            tenant_id: cmd.tenant_id,
            adjustment: StockAdjustment {
                adjustment_id: cmd.adjustment_id,
                product_id: self.id.0,
                product_name: self.name.clone(),
                previous_stock: self.stock,
                adjustment_quantity: cmd.quantity,
                new_stock,
                adjustment_type: cmd.adjustment_type,
                supplier_id: cmd.supplier_id,
                supplier_name: cmd.supplier_name.clone(),
                user_id: cmd.user_id,
                user_name: cmd.user_name.clone(),
                transaction_id: cmd.transaction_id,
                notes: cmd.notes.clone(),
                occurred_at: cmd.occurred_at,
            },
        })])
    }
}
