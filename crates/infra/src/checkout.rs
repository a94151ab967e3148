//! Checkout: price a cart, decrement stock and record the sale atomically.
//!
//! Every product touched by the cart is loaded once and decided against in
//! cart order, so two lines for the same product see each other's decrement.
//! The resulting `StockAdjusted` events and the `TransactionRecorded` event
//! are committed as one batch; if any line fails nothing is written.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use forgepos_auth::{Permission, Principal, authorize};
use forgepos_core::{Aggregate, AggregateId, ExpectedVersion, Money, TenantId};
use forgepos_inventory::AdjustmentType;
use forgepos_parties::{PARTY_AGGREGATE, Party, PartyId, PartyKind};
use forgepos_products::{AdjustStock, PRODUCT_AGGREGATE, Product, ProductCommand, ProductEvent, ProductId};
use forgepos_sales::{
    Cart, CartItem, PaymentDetails, RecordTransaction, SaleTransaction, TRANSACTION_AGGREGATE, TransactionCommand,
    TransactionEvent, TransactionId, TransactionLine, TransactionRecorded, price_checkout,
};

use crate::backend::Dispatcher;
use crate::catalog::missing_as;
use crate::command_dispatcher::{DispatchError, Rehydrated, UnitOfWork};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub discount: Money,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutLine>,
    pub payment: PaymentDetails,
    #[serde(default)]
    pub customer_id: Option<PartyId>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A priced cart that has not been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutQuote {
    pub lines: Vec<TransactionLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub amount_paid: Money,
    pub change: Option<Money>,
}

impl From<&TransactionRecorded> for CheckoutQuote {
    fn from(tx: &TransactionRecorded) -> Self {
        Self {
            lines: tx.lines.clone(),
            subtotal: tx.subtotal,
            discount: tx.discount,
            total: tx.total,
            amount_paid: tx.amount_paid,
            change: tx.change,
        }
    }
}

/// Everything decided for one checkout, ready to commit.
struct PreparedCheckout {
    uow: UnitOfWork,
    recorded: TransactionRecorded,
}

/// A product loaded for this checkout, with the events decided against it so
/// far and the version it was loaded at.
struct StagedProduct {
    product_id: ProductId,
    loaded_version: u64,
    product: Product,
    decided: Vec<ProductEvent>,
}

#[derive(Clone)]
pub struct CheckoutService {
    dispatcher: Arc<Dispatcher>,
}

impl CheckoutService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Price the cart and run every check `complete_transaction` would,
    /// without writing anything.
    pub async fn quote(&self, principal: &Principal, request: CheckoutRequest) -> Result<CheckoutQuote, DispatchError> {
        let prepared = self.prepare(principal, request).await?;
        Ok(CheckoutQuote::from(&prepared.recorded))
    }

    #[instrument(
        skip_all,
        fields(tenant_id = %principal.active_tenant_id, cashier_id = %principal.user_id, lines = request.items.len()),
        err
    )]
    pub async fn complete_transaction(
        &self,
        principal: &Principal,
        request: CheckoutRequest,
    ) -> Result<TransactionRecorded, DispatchError> {
        let prepared = self.prepare(principal, request).await?;
        self.dispatcher.commit(prepared.uow).await?;

        let tx = prepared.recorded;
        info!(
            transaction_id = %tx.transaction_id,
            total = %tx.total,
            payment_method = tx.payment_method.as_str(),
            items = tx.items_sold(),
            "sale recorded"
        );
        Ok(tx)
    }

    async fn prepare(&self, principal: &Principal, request: CheckoutRequest) -> Result<PreparedCheckout, DispatchError> {
        authorize(principal, &Permission::SALES_WRITE)?;
        let tenant_id = principal.active_tenant_id;

        if request.items.is_empty() {
            return Err(DispatchError::Validation("cart is empty".to_string()));
        }

        let customer_name = match request.customer_id {
            Some(customer_id) => Some(self.customer_name(tenant_id, customer_id).await?),
            None => None,
        };

        let mut staged: Vec<StagedProduct> = Vec::new();
        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let idx = match staged.iter().position(|s| s.product_id == line.product_id) {
                Some(idx) => idx,
                None => {
                    staged.push(self.stage(tenant_id, line.product_id).await?);
                    staged.len() - 1
                }
            };
            let product = &staged[idx].product;
            items.push(CartItem {
                product_id: line.product_id,
                sku: product.sku().to_string(),
                name: product.name().to_string(),
                unit_price: product.price(),
                unit_cost: product.cost(),
                quantity: line.quantity,
                discount: line.discount,
            });
        }

        let cart = Cart::from_items(items);
        price_checkout(&cart, &request.payment)?;

        let transaction_id = TransactionId::new(AggregateId::new());
        let occurred_at = Utc::now();

        for item in cart.items() {
            let Some(entry) = staged.iter_mut().find(|s| s.product_id == item.product_id) else {
                return Err(DispatchError::not_found("product", item.product_id));
            };
            let command = ProductCommand::AdjustStock(AdjustStock {
                tenant_id,
                product_id: item.product_id,
                adjustment_id: Uuid::now_v7(),
                quantity: -item.quantity,
                adjustment_type: AdjustmentType::Sale,
                supplier_id: None,
                supplier_name: None,
                user_id: principal.user_id,
                user_name: principal.display_name.clone(),
                transaction_id: Some(transaction_id.0),
                notes: None,
                occurred_at,
            });
            let events = entry.product.handle(&command)?;
            for event in &events {
                entry.product.apply(event);
            }
            entry.decided.extend(events);
        }

        let record = TransactionCommand::RecordTransaction(RecordTransaction {
            tenant_id,
            transaction_id,
            cart,
            payment: request.payment,
            cashier_id: principal.user_id,
            cashier_name: principal.display_name.clone(),
            customer_id: request.customer_id.map(|c| c.0),
            customer_name,
            notes: request.notes.filter(|n| !n.trim().is_empty()),
            occurred_at,
        });
        let tx_events = SaleTransaction::empty(transaction_id).handle(&record)?;
        let recorded = tx_events
            .iter()
            .map(|TransactionEvent::TransactionRecorded(e)| e.clone())
            .next()
            .ok_or_else(|| DispatchError::Validation("transaction produced no record".to_string()))?;

        let mut uow = UnitOfWork::new(tenant_id);
        for entry in &staged {
            uow.record(
                entry.product_id.0,
                PRODUCT_AGGREGATE,
                ExpectedVersion::Exact(entry.loaded_version),
                &entry.decided,
            )?;
        }
        uow.record(
            transaction_id.0,
            TRANSACTION_AGGREGATE,
            ExpectedVersion::Exact(0),
            &tx_events,
        )?;

        Ok(PreparedCheckout { uow, recorded })
    }

    async fn stage(&self, tenant_id: TenantId, product_id: ProductId) -> Result<StagedProduct, DispatchError> {
        let Rehydrated { aggregate, version } = self
            .dispatcher
            .load(tenant_id, product_id.0, PRODUCT_AGGREGATE, |id| Product::empty(ProductId::new(id)))
            .await
            .map_err(|e| missing_as(e, "product", product_id))?;
        if !aggregate.is_created() {
            return Err(DispatchError::not_found("product", product_id));
        }
        if !aggregate.is_active() {
            return Err(DispatchError::InvariantViolation(format!(
                "product '{}' is inactive and cannot be sold",
                aggregate.sku()
            )));
        }
        Ok(StagedProduct {
            product_id,
            loaded_version: version,
            product: aggregate,
            decided: Vec::new(),
        })
    }

    async fn customer_name(&self, tenant_id: TenantId, customer_id: PartyId) -> Result<String, DispatchError> {
        let customer = self
            .dispatcher
            .load(tenant_id, customer_id.0, PARTY_AGGREGATE, |id| Party::empty(PartyId::new(id)))
            .await
            .map_err(|e| missing_as(e, "customer", customer_id))?;
        customer.aggregate.ensure_usable_as(PartyKind::Customer)?;
        Ok(customer.aggregate.name().to_string())
    }
}
