use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgepos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, Money, TenantId, UserId, ValueObject};
use forgepos_events::Event;
use forgepos_products::ProductId;

use crate::cart::{Cart, CartItem};
use crate::payment::{PaymentDetails, PaymentMethod, price_checkout};

pub const TRANSACTION_AGGREGATE: &str = "sales.transaction";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub AggregateId);

impl TransactionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Snapshot of a cart line as sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLine {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub unit_cost: Money,
    pub quantity: i64,
    pub discount: Money,
    pub line_total: Money,
}

impl ValueObject for TransactionLine {}

impl TransactionLine {
    fn snapshot(item: &CartItem) -> DomainResult<Self> {
        Ok(Self {
            product_id: item.product_id,
            sku: item.sku.clone(),
            name: item.name.clone(),
            unit_price: item.unit_price,
            unit_cost: item.unit_cost,
            quantity: item.quantity,
            discount: item.discount,
            line_total: item.line_total()?,
        })
    }

    pub fn gross(&self) -> DomainResult<Money> {
        self.unit_price.checked_mul(self.quantity)
    }

    pub fn cost_of_goods(&self) -> DomainResult<Money> {
        self.unit_cost.checked_mul(self.quantity)
    }
}

/// Aggregate root: SaleTransaction.
///
/// Written exactly once; there is no command that changes a recorded sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleTransaction {
    id: TransactionId,
    record: Option<TransactionRecorded>,
    version: u64,
}

impl SaleTransaction {
    pub fn empty(id: TransactionId) -> Self {
        Self {
            id,
            record: None,
            version: 0,
        }
    }

    pub fn record(&self) -> Option<&TransactionRecorded> {
        self.record.as_ref()
    }
}

impl AggregateRoot for SaleTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransaction {
    pub tenant_id: TenantId,
    pub transaction_id: TransactionId,
    pub cart: Cart,
    pub payment: PaymentDetails,
    pub cashier_id: UserId,
    pub cashier_name: String,
    pub customer_id: Option<AggregateId>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionCommand {
    RecordTransaction(RecordTransaction),
}

/// Event: TransactionRecorded. The complete, immutable sale record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecorded {
    pub tenant_id: TenantId,
    pub transaction_id: TransactionId,
    pub lines: Vec<TransactionLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub amount_paid: Money,
    pub change: Option<Money>,
    pub cashier_id: UserId,
    pub cashier_name: String,
    pub customer_id: Option<AggregateId>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TransactionRecorded {
    pub fn items_sold(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionEvent {
    TransactionRecorded(TransactionRecorded),
}

impl Event for TransactionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransactionEvent::TransactionRecorded(_) => "sales.transaction.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransactionEvent::TransactionRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SaleTransaction {
    type Command = TransactionCommand;
    type Event = TransactionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransactionEvent::TransactionRecorded(e) => {
                self.id = e.transaction_id;
                self.record = Some(e.clone());
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransactionCommand::RecordTransaction(cmd) => {
                if self.record.is_some() {
                    return Err(DomainError::conflict("transaction already recorded"));
                }
                if cmd.cashier_name.trim().is_empty() {
                    return Err(DomainError::validation("cashier name is required"));
                }

                let totals = price_checkout(&cmd.cart, &cmd.payment)?;
                let lines = cmd
                    .cart
                    .items()
                    .iter()
                    .map(TransactionLine::snapshot)
                    .collect::<DomainResult<Vec<_>>>()?;

                Ok(vec![TransactionEvent::TransactionRecorded(TransactionRecorded {
                    tenant_id: cmd.tenant_id,
                    transaction_id: cmd.transaction_id,
                    lines,
                    subtotal: totals.subtotal,
                    discount: totals.discount,
                    total: totals.total,
                    payment_method: cmd.payment.method,
                    amount_paid: totals.amount_paid,
                    change: totals.change,
                    cashier_id: cmd.cashier_id,
                    cashier_name: cmd.cashier_name.clone(),
                    customer_id: cmd.customer_id,
                    customer_name: cmd.customer_name.clone(),
                    notes: cmd.notes.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}
