//! Sales and inventory reports over the read models.
//!
//! The aggregation functions are pure and take already-loaded records; the
//! [`ReportService`] only authorizes and fetches. Every range is half-open:
//! a record at exactly `to` is excluded.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use forgepos_auth::{Permission, Principal, authorize};
use forgepos_core::{DomainResult, Money};
use forgepos_inventory::{AdjustmentType, StockAdjustment};
use forgepos_products::ProductId;
use forgepos_sales::{PaymentMethod, TransactionId, TransactionRecorded};

use crate::backend::Dispatcher;
use crate::command_dispatcher::DispatchError;
use crate::projections::{AdjustmentFilter, ProductReadModel, TransactionFilter};

const DEFAULT_WINDOW_DAYS: i64 = 30;
const DEFAULT_TOP_LIMIT: usize = 10;

/// Report query parameters as they arrive from the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReportRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, DispatchError> {
        if from >= to {
            return Err(DispatchError::Validation(format!(
                "report range is empty: from {from} is not before to {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// Fill missing bounds: `to` defaults to `now`, `from` to thirty days
    /// before `to`.
    pub fn resolve(query: &ReportQuery, now: DateTime<Utc>) -> Result<Self, DispatchError> {
        let to = query.to.unwrap_or(now);
        let from = query.from.unwrap_or(to - Duration::days(DEFAULT_WINDOW_DAYS));
        Self::new(from, to)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at < self.to
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentBreakdown {
    pub method: PaymentMethod,
    pub transactions: usize,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesSummary {
    pub range: ReportRange,
    pub transaction_count: usize,
    pub items_sold: i64,
    /// Σ unit price × quantity, before any discount.
    pub gross_sales: Money,
    pub line_discounts: Money,
    pub cart_discounts: Money,
    pub total_discounts: Money,
    pub net_revenue: Money,
    /// From the unit costs snapshotted at sale time.
    pub cost_of_goods: Money,
    pub gross_profit: Money,
    /// Net revenue per transaction, truncated to the minor unit.
    pub average_ticket: Money,
    pub by_payment_method: Vec<PaymentBreakdown>,
}

pub fn sales_summary(transactions: &[TransactionRecorded], range: ReportRange) -> DomainResult<SalesSummary> {
    let mut count = 0usize;
    let mut items_sold = 0i64;
    let mut gross_sales = Money::ZERO;
    let mut line_discounts = Money::ZERO;
    let mut cart_discounts = Money::ZERO;
    let mut net_revenue = Money::ZERO;
    let mut cost_of_goods = Money::ZERO;
    let mut methods: BTreeMap<PaymentMethod, (usize, Money)> = BTreeMap::new();

    for tx in transactions.iter().filter(|tx| range.contains(tx.occurred_at)) {
        count += 1;
        items_sold += tx.items_sold();
        for line in &tx.lines {
            gross_sales = gross_sales.checked_add(line.gross()?)?;
            line_discounts = line_discounts.checked_add(line.discount)?;
            cost_of_goods = cost_of_goods.checked_add(line.cost_of_goods()?)?;
        }
        cart_discounts = cart_discounts.checked_add(tx.discount)?;
        net_revenue = net_revenue.checked_add(tx.total)?;

        let entry = methods.entry(tx.payment_method).or_insert((0, Money::ZERO));
        entry.0 += 1;
        entry.1 = entry.1.checked_add(tx.total)?;
    }

    let average_ticket = match i64::try_from(count) {
        Ok(n) if n > 0 => Money::new(net_revenue.minor_units() / n),
        _ => Money::ZERO,
    };

    Ok(SalesSummary {
        range,
        transaction_count: count,
        items_sold,
        gross_sales,
        line_discounts,
        cart_discounts,
        total_discounts: line_discounts.checked_add(cart_discounts)?,
        net_revenue,
        cost_of_goods,
        gross_profit: net_revenue.checked_sub(cost_of_goods)?,
        average_ticket,
        by_payment_method: methods
            .into_iter()
            .map(|(method, (transactions, total))| PaymentBreakdown {
                method,
                transactions,
                total,
            })
            .collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSales {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub units: i64,
    /// Σ line totals (after line discounts, before the cart discount).
    pub revenue: Money,
}

/// Best sellers by revenue, ties broken by units then SKU.
pub fn top_products(
    transactions: &[TransactionRecorded],
    range: ReportRange,
    limit: usize,
) -> DomainResult<Vec<ProductSales>> {
    let mut by_product: HashMap<ProductId, ProductSales> = HashMap::new();
    for tx in transactions.iter().filter(|tx| range.contains(tx.occurred_at)) {
        for line in &tx.lines {
            let entry = by_product.entry(line.product_id).or_insert_with(|| ProductSales {
                product_id: line.product_id,
                sku: line.sku.clone(),
                name: line.name.clone(),
                units: 0,
                revenue: Money::ZERO,
            });
            entry.units += line.quantity;
            entry.revenue = entry.revenue.checked_add(line.line_total)?;
        }
    }

    let mut ranked: Vec<_> = by_product.into_values().collect();
    ranked.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| b.units.cmp(&a.units))
            .then_with(|| a.sku.cmp(&b.sku))
    });
    ranked.truncate(limit);
    Ok(ranked)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub transactions: usize,
    pub revenue: Money,
}

/// Revenue per UTC calendar day, oldest first. Days without sales are omitted.
pub fn daily_sales(transactions: &[TransactionRecorded], range: ReportRange) -> DomainResult<Vec<DailySales>> {
    let mut days: BTreeMap<NaiveDate, (usize, Money)> = BTreeMap::new();
    for tx in transactions.iter().filter(|tx| range.contains(tx.occurred_at)) {
        let day = days.entry(tx.occurred_at.date_naive()).or_insert((0, Money::ZERO));
        day.0 += 1;
        day.1 = day.1.checked_add(tx.total)?;
    }
    Ok(days
        .into_iter()
        .map(|(date, (transactions, revenue))| DailySales {
            date,
            transactions,
            revenue,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockMovement {
    pub adjustment_type: AdjustmentType,
    pub net_quantity: i64,
    pub events: usize,
}

/// Net quantity and count per adjustment type. Every type is listed, zeros
/// included.
pub fn stock_movements(adjustments: &[StockAdjustment], range: ReportRange) -> Vec<StockMovement> {
    AdjustmentType::ALL
        .iter()
        .map(|&adjustment_type| {
            let (net_quantity, events) = adjustments
                .iter()
                .filter(|a| a.adjustment_type == adjustment_type && range.contains(a.occurred_at))
                .fold((0i64, 0usize), |(qty, n), a| (qty + a.adjustment_quantity, n + 1));
            StockMovement {
                adjustment_type,
                net_quantity,
                events,
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct ReportService {
    dispatcher: Arc<Dispatcher>,
}

impl ReportService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn sales_summary(&self, principal: &Principal, query: &ReportQuery) -> Result<SalesSummary, DispatchError> {
        let (range, txs) = self.transactions_in(principal, query)?;
        Ok(sales_summary(&txs, range)?)
    }

    pub fn top_products(&self, principal: &Principal, query: &ReportQuery) -> Result<Vec<ProductSales>, DispatchError> {
        let (range, txs) = self.transactions_in(principal, query)?;
        Ok(top_products(&txs, range, query.limit.unwrap_or(DEFAULT_TOP_LIMIT))?)
    }

    pub fn daily_sales(&self, principal: &Principal, query: &ReportQuery) -> Result<Vec<DailySales>, DispatchError> {
        let (range, txs) = self.transactions_in(principal, query)?;
        Ok(daily_sales(&txs, range)?)
    }

    pub fn stock_movements(
        &self,
        principal: &Principal,
        query: &ReportQuery,
    ) -> Result<Vec<StockMovement>, DispatchError> {
        authorize(principal, &Permission::REPORTS_READ)?;
        let range = ReportRange::resolve(query, Utc::now())?;
        let filter = AdjustmentFilter {
            from: Some(range.from),
            to: Some(range.to),
            ..AdjustmentFilter::default()
        };
        let adjustments = self
            .dispatcher
            .read_models()
            .adjustments
            .list(principal.active_tenant_id, &filter);
        Ok(stock_movements(&adjustments, range))
    }

    pub fn low_stock(&self, principal: &Principal) -> Result<Vec<ProductReadModel>, DispatchError> {
        authorize(principal, &Permission::REPORTS_READ)?;
        Ok(self.dispatcher.read_models().products.low_stock(principal.active_tenant_id))
    }

    /// Sale history, newest first.
    pub fn transactions(
        &self,
        principal: &Principal,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecorded>, DispatchError> {
        authorize(principal, &Permission::SALES_READ)?;
        Ok(self
            .dispatcher
            .read_models()
            .transactions
            .list(principal.active_tenant_id, filter))
    }

    pub fn get_transaction(
        &self,
        principal: &Principal,
        transaction_id: TransactionId,
    ) -> Result<TransactionRecorded, DispatchError> {
        authorize(principal, &Permission::SALES_READ)?;
        self.dispatcher
            .read_models()
            .transactions
            .get(principal.active_tenant_id, &transaction_id)
            .ok_or_else(|| DispatchError::not_found("transaction", transaction_id))
    }

    fn transactions_in(
        &self,
        principal: &Principal,
        query: &ReportQuery,
    ) -> Result<(ReportRange, Vec<TransactionRecorded>), DispatchError> {
        authorize(principal, &Permission::REPORTS_READ)?;
        let range = ReportRange::resolve(query, Utc::now())?;
        let txs = self
            .dispatcher
            .read_models()
            .transactions
            .list(principal.active_tenant_id, &TransactionFilter::between(Some(range.from), Some(range.to)));
        Ok((range, txs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use forgepos_core::{AggregateId, TenantId, UserId};
    use forgepos_sales::TransactionLine;
    use uuid::Uuid;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    fn line(product_id: ProductId, sku: &str, price: i64, cost: i64, qty: i64, discount: i64) -> TransactionLine {
        TransactionLine {
            product_id,
            sku: sku.to_string(),
            name: sku.to_string(),
            unit_price: Money::new(price),
            unit_cost: Money::new(cost),
            quantity: qty,
            discount: Money::new(discount),
            line_total: Money::new(price * qty - discount),
        }
    }

    fn tx(occurred_at: DateTime<Utc>, lines: Vec<TransactionLine>, cart_discount: i64, method: PaymentMethod) -> TransactionRecorded {
        let subtotal: i64 = lines.iter().map(|l| l.line_total.minor_units()).sum();
        TransactionRecorded {
            tenant_id: TenantId::new(),
            transaction_id: TransactionId::new(AggregateId::new()),
            lines,
            subtotal: Money::new(subtotal),
            discount: Money::new(cart_discount),
            total: Money::new(subtotal - cart_discount),
            payment_method: method,
            amount_paid: Money::new(subtotal - cart_discount),
            change: None,
            cashier_id: UserId::new(),
            cashier_name: "Sam".to_string(),
            customer_id: None,
            customer_name: None,
            notes: None,
            occurred_at,
        }
    }

    fn adjustment(occurred_at: DateTime<Utc>, quantity: i64, adjustment_type: AdjustmentType) -> StockAdjustment {
        StockAdjustment {
            adjustment_id: Uuid::now_v7(),
            product_id: AggregateId::new(),
            product_name: "Flour".to_string(),
            previous_stock: 100,
            adjustment_quantity: quantity,
            new_stock: 100 + quantity,
            adjustment_type,
            supplier_id: None,
            supplier_name: None,
            user_id: UserId::new(),
            user_name: "Sam".to_string(),
            transaction_id: None,
            notes: None,
            occurred_at,
        }
    }

    #[test]
    fn range_is_half_open() {
        let range = ReportRange::new(at(1, 0), at(2, 0)).unwrap();
        assert!(range.contains(at(1, 0)));
        assert!(range.contains(at(1, 23)));
        assert!(!range.contains(at(2, 0)));
        assert!(ReportRange::new(at(2, 0), at(2, 0)).is_err());
    }

    #[test]
    fn summary_totals_discounts_and_profit() {
        let coffee = ProductId::new(AggregateId::new());
        let tea = ProductId::new(AggregateId::new());
        let txs = vec![
            tx(at(1, 9), vec![line(coffee, "COF", 3500, 2000, 2, 500)], 0, PaymentMethod::Cash),
            tx(at(1, 10), vec![line(tea, "TEA", 1000, 400, 1, 0)], 100, PaymentMethod::Card),
            tx(at(5, 10), vec![line(tea, "TEA", 1000, 400, 9, 0)], 0, PaymentMethod::Card),
        ];
        let range = ReportRange::new(at(1, 0), at(2, 0)).unwrap();

        let s = sales_summary(&txs, range).unwrap();
        assert_eq!(s.transaction_count, 2);
        assert_eq!(s.items_sold, 3);
        assert_eq!(s.gross_sales, Money::new(8000));
        assert_eq!(s.line_discounts, Money::new(500));
        assert_eq!(s.cart_discounts, Money::new(100));
        assert_eq!(s.total_discounts, Money::new(600));
        assert_eq!(s.net_revenue, Money::new(7400));
        assert_eq!(s.cost_of_goods, Money::new(4400));
        assert_eq!(s.gross_profit, Money::new(3000));
        assert_eq!(s.average_ticket, Money::new(3700));
        assert_eq!(
            s.by_payment_method,
            vec![
                PaymentBreakdown {
                    method: PaymentMethod::Cash,
                    transactions: 1,
                    total: Money::new(6500),
                },
                PaymentBreakdown {
                    method: PaymentMethod::Card,
                    transactions: 1,
                    total: Money::new(900),
                },
            ]
        );
    }

    #[test]
    fn empty_summary_has_zero_average() {
        let range = ReportRange::new(at(1, 0), at(2, 0)).unwrap();
        let s = sales_summary(&[], range).unwrap();
        assert_eq!(s.transaction_count, 0);
        assert_eq!(s.average_ticket, Money::ZERO);
        assert!(s.by_payment_method.is_empty());
    }

    #[test]
    fn top_products_rank_by_revenue_and_respect_limit() {
        let coffee = ProductId::new(AggregateId::new());
        let tea = ProductId::new(AggregateId::new());
        let cake = ProductId::new(AggregateId::new());
        let txs = vec![
            tx(
                at(1, 9),
                vec![line(coffee, "COF", 3500, 2000, 1, 0), line(tea, "TEA", 1000, 400, 5, 0)],
                0,
                PaymentMethod::Cash,
            ),
            tx(at(1, 11), vec![line(coffee, "COF", 3500, 2000, 1, 0)], 0, PaymentMethod::Cash),
            tx(at(1, 12), vec![line(cake, "CAKE", 200, 50, 1, 0)], 0, PaymentMethod::Cash),
        ];
        let range = ReportRange::new(at(1, 0), at(2, 0)).unwrap();

        let top = top_products(&txs, range, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].sku, "COF");
        assert_eq!(top[0].units, 2);
        assert_eq!(top[0].revenue, Money::new(7000));
        assert_eq!(top[1].sku, "TEA");
    }

    #[test]
    fn daily_sales_bucket_by_utc_day() {
        let p = ProductId::new(AggregateId::new());
        let txs = vec![
            tx(at(2, 23), vec![line(p, "P", 100, 10, 1, 0)], 0, PaymentMethod::Cash),
            tx(at(1, 0), vec![line(p, "P", 100, 10, 2, 0)], 0, PaymentMethod::Cash),
            tx(at(1, 8), vec![line(p, "P", 100, 10, 1, 0)], 0, PaymentMethod::Cash),
        ];
        let range = ReportRange::new(at(1, 0), at(3, 0)).unwrap();

        let days = daily_sales(&txs, range).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, at(1, 0).date_naive());
        assert_eq!(days[0].transactions, 2);
        assert_eq!(days[0].revenue, Money::new(300));
        assert_eq!(days[1].revenue, Money::new(100));
    }

    #[test]
    fn stock_movements_cover_every_type() {
        let adjustments = vec![
            adjustment(at(1, 9), 10, AdjustmentType::Purchase),
            adjustment(at(1, 10), 5, AdjustmentType::Purchase),
            adjustment(at(1, 11), -2, AdjustmentType::Sale),
            adjustment(at(3, 11), -7, AdjustmentType::Loss),
        ];
        let range = ReportRange::new(at(1, 0), at(2, 0)).unwrap();

        let moves = stock_movements(&adjustments, range);
        assert_eq!(moves.len(), AdjustmentType::ALL.len());
        let purchase = moves.iter().find(|m| m.adjustment_type == AdjustmentType::Purchase).unwrap();
        assert_eq!((purchase.net_quantity, purchase.events), (15, 2));
        let loss = moves.iter().find(|m| m.adjustment_type == AdjustmentType::Loss).unwrap();
        assert_eq!((loss.net_quantity, loss.events), (0, 0));
    }
}
