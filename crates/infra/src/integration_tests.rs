//! End-to-end tests across services, store, read models and the monitor.
//!
//! Command → EventStore → ReadModels → EventBus → LowStockMonitor

use std::time::Duration;

use forgepos_auth::Principal;
use forgepos_core::{AggregateId, Money, TenantId};
use forgepos_inventory::AdjustmentType;
use forgepos_products::ProductId;
use forgepos_sales::{PaymentDetails, PaymentMethod};

use crate::backend::Backend;
use crate::catalog::NewProduct;
use crate::checkout::{CheckoutLine, CheckoutRequest};
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;
use crate::projections::{ReadModels, TransactionFilter};
use crate::reports::ReportQuery;
use crate::stock::StockUpdate;
use crate::testing::{cashier, manager};

async fn product(backend: &Backend, p: &Principal, sku: &str, stock: i64, threshold: i64) -> ProductId {
    backend
        .catalog
        .create_product(
            p,
            NewProduct {
                sku: sku.to_string(),
                name: format!("Item {sku}"),
                price: Money::new(1000),
                cost: Money::new(600),
                initial_stock: stock,
                low_stock_threshold: threshold,
                category_id: None,
            },
        )
        .await
        .unwrap()
        .product_id
}

fn sale(product_id: ProductId, quantity: i64) -> CheckoutRequest {
    CheckoutRequest {
        items: vec![CheckoutLine {
            product_id,
            quantity,
            discount: Money::ZERO,
        }],
        payment: PaymentDetails {
            method: PaymentMethod::Card,
            amount_paid: None,
            discount: Money::ZERO,
        },
        customer_id: None,
        notes: None,
    }
}

#[tokio::test]
async fn tenants_never_see_each_other() {
    let backend = Backend::in_memory();
    let a = manager(TenantId::new());
    let b = manager(TenantId::new());
    let product_a = product(&backend, &a, "SKU-1", 5, 1).await;

    assert!(backend.catalog.list_products(&b).unwrap().is_empty());
    assert!(matches!(
        backend.catalog.get_product(&b, product_a),
        Err(DispatchError::NotFound(_))
    ));

    let err = backend
        .stock
        .update_stock(
            &b,
            StockUpdate {
                product_id: product_a,
                quantity: 1,
                adjustment_type: AdjustmentType::Purchase,
                supplier_id: None,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound(_)));
    assert_eq!(backend.catalog.get_product(&a, product_a).unwrap().stock, 5);
}

#[tokio::test]
async fn racing_checkouts_for_the_last_unit_sell_it_once() {
    let backend = Backend::in_memory();
    let tenant_id = TenantId::new();
    let m = manager(tenant_id);
    let c = cashier(tenant_id);
    let last = product(&backend, &m, "LAST", 1, 0).await;

    let (first, second) = tokio::join!(
        backend.checkout.complete_transaction(&c, sale(last, 1)),
        backend.checkout.complete_transaction(&c, sale(last, 1)),
    );
    let succeeded = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(succeeded, 1);

    assert_eq!(backend.catalog.get_product(&m, last).unwrap().stock, 0);
    assert_eq!(
        backend.reports.transactions(&c, &TransactionFilter::default()).unwrap().len(),
        1
    );
}

#[tokio::test]
async fn read_models_rebuild_to_the_same_state() {
    let backend = Backend::in_memory();
    let tenant_id = TenantId::new();
    let m = manager(tenant_id);
    let coffee = product(&backend, &m, "COF", 10, 2).await;
    let tea = product(&backend, &m, "TEA", 4, 2).await;

    backend
        .checkout
        .complete_transaction(&cashier(tenant_id), sale(coffee, 3))
        .await
        .unwrap();
    backend
        .stock
        .update_stock(
            &m,
            StockUpdate {
                product_id: tea,
                quantity: -1,
                adjustment_type: AdjustmentType::Loss,
                supplier_id: None,
                notes: Some("dropped".to_string()),
            },
        )
        .await
        .unwrap();

    let history = backend.dispatcher.store().load_all().await.unwrap();
    let rebuilt = ReadModels::new();
    assert_eq!(rebuilt.rebuild(&history).unwrap(), history.len());

    let live = backend.dispatcher.read_models();
    assert_eq!(rebuilt.products.list(tenant_id), live.products.list(tenant_id));
    assert_eq!(
        rebuilt.transactions.list(tenant_id, &TransactionFilter::default()),
        live.transactions.list(tenant_id, &TransactionFilter::default())
    );

    // Applying the same history again is a no-op.
    for stored in &history {
        rebuilt.apply(&stored.to_envelope()).unwrap();
    }
    assert_eq!(rebuilt.products.get(tenant_id, &coffee).unwrap().stock, 7);
}

#[tokio::test]
async fn sale_below_threshold_raises_an_alert() {
    let backend = Backend::in_memory();
    assert!(backend.monitor_running());
    let tenant_id = TenantId::new();
    let m = manager(tenant_id);
    let milk = product(&backend, &m, "MILK", 5, 3).await;

    backend
        .checkout
        .complete_transaction(&cashier(tenant_id), sale(milk, 3))
        .await
        .unwrap();

    let mut alerts = Vec::new();
    for _ in 0..50 {
        alerts = backend.stock.alerts(&m).unwrap();
        if !alerts.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].product_id, milk);
    assert_eq!(alerts[0].stock, 2);
    assert_eq!(alerts[0].adjustment_type, AdjustmentType::Sale);

    let other_tenant = manager(TenantId::new());
    assert!(backend.stock.alerts(&other_tenant).unwrap().is_empty());
}

#[tokio::test]
async fn reports_reflect_checkouts() {
    let backend = Backend::in_memory();
    let tenant_id = TenantId::new();
    let m = manager(tenant_id);
    let coffee = product(&backend, &m, "COF", 10, 8).await;

    backend
        .checkout
        .complete_transaction(&cashier(tenant_id), sale(coffee, 3))
        .await
        .unwrap();

    let summary = backend.reports.sales_summary(&m, &ReportQuery::default()).unwrap();
    assert_eq!(summary.transaction_count, 1);
    assert_eq!(summary.net_revenue, Money::new(3000));
    assert_eq!(summary.cost_of_goods, Money::new(1800));

    let movements = backend.reports.stock_movements(&m, &ReportQuery::default()).unwrap();
    let sold = movements
        .iter()
        .find(|mv| mv.adjustment_type == AdjustmentType::Sale)
        .unwrap();
    assert_eq!((sold.net_quantity, sold.events), (-3, 1));

    let low = backend.reports.low_stock(&m).unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].product_id, coffee);

    assert!(matches!(
        backend.reports.sales_summary(&cashier(tenant_id), &ReportQuery::default()),
        Err(DispatchError::Forbidden(_))
    ));
}

#[tokio::test]
async fn unknown_product_in_cart_is_not_found() {
    let backend = Backend::in_memory();
    let err = backend
        .checkout
        .complete_transaction(&cashier(TenantId::new()), sale(ProductId::new(AggregateId::new()), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound(_)));
}
