//! Manual stock adjustments against the product ledger.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use forgepos_auth::{Permission, Principal, authorize};
use forgepos_core::TenantId;
use forgepos_inventory::{AdjustmentType, StockAdjustment};
use forgepos_parties::{PARTY_AGGREGATE, Party, PartyId, PartyKind};
use forgepos_products::{AdjustStock, PRODUCT_AGGREGATE, Product, ProductCommand, ProductEvent, ProductId};

use crate::backend::Dispatcher;
use crate::catalog::missing_as;
use crate::command_dispatcher::DispatchError;
use crate::monitor::{AlertLog, LowStockAlert};
use crate::projections::AdjustmentFilter;

#[derive(Debug, Clone, Deserialize)]
pub struct StockUpdate {
    pub product_id: ProductId,
    pub quantity: i64,
    pub adjustment_type: AdjustmentType,
    #[serde(default)]
    pub supplier_id: Option<PartyId>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct StockService {
    dispatcher: Arc<Dispatcher>,
    alerts: Arc<AlertLog>,
}

impl StockService {
    pub fn new(dispatcher: Arc<Dispatcher>, alerts: Arc<AlertLog>) -> Self {
        Self { dispatcher, alerts }
    }

    /// Record one manual adjustment and return its audit record.
    ///
    /// `sale` is rejected here; checkout is the only path that sells.
    #[instrument(
        skip_all,
        fields(
            tenant_id = %principal.active_tenant_id,
            product_id = %update.product_id,
            quantity = update.quantity,
            adjustment_type = update.adjustment_type.as_str(),
        ),
        err
    )]
    pub async fn update_stock(
        &self,
        principal: &Principal,
        update: StockUpdate,
    ) -> Result<StockAdjustment, DispatchError> {
        authorize(principal, &Permission::INVENTORY_WRITE)?;
        let tenant_id = principal.active_tenant_id;

        if !update.adjustment_type.is_manual() {
            return Err(DispatchError::Validation(format!(
                "'{}' adjustments are recorded by checkout only",
                update.adjustment_type
            )));
        }

        let supplier_name = match update.supplier_id {
            Some(supplier_id) => Some(self.supplier_name(tenant_id, supplier_id).await?),
            None => None,
        };

        let command = ProductCommand::AdjustStock(AdjustStock {
            tenant_id,
            product_id: update.product_id,
            adjustment_id: Uuid::now_v7(),
            quantity: update.quantity,
            adjustment_type: update.adjustment_type,
            supplier_id: update.supplier_id.map(|s| s.0),
            supplier_name,
            user_id: principal.user_id,
            user_name: principal.display_name.clone(),
            transaction_id: None,
            notes: update.notes.filter(|n| !n.trim().is_empty()),
            occurred_at: Utc::now(),
        });

        let committed = self
            .dispatcher
            .dispatch(tenant_id, update.product_id.0, PRODUCT_AGGREGATE, command, |id| {
                Product::empty(ProductId::new(id))
            })
            .await
            .map_err(|e| missing_as(e, "product", update.product_id))?;

        let adjustment = committed
            .iter()
            .find_map(|stored| match stored.decode::<ProductEvent>() {
                Ok(ProductEvent::StockAdjusted(e)) => Some(e.adjustment),
                _ => None,
            })
            .ok_or_else(|| DispatchError::Deserialize("committed adjustment missing from batch".to_string()))?;

        info!(
            previous_stock = adjustment.previous_stock,
            new_stock = adjustment.new_stock,
            "stock adjusted"
        );
        Ok(adjustment)
    }

    pub fn list_adjustments(
        &self,
        principal: &Principal,
        filter: &AdjustmentFilter,
    ) -> Result<Vec<StockAdjustment>, DispatchError> {
        authorize(principal, &Permission::INVENTORY_READ)?;
        Ok(self
            .dispatcher
            .read_models()
            .adjustments
            .list(principal.active_tenant_id, filter))
    }

    pub fn alerts(&self, principal: &Principal) -> Result<Vec<LowStockAlert>, DispatchError> {
        authorize(principal, &Permission::INVENTORY_READ)?;
        Ok(self.alerts.list(principal.active_tenant_id))
    }

    async fn supplier_name(&self, tenant_id: TenantId, supplier_id: PartyId) -> Result<String, DispatchError> {
        let supplier = self
            .dispatcher
            .load(tenant_id, supplier_id.0, PARTY_AGGREGATE, |id| Party::empty(PartyId::new(id)))
            .await
            .map_err(|e| missing_as(e, "supplier", supplier_id))?;
        supplier.aggregate.ensure_usable_as(PartyKind::Supplier)?;
        Ok(supplier.aggregate.name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::catalog::NewProduct;
    use crate::parties::{PartyInput, SuspendRequest};
    use crate::testing::{cashier, manager};
    use forgepos_auth::Principal;
    use forgepos_core::{AggregateId, Money};
    use proptest::prelude::*;

    async fn product(backend: &Backend, p: &Principal, stock: i64) -> ProductId {
        backend
            .catalog
            .create_product(
                p,
                NewProduct {
                    sku: "FLOUR-1KG".to_string(),
                    name: "Flour 1kg".to_string(),
                    price: Money::new(250),
                    cost: Money::new(120),
                    initial_stock: stock,
                    low_stock_threshold: 3,
                    category_id: None,
                },
            )
            .await
            .unwrap()
            .product_id
    }

    fn update(product_id: ProductId, quantity: i64, adjustment_type: AdjustmentType) -> StockUpdate {
        StockUpdate {
            product_id,
            quantity,
            adjustment_type,
            supplier_id: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn purchase_from_supplier_records_snapshot() {
        let backend = Backend::in_memory();
        let p = manager(TenantId::new());
        let product_id = product(&backend, &p, 4).await;
        let supplier = backend
            .parties
            .register(
                &p,
                PartyKind::Supplier,
                PartyInput {
                    name: "Mill & Co".to_string(),
                    contact: None,
                },
            )
            .await
            .unwrap();

        let mut req = update(product_id, 10, AdjustmentType::Purchase);
        req.supplier_id = Some(supplier.party_id);
        let adj = backend.stock.update_stock(&p, req).await.unwrap();

        assert_eq!(adj.previous_stock, 4);
        assert_eq!(adj.new_stock, 14);
        assert_eq!(adj.supplier_name.as_deref(), Some("Mill & Co"));
        assert_eq!(adj.user_name, p.display_name);
        assert_eq!(backend.catalog.get_product(&p, product_id).unwrap().stock, 14);

        let log = backend.stock.list_adjustments(&p, &AdjustmentFilter::default()).unwrap();
        assert_eq!(log, vec![adj]);
    }

    #[tokio::test]
    async fn sign_rules_are_enforced() {
        let backend = Backend::in_memory();
        let p = manager(TenantId::new());
        let product_id = product(&backend, &p, 4).await;

        for (qty, ty) in [
            (0, AdjustmentType::Purchase),
            (-1, AdjustmentType::Purchase),
            (0, AdjustmentType::Loss),
            (2, AdjustmentType::Loss),
            (1, AdjustmentType::Return),
        ] {
            let err = backend.stock.update_stock(&p, update(product_id, qty, ty)).await.unwrap_err();
            assert!(matches!(err, DispatchError::Validation(_)), "{ty} {qty}");
        }

        backend
            .stock
            .update_stock(&p, update(product_id, 0, AdjustmentType::Correction))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cannot_drive_stock_negative() {
        let backend = Backend::in_memory();
        let p = manager(TenantId::new());
        let product_id = product(&backend, &p, 4).await;

        let err = backend
            .stock
            .update_stock(&p, update(product_id, -5, AdjustmentType::Loss))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvariantViolation(_)));
        assert_eq!(backend.catalog.get_product(&p, product_id).unwrap().stock, 4);
    }

    #[tokio::test]
    async fn manual_sale_is_rejected() {
        let backend = Backend::in_memory();
        let p = manager(TenantId::new());
        let product_id = product(&backend, &p, 4).await;

        let err = backend
            .stock
            .update_stock(&p, update(product_id, -1, AdjustmentType::Sale))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_or_suspended_supplier_is_rejected() {
        let backend = Backend::in_memory();
        let p = manager(TenantId::new());
        let product_id = product(&backend, &p, 4).await;

        let mut req = update(product_id, 1, AdjustmentType::Purchase);
        req.supplier_id = Some(PartyId::new(AggregateId::new()));
        assert!(matches!(
            backend.stock.update_stock(&p, req).await,
            Err(DispatchError::Validation(_))
        ));

        let supplier = backend
            .parties
            .register(
                &p,
                PartyKind::Supplier,
                PartyInput {
                    name: "Mill & Co".to_string(),
                    contact: None,
                },
            )
            .await
            .unwrap();
        backend
            .parties
            .suspend(&p, PartyKind::Supplier, supplier.party_id, SuspendRequest::default())
            .await
            .unwrap();
        let mut req = update(product_id, 1, AdjustmentType::Purchase);
        req.supplier_id = Some(supplier.party_id);
        assert!(matches!(
            backend.stock.update_stock(&p, req).await,
            Err(DispatchError::InvariantViolation(_))
        ));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let backend = Backend::in_memory();
        let err = backend
            .stock
            .update_stock(
                &manager(TenantId::new()),
                update(ProductId::new(AggregateId::new()), 1, AdjustmentType::Purchase),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(_)));
    }

    #[tokio::test]
    async fn product_id_given_as_supplier_is_not_found() {
        let backend = Backend::in_memory();
        let p = manager(TenantId::new());
        let product_id = product(&backend, &p, 4).await;

        let mut req = update(product_id, 2, AdjustmentType::Purchase);
        req.supplier_id = Some(PartyId::new(product_id.0));
        match backend.stock.update_stock(&p, req).await {
            Err(DispatchError::NotFound(what)) => assert!(what.starts_with("supplier")),
            other => panic!("expected supplier not found, got {other:?}"),
        }
        assert_eq!(backend.catalog.get_product(&p, product_id).unwrap().stock, 4);
    }

    #[tokio::test]
    async fn cashier_cannot_adjust() {
        let backend = Backend::in_memory();
        let tenant_id = TenantId::new();
        let product_id = product(&backend, &manager(tenant_id), 4).await;

        let err = backend
            .stock
            .update_stock(&cashier(tenant_id), update(product_id, 1, AdjustmentType::Purchase))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Forbidden(_)));
    }

    fn adjustment_strategy() -> impl Strategy<Value = (i64, AdjustmentType)> {
        prop_oneof![
            (1i64..20).prop_map(|q| (q, AdjustmentType::Purchase)),
            (-20i64..0).prop_map(|q| (q, AdjustmentType::Loss)),
            (-20i64..0).prop_map(|q| (q, AdjustmentType::Return)),
            (-20i64..20).prop_map(|q| (q, AdjustmentType::Correction)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn ledger_stock_equals_initial_plus_accepted(
            initial in 0i64..30,
            steps in proptest::collection::vec(adjustment_strategy(), 1..12),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let backend = Backend::in_memory();
                let p = manager(TenantId::new());
                let product_id = product(&backend, &p, initial).await;

                let mut expected = initial;
                for (qty, ty) in steps {
                    match backend.stock.update_stock(&p, update(product_id, qty, ty)).await {
                        Ok(adj) => {
                            prop_assert_eq!(adj.previous_stock, expected);
                            expected += qty;
                            prop_assert_eq!(adj.new_stock, expected);
                        }
                        Err(_) => prop_assert!(expected + qty < 0),
                    }
                    prop_assert!(expected >= 0);
                }

                let loaded = backend
                    .dispatcher
                    .load(p.active_tenant_id, product_id.0, PRODUCT_AGGREGATE, |id| Product::empty(ProductId::new(id)))
                    .await
                    .unwrap();
                prop_assert_eq!(loaded.aggregate.stock(), expected);
                prop_assert_eq!(backend.catalog.get_product(&p, product_id).unwrap().stock, expected);
                Ok(())
            })?;
        }
    }
}
