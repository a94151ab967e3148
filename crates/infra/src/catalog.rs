//! Product and category management.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::instrument;

use forgepos_auth::{Permission, Principal, authorize};
use forgepos_core::{AggregateId, Money, TenantId};
use forgepos_products::{
    CATEGORY_AGGREGATE, Category, CategoryCommand, CategoryId, CreateCategory, CreateProduct, DeactivateProduct,
    DeleteCategory, PRODUCT_AGGREGATE, Product, ProductCommand, ProductId, ReactivateProduct, RenameCategory,
    UpdateProduct,
};

use crate::backend::Dispatcher;
use crate::command_dispatcher::DispatchError;
use crate::projections::{CategoryReadModel, ProductReadModel};

fn default_threshold() -> i64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price: Money,
    pub cost: Money,
    #[serde(default)]
    pub initial_stock: i64,
    #[serde(default = "default_threshold")]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

/// Partial product update. `category_id: Some(None)` clears the category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub cost: Option<Money>,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<CategoryId>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<CategoryId>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<CategoryId>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One async lock per tenant around catalog-wide checks (SKU uniqueness,
/// category references) and the commit that depends on them.
#[derive(Debug, Default)]
struct TenantLocks {
    inner: Mutex<HashMap<TenantId, Arc<AsyncMutex<()>>>>,
}

impl TenantLocks {
    async fn acquire(&self, tenant_id: TenantId) -> OwnedMutexGuard<()> {
        let lock = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(tenant_id)
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}

#[derive(Clone)]
pub struct CatalogService {
    dispatcher: Arc<Dispatcher>,
    locks: Arc<TenantLocks>,
}

impl CatalogService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            locks: Arc::new(TenantLocks::default()),
        }
    }

    #[instrument(skip_all, fields(tenant_id = %principal.active_tenant_id, sku = %input.sku), err)]
    pub async fn create_product(
        &self,
        principal: &Principal,
        input: NewProduct,
    ) -> Result<ProductReadModel, DispatchError> {
        authorize(principal, &Permission::PRODUCTS_WRITE)?;
        let tenant_id = principal.active_tenant_id;
        let _catalog = self.locks.acquire(tenant_id).await;

        if self
            .dispatcher
            .read_models()
            .products
            .find_by_sku(tenant_id, &input.sku)
            .is_some()
        {
            return Err(DispatchError::Conflict(format!(
                "a product with SKU '{}' already exists",
                input.sku.trim()
            )));
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category(tenant_id, category_id).await?;
        }

        let product_id = ProductId::new(AggregateId::new());
        let command = ProductCommand::CreateProduct(CreateProduct {
            tenant_id,
            product_id,
            sku: input.sku,
            name: input.name,
            price: input.price,
            cost: input.cost,
            initial_stock: input.initial_stock,
            low_stock_threshold: input.low_stock_threshold,
            category_id: input.category_id,
            occurred_at: Utc::now(),
        });
        self.dispatch_product(tenant_id, product_id, command).await?;
        self.product_view(tenant_id, product_id)
    }

    #[instrument(skip_all, fields(tenant_id = %principal.active_tenant_id, product_id = %product_id), err)]
    pub async fn update_product(
        &self,
        principal: &Principal,
        product_id: ProductId,
        changes: ProductChanges,
    ) -> Result<ProductReadModel, DispatchError> {
        authorize(principal, &Permission::PRODUCTS_WRITE)?;
        let tenant_id = principal.active_tenant_id;
        let _catalog = self.locks.acquire(tenant_id).await;

        if let Some(Some(category_id)) = changes.category_id {
            self.ensure_category(tenant_id, category_id).await?;
        }

        let command = ProductCommand::UpdateProduct(UpdateProduct {
            tenant_id,
            product_id,
            name: changes.name,
            price: changes.price,
            cost: changes.cost,
            low_stock_threshold: changes.low_stock_threshold,
            category_id: changes.category_id,
            occurred_at: Utc::now(),
        });
        self.dispatch_product(tenant_id, product_id, command).await?;
        self.product_view(tenant_id, product_id)
    }

    pub async fn deactivate_product(
        &self,
        principal: &Principal,
        product_id: ProductId,
    ) -> Result<ProductReadModel, DispatchError> {
        authorize(principal, &Permission::PRODUCTS_WRITE)?;
        let tenant_id = principal.active_tenant_id;
        let command = ProductCommand::DeactivateProduct(DeactivateProduct {
            tenant_id,
            product_id,
            occurred_at: Utc::now(),
        });
        self.dispatch_product(tenant_id, product_id, command).await?;
        self.product_view(tenant_id, product_id)
    }

    pub async fn reactivate_product(
        &self,
        principal: &Principal,
        product_id: ProductId,
    ) -> Result<ProductReadModel, DispatchError> {
        authorize(principal, &Permission::PRODUCTS_WRITE)?;
        let tenant_id = principal.active_tenant_id;
        let command = ProductCommand::ReactivateProduct(ReactivateProduct {
            tenant_id,
            product_id,
            occurred_at: Utc::now(),
        });
        self.dispatch_product(tenant_id, product_id, command).await?;
        self.product_view(tenant_id, product_id)
    }

    pub fn get_product(&self, principal: &Principal, product_id: ProductId) -> Result<ProductReadModel, DispatchError> {
        authorize(principal, &Permission::PRODUCTS_READ)?;
        self.product_view(principal.active_tenant_id, product_id)
    }

    pub fn list_products(&self, principal: &Principal) -> Result<Vec<ProductReadModel>, DispatchError> {
        authorize(principal, &Permission::PRODUCTS_READ)?;
        Ok(self.dispatcher.read_models().products.list(principal.active_tenant_id))
    }

    #[instrument(skip_all, fields(tenant_id = %principal.active_tenant_id), err)]
    pub async fn create_category(
        &self,
        principal: &Principal,
        input: CategoryInput,
    ) -> Result<CategoryReadModel, DispatchError> {
        authorize(principal, &Permission::CATEGORIES_WRITE)?;
        let tenant_id = principal.active_tenant_id;
        let category_id = CategoryId::new(AggregateId::new());
        let command = CategoryCommand::CreateCategory(CreateCategory {
            tenant_id,
            category_id,
            name: input.name,
            description: input.description,
            occurred_at: Utc::now(),
        });
        self.dispatch_category(tenant_id, category_id, command).await?;
        self.category_view(tenant_id, category_id)
    }

    pub async fn rename_category(
        &self,
        principal: &Principal,
        category_id: CategoryId,
        input: CategoryInput,
    ) -> Result<CategoryReadModel, DispatchError> {
        authorize(principal, &Permission::CATEGORIES_WRITE)?;
        let tenant_id = principal.active_tenant_id;
        let command = CategoryCommand::RenameCategory(RenameCategory {
            tenant_id,
            category_id,
            name: input.name,
            description: input.description,
            occurred_at: Utc::now(),
        });
        self.dispatch_category(tenant_id, category_id, command).await?;
        self.category_view(tenant_id, category_id)
    }

    /// Delete a category no product references.
    #[instrument(skip_all, fields(tenant_id = %principal.active_tenant_id, category_id = %category_id), err)]
    pub async fn delete_category(&self, principal: &Principal, category_id: CategoryId) -> Result<(), DispatchError> {
        authorize(principal, &Permission::CATEGORIES_WRITE)?;
        let tenant_id = principal.active_tenant_id;
        let _catalog = self.locks.acquire(tenant_id).await;

        let in_use = self
            .dispatcher
            .read_models()
            .products
            .count_in_category(tenant_id, category_id);
        if in_use > 0 {
            return Err(DispatchError::Conflict(format!(
                "category is in use by {in_use} product(s)"
            )));
        }

        let command = CategoryCommand::DeleteCategory(DeleteCategory {
            tenant_id,
            category_id,
            occurred_at: Utc::now(),
        });
        self.dispatch_category(tenant_id, category_id, command).await?;
        Ok(())
    }

    pub fn get_category(
        &self,
        principal: &Principal,
        category_id: CategoryId,
    ) -> Result<CategoryReadModel, DispatchError> {
        authorize(principal, &Permission::CATEGORIES_READ)?;
        self.category_view(principal.active_tenant_id, category_id)
    }

    pub fn list_categories(&self, principal: &Principal) -> Result<Vec<CategoryReadModel>, DispatchError> {
        authorize(principal, &Permission::CATEGORIES_READ)?;
        Ok(self.dispatcher.read_models().categories.list(principal.active_tenant_id))
    }

    async fn ensure_category(&self, tenant_id: TenantId, category_id: CategoryId) -> Result<(), DispatchError> {
        let loaded = self
            .dispatcher
            .load(tenant_id, category_id.0, CATEGORY_AGGREGATE, |id| Category::empty(CategoryId::new(id)));
        let missing = || DispatchError::Validation(format!("category {category_id} does not exist"));
        match loaded.await {
            Ok(loaded) if loaded.aggregate.is_live() => Ok(()),
            Ok(_) | Err(DispatchError::NotFound(_)) => Err(missing()),
            Err(e) => Err(e),
        }
    }

    async fn dispatch_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        command: ProductCommand,
    ) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, product_id.0, PRODUCT_AGGREGATE, command, |id| {
                Product::empty(ProductId::new(id))
            })
            .await
            .map_err(|e| missing_as(e, "product", product_id))?;
        Ok(())
    }

    async fn dispatch_category(
        &self,
        tenant_id: TenantId,
        category_id: CategoryId,
        command: CategoryCommand,
    ) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, category_id.0, CATEGORY_AGGREGATE, command, |id| {
                Category::empty(CategoryId::new(id))
            })
            .await
            .map_err(|e| missing_as(e, "category", category_id))?;
        Ok(())
    }

    fn product_view(&self, tenant_id: TenantId, product_id: ProductId) -> Result<ProductReadModel, DispatchError> {
        self.dispatcher
            .read_models()
            .products
            .get(tenant_id, &product_id)
            .ok_or_else(|| DispatchError::not_found("product", product_id))
    }

    fn category_view(&self, tenant_id: TenantId, category_id: CategoryId) -> Result<CategoryReadModel, DispatchError> {
        self.dispatcher
            .read_models()
            .categories
            .get(tenant_id, &category_id)
            .ok_or_else(|| DispatchError::not_found("category", category_id))
    }
}

/// Name the record in a generic domain not-found.
pub(crate) fn missing_as(err: DispatchError, kind: &str, id: impl core::fmt::Display) -> DispatchError {
    match err {
        DispatchError::NotFound(_) => DispatchError::not_found(kind, id),
        other => other,
    }
}
