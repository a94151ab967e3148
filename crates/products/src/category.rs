use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgepos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use forgepos_events::Event;

pub const CATEGORY_AGGREGATE: &str = "products.category";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub AggregateId);

impl CategoryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Category (product grouping).
///
/// Deletion is a tombstone; whether any product still points at the category
/// is a cross-aggregate question answered by the catalog service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    id: CategoryId,
    tenant_id: Option<TenantId>,
    name: String,
    description: Option<String>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Category {
    pub fn empty(id: CategoryId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            description: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Created and not deleted.
    pub fn is_live(&self) -> bool {
        self.created && !self.deleted
    }
}

impl AggregateRoot for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCategory {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameCategory {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCategory {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryCommand {
    CreateCategory(CreateCategory),
    RenameCategory(RenameCategory),
    DeleteCategory(DeleteCategory),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCreated {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRenamed {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDeleted {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryEvent {
    CategoryCreated(CategoryCreated),
    CategoryRenamed(CategoryRenamed),
    CategoryDeleted(CategoryDeleted),
}

impl Event for CategoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CategoryEvent::CategoryCreated(_) => "products.category.created",
            CategoryEvent::CategoryRenamed(_) => "products.category.renamed",
            CategoryEvent::CategoryDeleted(_) => "products.category.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CategoryEvent::CategoryCreated(e) => e.occurred_at,
            CategoryEvent::CategoryRenamed(e) => e.occurred_at,
            CategoryEvent::CategoryDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Category {
    type Command = CategoryCommand;
    type Event = CategoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CategoryEvent::CategoryCreated(e) => {
                self.id = e.category_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.created = true;
            }
            CategoryEvent::CategoryRenamed(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
            }
            CategoryEvent::CategoryDeleted(_) => {
                self.deleted = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CategoryCommand::CreateCategory(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("category already exists"));
                }
                let name = non_empty_name(&cmd.name)?;
                Ok(vec![CategoryEvent::CategoryCreated(CategoryCreated {
                    tenant_id: cmd.tenant_id,
                    category_id: cmd.category_id,
                    name,
                    description: cmd.description.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            CategoryCommand::RenameCategory(cmd) => {
                self.ensure_live(cmd.tenant_id)?;
                let name = non_empty_name(&cmd.name)?;
                Ok(vec![CategoryEvent::CategoryRenamed(CategoryRenamed {
                    tenant_id: cmd.tenant_id,
                    category_id: cmd.category_id,
                    name,
                    description: cmd.description.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            CategoryCommand::DeleteCategory(cmd) => {
                self.ensure_live(cmd.tenant_id)?;
                Ok(vec![CategoryEvent::CategoryDeleted(CategoryDeleted {
                    tenant_id: cmd.tenant_id,
                    category_id: cmd.category_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

fn non_empty_name(name: &str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("category name cannot be empty"));
    }
    Ok(trimmed.to_string())
}

impl Category {
    fn ensure_live(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.is_live() {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }
}
