use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier (e.g. "inventory.write").
///
/// The wildcard `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const ALL: Permission = Permission::from_static("*");

    pub const PRODUCTS_READ: Permission = Permission::from_static("products.read");
    pub const PRODUCTS_WRITE: Permission = Permission::from_static("products.write");
    pub const CATEGORIES_READ: Permission = Permission::from_static("categories.read");
    pub const CATEGORIES_WRITE: Permission = Permission::from_static("categories.write");
    pub const INVENTORY_READ: Permission = Permission::from_static("inventory.read");
    pub const INVENTORY_WRITE: Permission = Permission::from_static("inventory.write");
    pub const CUSTOMERS_READ: Permission = Permission::from_static("customers.read");
    pub const SUPPLIERS_READ: Permission = Permission::from_static("suppliers.read");
    pub const PARTIES_WRITE: Permission = Permission::from_static("parties.write");
    pub const SALES_READ: Permission = Permission::from_static("sales.read");
    pub const SALES_WRITE: Permission = Permission::from_static("sales.write");
    pub const REPORTS_READ: Permission = Permission::from_static("reports.read");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
