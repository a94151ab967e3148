//! Static role → permission policy.

use crate::{Permission, Role};

const MANAGER_PERMISSIONS: &[Permission] = &[
    Permission::PRODUCTS_READ,
    Permission::PRODUCTS_WRITE,
    Permission::CATEGORIES_READ,
    Permission::CATEGORIES_WRITE,
    Permission::INVENTORY_READ,
    Permission::INVENTORY_WRITE,
    Permission::CUSTOMERS_READ,
    Permission::SUPPLIERS_READ,
    Permission::PARTIES_WRITE,
    Permission::SALES_READ,
    Permission::SALES_WRITE,
    Permission::REPORTS_READ,
];

const CASHIER_PERMISSIONS: &[Permission] = &[
    Permission::PRODUCTS_READ,
    Permission::CATEGORIES_READ,
    Permission::CUSTOMERS_READ,
    Permission::SALES_READ,
    Permission::SALES_WRITE,
];

/// Resolve the effective permission set for a list of roles.
///
/// `admin` short-circuits to the wildcard. Duplicates are removed; order
/// follows first grant.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.contains(&Role::ADMIN) {
        return vec![Permission::ALL];
    }

    let mut out: Vec<Permission> = Vec::new();
    for role in roles {
        let granted: &[Permission] = if *role == Role::MANAGER {
            MANAGER_PERMISSIONS
        } else if *role == Role::CASHIER {
            CASHIER_PERMISSIONS
        } else {
            &[]
        };
        for p in granted {
            if !out.contains(p) {
                out.push(p.clone());
            }
        }
    }
    out
}
