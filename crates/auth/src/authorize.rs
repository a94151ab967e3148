use thiserror::Error;

use forgepos_core::{TenantId, UserId};

use crate::{JwtClaims, Permission, Role, TenantMembership, permissions_for_roles};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub display_name: String,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

impl Principal {
    /// Resolve a principal from verified token claims using the static role policy.
    pub fn from_claims(claims: &JwtClaims) -> Self {
        let display_name = claims
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| claims.sub.to_string());

        Self {
            user_id: claims.sub,
            display_name,
            active_tenant_id: claims.tenant_id,
            membership: TenantMembership {
                tenant_id: claims.tenant_id,
                roles: claims.roles.clone(),
                permissions: permissions_for_roles(&claims.roles),
            },
        }
    }

    pub fn roles(&self) -> &[Role] {
        &self.membership.roles
    }

    pub fn can(&self, required: &Permission) -> bool {
        authorize(self, required).is_ok()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a principal within its active tenant context.
///
/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let granted = principal
        .membership
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn principal(roles: Vec<Role>) -> Principal {
        let now = Utc::now();
        Principal::from_claims(&JwtClaims {
            sub: UserId::new(),
            tenant_id: TenantId::new(),
            roles,
            name: Some("Sam".into()),
            issued_at: now,
            expires_at: now + Duration::hours(1),
        })
    }

    #[test]
    fn admin_wildcard_allows_anything() {
        let p = principal(vec![Role::ADMIN]);
        assert!(authorize(&p, &Permission::REPORTS_READ).is_ok());
        assert!(authorize(&p, &Permission::new("anything.else")).is_ok());
    }

    #[test]
    fn cashier_is_forbidden_from_manual_adjustments() {
        let p = principal(vec![Role::CASHIER]);
        assert_eq!(
            authorize(&p, &Permission::INVENTORY_WRITE),
            Err(AuthzError::Forbidden("inventory.write".to_string()))
        );
        assert!(p.can(&Permission::SALES_WRITE));
    }

    #[test]
    fn tenant_mismatch_is_rejected() {
        let mut p = principal(vec![Role::ADMIN]);
        p.active_tenant_id = TenantId::new();
        assert_eq!(
            authorize(&p, &Permission::SALES_READ),
            Err(AuthzError::TenantMismatch)
        );
    }

    #[test]
    fn display_name_falls_back_to_user_id() {
        let now = Utc::now();
        let sub = UserId::new();
        let p = Principal::from_claims(&JwtClaims {
            sub,
            tenant_id: TenantId::new(),
            roles: vec![],
            name: Some("  ".into()),
            issued_at: now,
            expires_at: now + Duration::hours(1),
        });
        assert_eq!(p.display_name, sub.to_string());
    }
}
