//! Principals for service tests.

use chrono::{Duration, Utc};

use forgepos_auth::{JwtClaims, Principal, Role};
use forgepos_core::{TenantId, UserId};

pub(crate) fn principal(tenant_id: TenantId, roles: &[Role]) -> Principal {
    let now = Utc::now();
    Principal::from_claims(&JwtClaims {
        sub: UserId::new(),
        tenant_id,
        roles: roles.to_vec(),
        name: Some("Sam Till".to_string()),
        issued_at: now,
        expires_at: now + Duration::hours(1),
    })
}

pub(crate) fn manager(tenant_id: TenantId) -> Principal {
    principal(tenant_id, &[Role::MANAGER])
}

pub(crate) fn cashier(tenant_id: TenantId) -> Principal {
    principal(tenant_id, &[Role::CASHIER])
}
