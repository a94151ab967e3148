use serde::{Deserialize, Serialize};

use forgepos_core::TenantId;

/// A principal's membership in a tenant: which roles it holds there and the
/// permissions those roles resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub roles: Vec<crate::Role>,
    pub permissions: Vec<crate::Permission>,
}
