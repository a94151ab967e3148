use forgepos_auth::Principal;
use forgepos_core::{TenantId, UserId};

/// Authenticated caller for a request, inserted by the auth middleware.
///
/// The tenant always comes from the verified token, never from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    principal: Principal,
}

impl RequestContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn tenant_id(&self) -> TenantId {
        self.principal.active_tenant_id
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }
}
