//! Supplier and customer registry.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use forgepos_auth::{Permission, Principal, authorize};
use forgepos_core::{AggregateId, TenantId};
use forgepos_parties::{
    ContactInfo, PARTY_AGGREGATE, Party, PartyCommand, PartyId, PartyKind, ReactivateParty, RegisterParty,
    SuspendParty, UpdateDetails,
};

use crate::backend::Dispatcher;
use crate::catalog::missing_as;
use crate::command_dispatcher::DispatchError;
use crate::projections::PartyReadModel;

#[derive(Debug, Clone, Deserialize)]
pub struct PartyInput {
    pub name: String,
    #[serde(default)]
    pub contact: Option<ContactInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartyChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contact: Option<ContactInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuspendRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Clone)]
pub struct PartyService {
    dispatcher: Arc<Dispatcher>,
}

impl PartyService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    #[instrument(skip_all, fields(tenant_id = %principal.active_tenant_id, kind = kind.as_str()), err)]
    pub async fn register(
        &self,
        principal: &Principal,
        kind: PartyKind,
        input: PartyInput,
    ) -> Result<PartyReadModel, DispatchError> {
        authorize(principal, &Permission::PARTIES_WRITE)?;
        let tenant_id = principal.active_tenant_id;
        let party_id = PartyId::new(AggregateId::new());
        let command = PartyCommand::RegisterParty(RegisterParty {
            tenant_id,
            party_id,
            kind,
            name: input.name,
            contact: input.contact,
            occurred_at: Utc::now(),
        });
        self.dispatch(tenant_id, party_id, command).await?;
        self.view(tenant_id, kind, party_id)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        kind: PartyKind,
        party_id: PartyId,
        changes: PartyChanges,
    ) -> Result<PartyReadModel, DispatchError> {
        authorize(principal, &Permission::PARTIES_WRITE)?;
        let tenant_id = principal.active_tenant_id;
        self.view(tenant_id, kind, party_id)?;
        let command = PartyCommand::UpdateDetails(UpdateDetails {
            tenant_id,
            party_id,
            name: changes.name,
            contact: changes.contact,
            occurred_at: Utc::now(),
        });
        self.dispatch(tenant_id, party_id, command).await?;
        self.view(tenant_id, kind, party_id)
    }

    pub async fn suspend(
        &self,
        principal: &Principal,
        kind: PartyKind,
        party_id: PartyId,
        request: SuspendRequest,
    ) -> Result<PartyReadModel, DispatchError> {
        authorize(principal, &Permission::PARTIES_WRITE)?;
        let tenant_id = principal.active_tenant_id;
        self.view(tenant_id, kind, party_id)?;
        let command = PartyCommand::SuspendParty(SuspendParty {
            tenant_id,
            party_id,
            reason: request.reason,
            occurred_at: Utc::now(),
        });
        self.dispatch(tenant_id, party_id, command).await?;
        self.view(tenant_id, kind, party_id)
    }

    pub async fn reactivate(
        &self,
        principal: &Principal,
        kind: PartyKind,
        party_id: PartyId,
    ) -> Result<PartyReadModel, DispatchError> {
        authorize(principal, &Permission::PARTIES_WRITE)?;
        let tenant_id = principal.active_tenant_id;
        self.view(tenant_id, kind, party_id)?;
        let command = PartyCommand::ReactivateParty(ReactivateParty {
            tenant_id,
            party_id,
            occurred_at: Utc::now(),
        });
        self.dispatch(tenant_id, party_id, command).await?;
        self.view(tenant_id, kind, party_id)
    }

    pub fn get(&self, principal: &Principal, kind: PartyKind, party_id: PartyId) -> Result<PartyReadModel, DispatchError> {
        authorize(principal, &read_permission(kind))?;
        self.view(principal.active_tenant_id, kind, party_id)
    }

    pub fn list(&self, principal: &Principal, kind: PartyKind) -> Result<Vec<PartyReadModel>, DispatchError> {
        authorize(principal, &read_permission(kind))?;
        Ok(self.dispatcher.read_models().parties.list(principal.active_tenant_id, kind))
    }

    async fn dispatch(&self, tenant_id: TenantId, party_id: PartyId, command: PartyCommand) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, party_id.0, PARTY_AGGREGATE, command, |id| Party::empty(PartyId::new(id)))
            .await
            .map_err(|e| missing_as(e, "party", party_id))?;
        Ok(())
    }

    /// Read model lookup that also checks the kind, so `/suppliers/{id}`
    /// never returns a customer.
    fn view(&self, tenant_id: TenantId, kind: PartyKind, party_id: PartyId) -> Result<PartyReadModel, DispatchError> {
        self.dispatcher
            .read_models()
            .parties
            .get(tenant_id, &party_id)
            .filter(|p| p.kind == kind)
            .ok_or_else(|| DispatchError::not_found(kind.as_str(), party_id))
    }
}

/// Cashiers look up customers at the till; the supplier book stays with managers.
fn read_permission(kind: PartyKind) -> Permission {
    match kind {
        PartyKind::Customer => Permission::CUSTOMERS_READ,
        PartyKind::Supplier => Permission::SUPPLIERS_READ,
    }
}
