use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use forgepos_core::TenantId;
use forgepos_events::EventEnvelope;
use forgepos_parties::{ContactInfo, PARTY_AGGREGATE, PartyEvent, PartyId, PartyKind, PartyStatus};

use crate::projections::{Projection, ProjectionError, StreamCursors, ensure_tenant};
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Customer / supplier directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyReadModel {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: ContactInfo,
    pub status: PartyStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PartyProjection {
    store: InMemoryTenantStore<PartyId, PartyReadModel>,
    cursors: StreamCursors,
}

impl PartyProjection {
    pub fn get(&self, tenant_id: TenantId, party_id: &PartyId) -> Option<PartyReadModel> {
        self.store.get(tenant_id, party_id)
    }

    /// Parties of one kind, ordered by name.
    pub fn list(&self, tenant_id: TenantId, kind: PartyKind) -> Vec<PartyReadModel> {
        let mut parties: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|p| p.kind == kind)
            .collect();
        parties.sort_by(|a, b| a.name.cmp(&b.name));
        parties
    }

    fn update(
        &self,
        tenant_id: TenantId,
        party_id: PartyId,
        at: DateTime<Utc>,
        f: impl FnOnce(&mut PartyReadModel),
    ) -> Result<(), ProjectionError> {
        let mut rm = self
            .store
            .get(tenant_id, &party_id)
            .ok_or_else(|| ProjectionError::MissingRecord(format!("party {party_id}")))?;
        f(&mut rm);
        rm.updated_at = at;
        self.store.upsert(tenant_id, party_id, rm);
        Ok(())
    }
}

impl Projection for PartyProjection {
    fn name(&self) -> &'static str {
        "parties.directory"
    }

    fn aggregate_type(&self) -> &'static str {
        PARTY_AGGREGATE
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: PartyEvent =
            serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::deserialize(envelope, e))?;
        let tenant_id = envelope.tenant_id();

        match ev {
            PartyEvent::PartyRegistered(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.store.upsert(
                    tenant_id,
                    e.party_id,
                    PartyReadModel {
                        party_id: e.party_id,
                        kind: e.kind,
                        name: e.name,
                        contact: e.contact,
                        status: PartyStatus::Active,
                        updated_at: e.occurred_at,
                    },
                );
            }
            PartyEvent::PartyUpdated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.party_id, e.occurred_at, |rm| {
                    rm.name = e.name;
                    rm.contact = e.contact;
                })?;
            }
            PartyEvent::PartySuspended(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.party_id, e.occurred_at, |rm| {
                    rm.status = PartyStatus::Suspended;
                })?;
            }
            PartyEvent::PartyReactivated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.party_id, e.occurred_at, |rm| {
                    rm.status = PartyStatus::Active;
                })?;
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
