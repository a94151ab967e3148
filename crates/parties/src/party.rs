use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgepos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use forgepos_events::Event;

pub const PARTY_AGGREGATE: &str = "parties.party";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub AggregateId);

impl PartyId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PartyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Customer,
    Supplier,
}

impl PartyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PartyKind::Customer => "customer",
            PartyKind::Supplier => "supplier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl ContactInfo {
    /// Trim fields, drop blanks, and reject an obviously malformed email.
    fn normalized(&self) -> Result<ContactInfo, DomainError> {
        fn clean(v: &Option<String>) -> Option<String> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }

        let email = clean(&self.email);
        if let Some(email) = &email {
            let well_formed = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !well_formed {
                return Err(DomainError::validation(format!("invalid email '{email}'")));
            }
        }

        Ok(ContactInfo {
            contact_person: clean(&self.contact_person),
            email,
            phone: clean(&self.phone),
            address: clean(&self.address),
        })
    }
}

/// Aggregate root: Party (customer or supplier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    id: PartyId,
    tenant_id: Option<TenantId>,
    kind: PartyKind,
    name: String,
    contact: ContactInfo,
    status: PartyStatus,
    version: u64,
    created: bool,
}

impl Party {
    pub fn empty(id: PartyId) -> Self {
        Self {
            id,
            tenant_id: None,
            kind: PartyKind::Customer,
            name: String::new(),
            contact: ContactInfo::default(),
            status: PartyStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PartyId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn kind(&self) -> PartyKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn status(&self) -> PartyStatus {
        self.status
    }

    /// Check that this party exists, is of `kind` and is not suspended.
    ///
    /// Used before a stock adjustment or transaction references the party.
    pub fn ensure_usable_as(&self, kind: PartyKind) -> Result<(), DomainError> {
        if !self.created || self.kind != kind {
            return Err(DomainError::validation(format!(
                "{} {} does not exist",
                kind.as_str(),
                self.id
            )));
        }
        if self.status == PartyStatus::Suspended {
            return Err(DomainError::invariant(format!(
                "{} '{}' is suspended",
                kind.as_str(),
                self.name
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for Party {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParty {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// `None` fields keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendParty {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateParty {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyCommand {
    RegisterParty(RegisterParty),
    UpdateDetails(UpdateDetails),
    SuspendParty(SuspendParty),
    ReactivateParty(ReactivateParty),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRegistered {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyUpdated {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySuspended {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyReactivated {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyEvent {
    PartyRegistered(PartyRegistered),
    PartyUpdated(PartyUpdated),
    PartySuspended(PartySuspended),
    PartyReactivated(PartyReactivated),
}

impl Event for PartyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartyEvent::PartyRegistered(_) => "parties.party.registered",
            PartyEvent::PartyUpdated(_) => "parties.party.updated",
            PartyEvent::PartySuspended(_) => "parties.party.suspended",
            PartyEvent::PartyReactivated(_) => "parties.party.reactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartyEvent::PartyRegistered(e) => e.occurred_at,
            PartyEvent::PartyUpdated(e) => e.occurred_at,
            PartyEvent::PartySuspended(e) => e.occurred_at,
            PartyEvent::PartyReactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Party {
    type Command = PartyCommand;
    type Event = PartyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartyEvent::PartyRegistered(e) => {
                self.id = e.party_id;
                self.tenant_id = Some(e.tenant_id);
                self.kind = e.kind;
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.status = PartyStatus::Active;
                self.created = true;
            }
            PartyEvent::PartyUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
            }
            PartyEvent::PartySuspended(_) => self.status = PartyStatus::Suspended,
            PartyEvent::PartyReactivated(_) => self.status = PartyStatus::Active,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PartyCommand::RegisterParty(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("party already exists"));
                }
                let contact = cmd.contact.clone().unwrap_or_default().normalized()?;
                Ok(vec![PartyEvent::PartyRegistered(PartyRegistered {
                    tenant_id: cmd.tenant_id,
                    party_id: cmd.party_id,
                    kind: cmd.kind,
                    name: required_name(&cmd.name)?,
                    contact,
                    occurred_at: cmd.occurred_at,
                })])
            }
            PartyCommand::UpdateDetails(cmd) => {
                self.ensure_exists(cmd.tenant_id, cmd.party_id)?;
                let name = match &cmd.name {
                    Some(n) => required_name(n)?,
                    None => self.name.clone(),
                };
                let contact = match &cmd.contact {
                    Some(c) => c.normalized()?,
                    None => self.contact.clone(),
                };
                Ok(vec![PartyEvent::PartyUpdated(PartyUpdated {
                    tenant_id: cmd.tenant_id,
                    party_id: cmd.party_id,
                    name,
                    contact,
                    occurred_at: cmd.occurred_at,
                })])
            }
            PartyCommand::SuspendParty(cmd) => {
                self.ensure_exists(cmd.tenant_id, cmd.party_id)?;
                if self.status == PartyStatus::Suspended {
                    return Err(DomainError::conflict("party is already suspended"));
                }
                Ok(vec![PartyEvent::PartySuspended(PartySuspended {
                    tenant_id: cmd.tenant_id,
                    party_id: cmd.party_id,
                    reason: cmd.reason.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            PartyCommand::ReactivateParty(cmd) => {
                self.ensure_exists(cmd.tenant_id, cmd.party_id)?;
                if self.status == PartyStatus::Active {
                    return Err(DomainError::conflict("party is already active"));
                }
                Ok(vec![PartyEvent::PartyReactivated(PartyReactivated {
                    tenant_id: cmd.tenant_id,
                    party_id: cmd.party_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

fn required_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    Ok(name.to_string())
}

impl Party {
    fn ensure_exists(&self, tenant_id: TenantId, party_id: PartyId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != party_id {
            return Err(DomainError::invariant("party_id mismatch"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(kind: PartyKind) -> (Party, TenantId, PartyId) {
        let tenant_id = TenantId::new();
        let party_id = PartyId::new(AggregateId::new());
        let mut party = Party::empty(party_id);
        party
            .execute(&PartyCommand::RegisterParty(RegisterParty {
                tenant_id,
                party_id,
                kind,
                name: " Acme Wholesale ".to_string(),
                contact: Some(ContactInfo {
                    email: Some("orders@acme.test".into()),
                    phone: Some("   ".into()),
                    ..ContactInfo::default()
                }),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        (party, tenant_id, party_id)
    }

    #[test]
    fn register_normalizes_name_and_contact() {
        let (party, _, _) = registered(PartyKind::Supplier);
        assert_eq!(party.name(), "Acme Wholesale");
        assert_eq!(party.contact().phone, None);
        assert_eq!(party.status(), PartyStatus::Active);
    }

    #[test]
    fn malformed_email_is_rejected() {
        let (party, tenant_id, party_id) = registered(PartyKind::Customer);
        let err = party
            .handle(&PartyCommand::UpdateDetails(UpdateDetails {
                tenant_id,
                party_id,
                name: None,
                contact: Some(ContactInfo {
                    email: Some("not-an-email".into()),
                    ..ContactInfo::default()
                }),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn suspended_supplier_is_not_usable_until_reactivated() {
        let (mut party, tenant_id, party_id) = registered(PartyKind::Supplier);
        party
            .execute(&PartyCommand::SuspendParty(SuspendParty {
                tenant_id,
                party_id,
                reason: Some("late deliveries".into()),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert!(matches!(
            party.ensure_usable_as(PartyKind::Supplier),
            Err(DomainError::InvariantViolation(_))
        ));

        party
            .execute(&PartyCommand::ReactivateParty(ReactivateParty {
                tenant_id,
                party_id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert!(party.ensure_usable_as(PartyKind::Supplier).is_ok());
        assert_eq!(party.version(), 3);
    }

    #[test]
    fn customer_is_not_usable_as_supplier() {
        let (party, _, _) = registered(PartyKind::Customer);
        assert!(matches!(
            party.ensure_usable_as(PartyKind::Supplier),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn reactivating_active_party_is_a_conflict() {
        let (party, tenant_id, party_id) = registered(PartyKind::Customer);
        let err = party
            .handle(&PartyCommand::ReactivateParty(ReactivateParty {
                tenant_id,
                party_id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
