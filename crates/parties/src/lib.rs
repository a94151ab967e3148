//! Customers and suppliers (event-sourced).
//!
//! Suppliers are referenced by purchase/return stock adjustments; customers
//! optionally by checkout transactions.

pub mod party;

pub use party::{
    ContactInfo, PARTY_AGGREGATE, Party, PartyCommand, PartyEvent, PartyId, PartyKind, PartyReactivated,
    PartyRegistered, PartyStatus, PartySuspended, PartyUpdated, ReactivateParty, RegisterParty,
    SuspendParty, UpdateDetails,
};
