//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values
/// (`Money`, cart lines, transaction line snapshots). Entities, by contrast,
/// are identified by an id and evolve over time (products, parties).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
