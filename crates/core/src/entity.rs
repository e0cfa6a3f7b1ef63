//! Entity trait: records whose identity outlives changes to their attributes.

/// Entity marker + minimal interface.
///
/// Carriers, shipments and shipment lines are entities; two records with
/// identical fields but different ids are distinct.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
