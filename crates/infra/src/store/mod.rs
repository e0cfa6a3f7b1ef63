//! Collaborator boundaries consumed by the placement engine.
//!
//! The engine never talks to storage directly. It opens a
//! [`PlacementTransaction`], reads the owner's catalog through it, buffers the
//! shipment and stock writes, and commits them as one unit.
//!
//! ## Transaction semantics
//!
//! - Reads see committed state plus the transaction's own pending writes.
//! - Writes are buffered until `commit()`.
//! - `commit()` is all-or-nothing: every touched product must still be at the
//!   version the transaction observed, otherwise nothing is applied and
//!   `StoreError::Conflict` is returned.
//! - Dropping a transaction without committing discards it (rollback).

pub mod in_memory;

pub use in_memory::{InMemoryPlacementStore, InMemoryTransaction};

use thiserror::Error;

use shipit_catalog::{Carrier, Product};
use shipit_core::{CarrierId, OwnerId, ProductId, ShipmentId};
use shipit_placement::Shipment;

/// Storage operation error.
///
/// These are infrastructure errors (concurrency, isolation, availability), as
/// opposed to domain errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("owner isolation violation: {0}")]
    OwnerIsolation(String),

    #[error("invalid write: {0}")]
    InvalidWrite(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Owner-scoped product reads and stock write-back.
pub trait ProductCatalog {
    /// Active products of `owner_id`, in catalog order.
    fn list_active_products(&self, owner_id: OwnerId) -> Result<Vec<Product>, StoreError>;

    /// Overwrite the stock level of one product.
    fn save_stock(
        &mut self,
        owner_id: OwnerId,
        product_id: ProductId,
        count_in_stock: u32,
    ) -> Result<(), StoreError>;
}

/// Owner-scoped carrier lookup.
pub trait CarrierDirectory {
    /// Active carrier `carrier_id` of `owner_id`, if any.
    fn get_carrier(
        &self,
        owner_id: OwnerId,
        carrier_id: CarrierId,
    ) -> Result<Option<Carrier>, StoreError>;
}

/// Durable shipment records.
pub trait ShipmentStore {
    fn save(&mut self, shipment: Shipment) -> Result<(), StoreError>;

    fn get(&self, owner_id: OwnerId, shipment_id: ShipmentId)
    -> Result<Option<Shipment>, StoreError>;

    /// All shipments of `owner_id`, oldest first.
    fn list(&self, owner_id: OwnerId) -> Result<Vec<Shipment>, StoreError>;

    /// Returns whether a shipment was removed.
    fn delete(&mut self, owner_id: OwnerId, shipment_id: ShipmentId) -> Result<bool, StoreError>;
}

/// A unit of work spanning catalog, carriers and shipments.
pub trait PlacementTransaction: ProductCatalog + CarrierDirectory + ShipmentStore {
    fn commit(self) -> Result<(), StoreError>;
}

/// Transaction factory.
pub trait PlacementStore: Send + Sync {
    type Tx<'a>: PlacementTransaction
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Tx<'_>, StoreError>;
}
