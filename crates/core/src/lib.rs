//! `shipit-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the catalog,
//! placement and infrastructure crates (no storage, no transport).

pub mod aggregate;
pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CarrierId, OwnerId, ProductId, ShipmentId, ShipmentLineId};
pub use value_object::ValueObject;
