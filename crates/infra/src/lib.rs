//! Infrastructure layer: stores, concurrency control, orchestration, config.

pub mod config;
pub mod coordinator;
pub mod locks;
pub mod management;
pub mod store;


pub use config::{AppConfig, ConfigError, PlacementConfig};
pub use coordinator::{MAX_SHIPMENT_NAME_LEN, PlaceShipment, PlacementCoordinator, PlacementError};
pub use locks::OwnerLocks;
pub use management::{ManagementError, ShipmentService};
pub use store::{
    CarrierDirectory, InMemoryPlacementStore, InMemoryTransaction, PlacementStore,
    PlacementTransaction, ProductCatalog, ShipmentStore, StoreError,
};
