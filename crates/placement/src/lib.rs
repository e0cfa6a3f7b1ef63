//! Shipment placement domain module.
//!
//! Turns stocked products into unit items, picks the price-maximising subset
//! that fits a carrier, and builds the resulting shipment aggregate.
//! Deterministic domain logic only (no IO, no storage).

pub mod assembler;
pub mod knapsack;
pub mod shipment;
pub mod unit;

pub use assembler::{AssemblyError, ShipmentAssembler};
pub use knapsack::{KnapsackPlacer, KnapsackResult, Placer, SolverError, solve, table_cells};
pub use shipment::{Shipment, ShipmentDraft, ShipmentLine};
pub use unit::{UnitItem, expand_units};
