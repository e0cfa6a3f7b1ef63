//! Catalog domain module: stocked products and carriers.
//!
//! These are the records the placement engine reads (and, for product stock,
//! writes back). Pure domain logic only (no IO, no storage).

pub mod carrier;
pub mod product;

pub use carrier::{Carrier, NewCarrier};
pub use product::{NewProduct, Product};
