//! Shipment assembly: expansion, solving and per-product aggregation.
//!
//! No side effects beyond building the aggregate. Persisting it and deducting
//! stock is the caller's job.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use shipit_catalog::{Carrier, Product};
use shipit_core::{CarrierId, DomainError, OwnerId, ProductId, ShipmentId};

use crate::knapsack::{KnapsackPlacer, Placer, SolverError};
use crate::shipment::{Shipment, ShipmentDraft, ShipmentLine};
use crate::unit::{UnitItem, expand_units};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// No products, or no non-empty subset of units fits the carrier.
    #[error("placement is impossible with carrier {carrier_id} for owner {owner_id}")]
    PlacementImpossible {
        carrier_id: CarrierId,
        owner_id: OwnerId,
    },

    /// The solver failed. Carries the exact inputs for diagnosis.
    #[error("solver failed for capacity {capacity} over {} units: {source}", .units.len())]
    Solver {
        #[source]
        source: SolverError,
        capacity: u32,
        units: Vec<UnitItem>,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl AssemblyError {
    fn impossible(carrier: &Carrier) -> Self {
        Self::PlacementImpossible {
            carrier_id: carrier.id_typed(),
            owner_id: carrier.owner_id(),
        }
    }
}

/// Builds in-memory shipments from a product pool and a carrier.
#[derive(Debug, Clone, Default)]
pub struct ShipmentAssembler<P = KnapsackPlacer> {
    placer: P,
}

impl<P> ShipmentAssembler<P> {
    pub fn new(placer: P) -> Self {
        Self { placer }
    }
}

impl<P: Placer> ShipmentAssembler<P> {
    /// Choose units for `carrier` and build the (not yet persisted) shipment.
    ///
    /// Lines follow the order of `products`; each carries the number of that
    /// product's units the solver selected.
    pub fn assemble(
        &self,
        name: &str,
        products: &[Product],
        carrier: &Carrier,
        now: DateTime<Utc>,
    ) -> Result<Shipment, AssemblyError> {
        if products.is_empty() {
            return Err(AssemblyError::impossible(carrier));
        }

        let units = expand_units(products);
        let capacity = carrier.capacity();
        let knapsack = match self.placer.place(&units, capacity) {
            Ok(k) => k,
            Err(source) => {
                return Err(AssemblyError::Solver {
                    source,
                    capacity,
                    units,
                });
            }
        };

        if knapsack.is_empty() {
            return Err(AssemblyError::impossible(carrier));
        }

        tracing::debug!(
            carrier_id = %carrier.id_typed(),
            capacity,
            units = units.len(),
            chosen = knapsack.items().len(),
            total_price = knapsack.total_price(),
            "knapsack solved"
        );

        let mut counts: HashMap<ProductId, u32> = HashMap::new();
        for unit in knapsack.items() {
            *counts.entry(unit.product_id).or_insert(0) += 1;
        }

        let mut lines = Vec::with_capacity(counts.len());
        for product in products {
            if let Some(quantity) = counts.remove(&product.id_typed()) {
                lines.push(ShipmentLine::new(product.id_typed(), quantity));
            }
        }
        if !counts.is_empty() {
            return Err(DomainError::invariant("placer selected units of unknown products").into());
        }

        let shipment = Shipment::build(ShipmentDraft {
            id: ShipmentId::new(),
            name: name.to_string(),
            owner_id: carrier.owner_id(),
            carrier_id: carrier.id_typed(),
            created_at: now,
            total_price: knapsack.total_price(),
            total_volume: knapsack.total_volume(),
            lines,
        })?;

        Ok(shipment)
    }
}
