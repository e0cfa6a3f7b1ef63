use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shipit_core::{
    CarrierId, DomainError, DomainResult, Entity, OwnerId, ProductId, ShipmentId, ShipmentLineId,
};

/// One product's share of a shipment.
///
/// Lines have their own identity. They reference their product by id only and
/// carry no link back to the owning shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentLine {
    pub id: ShipmentLineId,
    pub product_id: ProductId,
    pub quantity: u32,
}

impl ShipmentLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            id: ShipmentLineId::new(),
            product_id,
            quantity,
        }
    }
}

impl Entity for ShipmentLine {
    type Id = ShipmentLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Aggregate root: Shipment.
///
/// Built once per successful placement and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    id: ShipmentId,
    name: String,
    owner_id: OwnerId,
    carrier_id: CarrierId,
    created_at: DateTime<Utc>,
    total_price: u64,
    total_volume: u64,
    lines: Vec<ShipmentLine>,
}

/// Everything needed to build a shipment aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentDraft {
    pub id: ShipmentId,
    pub name: String,
    pub owner_id: OwnerId,
    pub carrier_id: CarrierId,
    pub created_at: DateTime<Utc>,
    pub total_price: u64,
    pub total_volume: u64,
    pub lines: Vec<ShipmentLine>,
}

impl Shipment {
    /// Validate a draft: non-empty name, at least one line, positive
    /// quantities and one line per product.
    pub fn build(draft: ShipmentDraft) -> DomainResult<Self> {
        if draft.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if draft.lines.is_empty() {
            return Err(DomainError::invariant("shipment must contain at least one line"));
        }
        for (idx, line) in draft.lines.iter().enumerate() {
            if line.quantity == 0 {
                return Err(DomainError::invariant(format!(
                    "line {idx} has zero quantity"
                )));
            }
            if draft.lines[..idx]
                .iter()
                .any(|earlier| earlier.product_id == line.product_id)
            {
                return Err(DomainError::invariant(format!(
                    "product {} appears on more than one line",
                    line.product_id
                )));
            }
        }

        Ok(Self {
            id: draft.id,
            name: draft.name,
            owner_id: draft.owner_id,
            carrier_id: draft.carrier_id,
            created_at: draft.created_at,
            total_price: draft.total_price,
            total_volume: draft.total_volume,
            lines: draft.lines,
        })
    }

    pub fn id_typed(&self) -> ShipmentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn carrier_id(&self) -> CarrierId {
        self.carrier_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn total_price(&self) -> u64 {
        self.total_price
    }

    pub fn total_volume(&self) -> u64 {
        self.total_volume
    }

    pub fn lines(&self) -> &[ShipmentLine] {
        &self.lines
    }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.quantity)
    }

    /// Total number of units across all lines.
    pub fn unit_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }
}

impl Entity for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
