use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shipit_core::{CarrierId, DomainError, DomainResult, Entity, OwnerId};

/// Input for registering a carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCarrier {
    pub owner_id: OwnerId,
    pub name: String,
    pub capacity: u32,
}

/// Capacity-constrained transport onto which units are placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carrier {
    id: CarrierId,
    owner_id: OwnerId,
    name: String,
    capacity: u32,
    active: bool,
    created_at: DateTime<Utc>,
}

impl Carrier {
    pub fn create(id: CarrierId, new: NewCarrier, at: DateTime<Utc>) -> DomainResult<Self> {
        if new.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if new.capacity == 0 {
            return Err(DomainError::validation("capacity must be positive"));
        }
        Ok(Self {
            id,
            owner_id: new.owner_id,
            name: new.name,
            capacity: new.capacity,
            active: true,
            created_at: at,
        })
    }

    pub fn id_typed(&self) -> CarrierId {
        self.id
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Inactive carriers are reported as not found to placements.
    pub fn is_usable(&self) -> bool {
        self.active
    }

    pub fn deactivate(&mut self) -> DomainResult<()> {
        if !self.active {
            return Err(DomainError::conflict("carrier is already inactive"));
        }
        self.active = false;
        Ok(())
    }
}

impl Entity for Carrier {
    type Id = CarrierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_carrier(capacity: u32) -> NewCarrier {
        NewCarrier {
            owner_id: OwnerId::new(),
            name: "Van".to_string(),
            capacity,
        }
    }

    #[test]
    fn create_carrier_rejects_zero_capacity() {
        let err = Carrier::create(CarrierId::new(), new_carrier(0), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn deactivated_carrier_is_not_usable() {
        let mut carrier = Carrier::create(CarrierId::new(), new_carrier(300), Utc::now()).unwrap();
        assert!(carrier.is_usable());
        carrier.deactivate().unwrap();
        assert!(!carrier.is_usable());
    }
}
