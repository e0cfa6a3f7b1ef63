use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shipit_core::{AggregateRoot, DomainError, DomainResult, OwnerId, ProductId};

/// Input for registering a stocked product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub owner_id: OwnerId,
    pub name: String,
    /// Volume of a single unit.
    pub volume: u32,
    /// Price of a single unit (smallest currency unit).
    pub price: u32,
    pub count_in_stock: u32,
}

/// Aggregate root: Product stock record.
///
/// Every committed stock write bumps `version`, which is what placement
/// transactions check before deducting stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    owner_id: OwnerId,
    name: String,
    volume: u32,
    price: u32,
    count_in_stock: u32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Product {
    /// Validate and create an active product at version 1.
    pub fn create(id: ProductId, new: NewProduct, at: DateTime<Utc>) -> DomainResult<Self> {
        if new.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if new.volume == 0 {
            return Err(DomainError::validation("volume must be positive"));
        }
        if new.price == 0 {
            return Err(DomainError::validation("price must be positive"));
        }

        Ok(Self {
            id,
            owner_id: new.owner_id,
            name: new.name,
            volume: new.volume,
            price: new.price,
            count_in_stock: new.count_in_stock,
            active: true,
            created_at: at,
            updated_at: at,
            version: 1,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn volume(&self) -> u32 {
        self.volume
    }

    pub fn price(&self) -> u32 {
        self.price
    }

    pub fn count_in_stock(&self) -> u32 {
        self.count_in_stock
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Active products with at least one unit on hand can contribute to a placement.
    pub fn can_be_shipped(&self) -> bool {
        self.active && self.count_in_stock > 0
    }

    /// Stock left after shipping `quantity` units.
    ///
    /// Fails instead of wrapping: stock never goes negative.
    pub fn remaining_after(&self, quantity: u32) -> DomainResult<u32> {
        self.count_in_stock.checked_sub(quantity).ok_or_else(|| {
            DomainError::invariant(format!(
                "cannot ship {quantity} units of product {}: only {} in stock",
                self.id, self.count_in_stock
            ))
        })
    }

    /// Overwrite the stock level (committed write). Bumps the version.
    pub fn set_count_in_stock(&mut self, count_in_stock: u32, at: DateTime<Utc>) {
        self.count_in_stock = count_in_stock;
        self.updated_at = at;
        self.version += 1;
    }

    /// Soft-delete: inactive products are invisible to placements.
    pub fn deactivate(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if !self.active {
            return Err(DomainError::conflict("product is already inactive"));
        }
        self.active = false;
        self.updated_at = at;
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
