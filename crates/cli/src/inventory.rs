//! JSON inventory input and the placement report printed on success.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shipit_catalog::{Carrier, NewCarrier, NewProduct, Product};
use shipit_core::{CarrierId, OwnerId, ProductId};
use shipit_infra::InMemoryPlacementStore;
use shipit_placement::Shipment;

fn active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductEntry {
    pub name: String,
    pub volume: u32,
    pub price: u32,
    pub count_in_stock: u32,
    #[serde(default = "active")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CarrierEntry {
    pub name: String,
    pub capacity: u32,
    #[serde(default = "active")]
    pub active: bool,
}

/// Everything one owner has on hand.
#[derive(Debug, Clone, Deserialize)]
pub struct Inventory {
    /// Generated when absent.
    #[serde(default)]
    pub owner_id: Option<OwnerId>,
    pub products: Vec<ProductEntry>,
    pub carriers: Vec<CarrierEntry>,
}

pub fn read_inventory(path: &Path) -> Result<Inventory> {
    let file = File::open(path)
        .with_context(|| format!("could not open inventory file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("could not parse inventory file: {}", path.display()))
}

/// Identifiers assigned while loading an [`Inventory`] into a store.
#[derive(Debug)]
pub struct Seeded {
    pub owner_id: OwnerId,
    products: Vec<(ProductId, String)>,
    carriers: Vec<(CarrierId, String)>,
}

impl Seeded {
    /// Carrier named `name`, or the first one listed.
    pub fn carrier(&self, name: Option<&str>) -> Result<CarrierId> {
        match name {
            Some(name) => self
                .carriers
                .iter()
                .find(|(_, n)| n == name)
                .map(|(id, _)| *id)
                .ok_or_else(|| anyhow!("no carrier named '{name}' in inventory")),
            None => self
                .carriers
                .first()
                .map(|(id, _)| *id)
                .ok_or_else(|| anyhow!("inventory lists no carriers")),
        }
    }

    pub fn report(&self, store: &InMemoryPlacementStore, shipment: Shipment) -> Result<Report> {
        let mut remaining_stock = Vec::with_capacity(self.products.len());
        for (product_id, name) in &self.products {
            let product = store
                .product(self.owner_id, *product_id)?
                .ok_or_else(|| anyhow!("product '{name}' disappeared from the store"))?;
            remaining_stock.push(StockLevel {
                product_id: *product_id,
                name: name.clone(),
                count_in_stock: product.count_in_stock(),
                updated_at: product.updated_at(),
            });
        }
        Ok(Report {
            shipment,
            remaining_stock,
        })
    }
}

pub fn seed(
    store: &InMemoryPlacementStore,
    inventory: Inventory,
    now: DateTime<Utc>,
) -> Result<Seeded> {
    let owner_id = inventory.owner_id.unwrap_or_default();

    let mut products: Vec<(ProductId, String)> = Vec::with_capacity(inventory.products.len());
    for entry in inventory.products {
        let mut product = Product::create(
            ProductId::new(),
            NewProduct {
                owner_id,
                name: entry.name.clone(),
                volume: entry.volume,
                price: entry.price,
                count_in_stock: entry.count_in_stock,
            },
            now,
        )
        .with_context(|| format!("invalid product '{}'", entry.name))?;
        if !entry.active {
            product.deactivate(now)?;
        }
        products.push((product.id_typed(), entry.name));
        store.insert_product(product)?;
    }

    let mut carriers: Vec<(CarrierId, String)> = Vec::with_capacity(inventory.carriers.len());
    for entry in inventory.carriers {
        if carriers.iter().any(|(_, n)| *n == entry.name) {
            bail!("duplicate carrier name '{}'", entry.name);
        }
        let mut carrier = Carrier::create(
            CarrierId::new(),
            NewCarrier {
                owner_id,
                name: entry.name.clone(),
                capacity: entry.capacity,
            },
            now,
        )
        .with_context(|| format!("invalid carrier '{}'", entry.name))?;
        if !entry.active {
            carrier.deactivate()?;
        }
        carriers.push((carrier.id_typed(), entry.name));
        store.insert_carrier(carrier)?;
    }

    Ok(Seeded {
        owner_id,
        products,
        carriers,
    })
}

#[derive(Debug, Serialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub name: String,
    pub count_in_stock: u32,
    pub updated_at: DateTime<Utc>,
}

/// Printed to stdout after a successful placement.
#[derive(Debug, Serialize)]
pub struct Report {
    pub shipment: Shipment,
    pub remaining_stock: Vec<StockLevel>,
}
