use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use shipit_catalog::{Carrier, Product};
use shipit_core::{
    AggregateRoot, CarrierId, Clock, ExpectedVersion, OwnerId, ProductId, ShipmentId, SystemClock,
};
use shipit_placement::Shipment;

use super::{
    CarrierDirectory, PlacementStore, PlacementTransaction, ProductCatalog, ShipmentStore,
    StoreError,
};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    carriers: HashMap<CarrierId, Carrier>,
    shipments: BTreeMap<ShipmentId, Shipment>,
}

/// In-memory transactional store.
///
/// Intended for tests/dev and the CLI. Transactions are optimistic: nothing
/// is locked while a transaction is open, conflicts surface at commit.
pub struct InMemoryPlacementStore {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for InMemoryPlacementStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryPlacementStore")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryPlacementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlacementStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose committed writes are stamped by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    /// Register a product (catalog management surface).
    pub fn insert_product(&self, product: Product) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let id = product.id_typed();
        if state.products.contains_key(&id) {
            return Err(StoreError::InvalidWrite(format!("product {id} already exists")));
        }
        state.products.insert(id, product);
        Ok(())
    }

    /// Register a carrier (carrier management surface).
    pub fn insert_carrier(&self, carrier: Carrier) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let id = carrier.id_typed();
        if state.carriers.contains_key(&id) {
            return Err(StoreError::InvalidWrite(format!("carrier {id} already exists")));
        }
        state.carriers.insert(id, carrier);
        Ok(())
    }

    /// Committed view of one product.
    pub fn product(
        &self,
        owner_id: OwnerId,
        product_id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        let state = self.read()?;
        Ok(state
            .products
            .get(&product_id)
            .filter(|p| p.owner_id() == owner_id)
            .cloned())
    }

    /// Direct stock update outside any placement (restocking).
    ///
    /// Bumps the product version, so open placement transactions that already
    /// read this product will fail to commit.
    pub fn set_stock(
        &self,
        owner_id: OwnerId,
        product_id: ProductId,
        count_in_stock: u32,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.write()?;
        let product = state
            .products
            .get_mut(&product_id)
            .filter(|p| p.owner_id() == owner_id)
            .ok_or_else(|| StoreError::InvalidWrite(format!("unknown product {product_id}")))?;
        product.set_count_in_stock(count_in_stock, now);
        Ok(())
    }
}

impl PlacementStore for InMemoryPlacementStore {
    type Tx<'a> = InMemoryTransaction<'a>;

    fn begin(&self) -> Result<Self::Tx<'_>, StoreError> {
        Ok(InMemoryTransaction {
            store: self,
            observed: RefCell::new(HashMap::new()),
            stock_writes: BTreeMap::new(),
            saved: Vec::new(),
            deleted: Vec::new(),
        })
    }
}

/// Buffered unit of work over an [`InMemoryPlacementStore`].
#[derive(Debug)]
pub struct InMemoryTransaction<'a> {
    store: &'a InMemoryPlacementStore,
    /// Product versions as first seen by this transaction.
    observed: RefCell<HashMap<ProductId, u64>>,
    stock_writes: BTreeMap<ProductId, u32>,
    saved: Vec<Shipment>,
    deleted: Vec<ShipmentId>,
}

impl InMemoryTransaction<'_> {
    fn observe(&self, product: &Product) {
        self.observed
            .borrow_mut()
            .entry(product.id_typed())
            .or_insert(product.version());
    }

    fn is_deleted(&self, shipment_id: ShipmentId) -> bool {
        self.deleted.contains(&shipment_id)
    }
}

impl ProductCatalog for InMemoryTransaction<'_> {
    fn list_active_products(&self, owner_id: OwnerId) -> Result<Vec<Product>, StoreError> {
        let state = self.store.read()?;
        let now = self.store.clock.now();
        let mut products = Vec::new();
        for product in state.products.values() {
            if product.owner_id() != owner_id || !product.is_active() {
                continue;
            }
            self.observe(product);
            let mut view = product.clone();
            if let Some(&pending) = self.stock_writes.get(&product.id_typed()) {
                view.set_count_in_stock(pending, now);
            }
            products.push(view);
        }
        Ok(products)
    }

    fn save_stock(
        &mut self,
        owner_id: OwnerId,
        product_id: ProductId,
        count_in_stock: u32,
    ) -> Result<(), StoreError> {
        {
            let state = self.store.read()?;
            let product = state.products.get(&product_id).ok_or_else(|| {
                StoreError::InvalidWrite(format!("unknown product {product_id}"))
            })?;
            if product.owner_id() != owner_id {
                return Err(StoreError::OwnerIsolation(format!(
                    "product {product_id} does not belong to owner {owner_id}"
                )));
            }
            self.observe(product);
        }
        self.stock_writes.insert(product_id, count_in_stock);
        Ok(())
    }
}

impl CarrierDirectory for InMemoryTransaction<'_> {
    fn get_carrier(
        &self,
        owner_id: OwnerId,
        carrier_id: CarrierId,
    ) -> Result<Option<Carrier>, StoreError> {
        let state = self.store.read()?;
        Ok(state
            .carriers
            .get(&carrier_id)
            .filter(|c| c.owner_id() == owner_id && c.is_usable())
            .cloned())
    }
}

impl ShipmentStore for InMemoryTransaction<'_> {
    fn save(&mut self, shipment: Shipment) -> Result<(), StoreError> {
        let id = shipment.id_typed();
        let exists = self.saved.iter().any(|s| s.id_typed() == id)
            || self.store.read()?.shipments.contains_key(&id);
        if exists {
            return Err(StoreError::InvalidWrite(format!("shipment {id} already exists")));
        }
        self.saved.push(shipment);
        Ok(())
    }

    fn get(
        &self,
        owner_id: OwnerId,
        shipment_id: ShipmentId,
    ) -> Result<Option<Shipment>, StoreError> {
        if self.is_deleted(shipment_id) {
            return Ok(None);
        }
        if let Some(s) = self.saved.iter().find(|s| s.id_typed() == shipment_id) {
            return Ok(Some(s.clone()).filter(|s| s.owner_id() == owner_id));
        }
        let state = self.store.read()?;
        Ok(state
            .shipments
            .get(&shipment_id)
            .filter(|s| s.owner_id() == owner_id)
            .cloned())
    }

    fn list(&self, owner_id: OwnerId) -> Result<Vec<Shipment>, StoreError> {
        let state = self.store.read()?;
        let mut shipments: Vec<Shipment> = state
            .shipments
            .values()
            .chain(self.saved.iter())
            .filter(|s| s.owner_id() == owner_id && !self.is_deleted(s.id_typed()))
            .cloned()
            .collect();
        shipments.sort_by_key(|s| (s.created_at(), s.id_typed()));
        Ok(shipments)
    }

    fn delete(&mut self, owner_id: OwnerId, shipment_id: ShipmentId) -> Result<bool, StoreError> {
        if let Some(pos) = self
            .saved
            .iter()
            .position(|s| s.id_typed() == shipment_id && s.owner_id() == owner_id)
        {
            self.saved.remove(pos);
            return Ok(true);
        }
        if self.is_deleted(shipment_id) {
            return Ok(false);
        }
        let exists = self
            .store
            .read()?
            .shipments
            .get(&shipment_id)
            .is_some_and(|s| s.owner_id() == owner_id);
        if exists {
            self.deleted.push(shipment_id);
        }
        Ok(exists)
    }
}

impl PlacementTransaction for InMemoryTransaction<'_> {
    fn commit(self) -> Result<(), StoreError> {
        let observed = self.observed.into_inner();
        let now = self.store.clock.now();
        let mut state = self.store.write()?;

        // Validate everything first; nothing is applied unless all checks pass.
        for product_id in self.stock_writes.keys() {
            let product = state.products.get(product_id).ok_or_else(|| {
                StoreError::InvalidWrite(format!("unknown product {product_id}"))
            })?;
            let expected = observed
                .get(product_id)
                .copied()
                .map(ExpectedVersion::Exact)
                .unwrap_or(ExpectedVersion::Any);
            expected
                .check(product.version())
                .map_err(|e| StoreError::Conflict(format!("product {product_id}: {e}")))?;
        }
        for shipment in &self.saved {
            if state.shipments.contains_key(&shipment.id_typed()) {
                return Err(StoreError::InvalidWrite(format!(
                    "shipment {} already exists",
                    shipment.id_typed()
                )));
            }
        }
        for shipment_id in &self.deleted {
            if !state.shipments.contains_key(shipment_id) {
                return Err(StoreError::Conflict(format!(
                    "shipment {shipment_id} was deleted concurrently"
                )));
            }
        }

        for (product_id, count_in_stock) in self.stock_writes {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.set_count_in_stock(count_in_stock, now);
            }
        }
        for shipment in self.saved {
            state.shipments.insert(shipment.id_typed(), shipment);
        }
        for shipment_id in self.deleted {
            state.shipments.remove(&shipment_id);
        }

        Ok(())
    }
}
