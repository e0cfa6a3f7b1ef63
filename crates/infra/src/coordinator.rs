//! Placement execution pipeline (application-level orchestration).
//!
//! ```text
//! PlaceShipment + AccessClaims
//!   ↓
//! 1. Validate the request (name)
//!   ↓
//! 2. Check write access for the owner
//!   ↓
//! 3. Take the owner's lane (per-owner mutex)
//!   ↓
//! 4. Open a transaction; read active products and the carrier
//!   ↓
//! 5. Enforce solver limits, assemble the shipment
//!   ↓
//! 6. Buffer the shipment and every stock write-back, commit
//!   ↓
//! 7. On commit conflict, retry from 4 (bounded)
//! ```
//!
//! Any failure before `commit()` drops the transaction, so the catalog and the
//! shipment store are left exactly as they were.

use std::sync::Arc;

use thiserror::Error;

use shipit_auth::{AccessClaims, AuthzError, check_write_access};
use shipit_catalog::{Carrier, Product};
use shipit_core::{CarrierId, Clock, DomainError, OwnerId, ProductId, SystemClock};
use shipit_placement::{
    AssemblyError, KnapsackPlacer, Placer, Shipment, ShipmentAssembler, SolverError, UnitItem,
    expand_units, table_cells,
};

use crate::config::PlacementConfig;
use crate::locks::OwnerLocks;
use crate::store::{
    CarrierDirectory, PlacementStore, PlacementTransaction, ProductCatalog, ShipmentStore,
    StoreError,
};

/// Longest accepted shipment name, in characters.
pub const MAX_SHIPMENT_NAME_LEN: usize = 256;

/// Request to place a new shipment for `owner_id` on `carrier_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceShipment {
    pub owner_id: OwnerId,
    pub name: String,
    pub carrier_id: CarrierId,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlacementError {
    /// Malformed request; nothing was read.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthzError),

    /// The carrier does not exist, belongs to someone else, or is inactive.
    #[error("carrier {carrier_id} not found for owner {owner_id}")]
    CarrierNotFound {
        carrier_id: CarrierId,
        owner_id: OwnerId,
    },

    /// The carrier exists but no unit of stock fits into it.
    #[error("placement is impossible with carrier {carrier_id} for owner {owner_id}")]
    PlacementImpossible {
        carrier_id: CarrierId,
        owner_id: OwnerId,
    },

    #[error("carrier capacity {capacity} exceeds the configured limit of {limit}")]
    CapacityLimitExceeded { capacity: u32, limit: u32 },

    #[error(
        "placing {units} units into capacity {capacity} exceeds the limit of {limit} table cells"
    )]
    ProblemTooLarge {
        units: usize,
        capacity: u32,
        limit: usize,
    },

    /// Stock changed underneath every attempt.
    #[error("concurrent modification: {0}")]
    Conflict(String),

    /// A defect, never a user error. The transaction was aborted.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl PlacementError {
    /// Only commit conflicts are worth running again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlacementError::Conflict(_))
    }
}

impl From<StoreError> for PlacementError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => PlacementError::Conflict(msg),
            other => PlacementError::Store(other),
        }
    }
}

/// Runs placements against a [`PlacementStore`].
///
/// Generic over the store and the placer so tests can swap either. Cheap to
/// share behind an `Arc`; all state is internally synchronised.
pub struct PlacementCoordinator<S, P = KnapsackPlacer> {
    store: Arc<S>,
    assembler: ShipmentAssembler<P>,
    clock: Arc<dyn Clock>,
    locks: OwnerLocks,
    config: PlacementConfig,
}

impl<S> PlacementCoordinator<S, KnapsackPlacer> {
    pub fn new(store: Arc<S>, config: PlacementConfig) -> Self {
        Self {
            store,
            assembler: ShipmentAssembler::new(KnapsackPlacer),
            clock: Arc::new(SystemClock),
            locks: OwnerLocks::new(),
            config,
        }
    }
}

impl<S, P> PlacementCoordinator<S, P> {
    /// Replace the unit placer.
    pub fn with_placer<Q>(self, placer: Q) -> PlacementCoordinator<S, Q> {
        PlacementCoordinator {
            store: self.store,
            assembler: ShipmentAssembler::new(placer),
            clock: self.clock,
            locks: self.locks,
            config: self.config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }
}

impl<S, P> PlacementCoordinator<S, P>
where
    S: PlacementStore,
    P: Placer,
{
    /// Place a shipment: choose units, persist the shipment, deduct stock.
    ///
    /// Either the shipment exists and every line's stock was deducted, or
    /// nothing changed.
    #[tracing::instrument(
        name = "place_shipment",
        skip(self, claims, command),
        fields(owner_id = %command.owner_id, carrier_id = %command.carrier_id)
    )]
    pub fn place_shipment(
        &self,
        claims: &AccessClaims,
        command: PlaceShipment,
    ) -> Result<Shipment, PlacementError> {
        let name = validate_name(&command.name)?;
        check_write_access(claims, command.owner_id, self.clock.now())?;

        self.locks.run_exclusive(command.owner_id, || {
            let mut attempt = 0;
            loop {
                match self.try_place(command.owner_id, command.carrier_id, name) {
                    Err(e) if e.is_retryable() && attempt < self.config.max_conflict_retries => {
                        attempt += 1;
                        tracing::warn!(attempt, error = %e, "placement conflicted, retrying");
                    }
                    result => return result,
                }
            }
        })
    }

    fn try_place(
        &self,
        owner_id: OwnerId,
        carrier_id: CarrierId,
        name: &str,
    ) -> Result<Shipment, PlacementError> {
        let mut tx = self.store.begin()?;

        let products = tx.list_active_products(owner_id)?;
        let carrier = tx
            .get_carrier(owner_id, carrier_id)?
            .ok_or(PlacementError::CarrierNotFound {
                carrier_id,
                owner_id,
            })?;

        self.check_limits(&products, &carrier)?;

        let shipment = self
            .assembler
            .assemble(name, &products, &carrier, self.clock.now())
            .map_err(|e| self.assembly_failed(e, &products, &carrier))?;

        let deductions = stock_deductions(&products, &shipment).map_err(|e| {
            invariant_violated(e.to_string(), carrier.capacity(), &expand_units(&products))
        })?;

        tx.save(shipment.clone())?;
        for (product_id, remaining) in deductions {
            tx.save_stock(owner_id, product_id, remaining)?;
        }
        tx.commit()?;

        tracing::info!(
            shipment_id = %shipment.id_typed(),
            name = shipment.name(),
            total_price = shipment.total_price(),
            lines = shipment.lines().len(),
            units = shipment.unit_count(),
            "shipment placed"
        );

        Ok(shipment)
    }

    fn check_limits(&self, products: &[Product], carrier: &Carrier) -> Result<(), PlacementError> {
        let capacity = carrier.capacity();
        if capacity > self.config.max_capacity {
            return Err(PlacementError::CapacityLimitExceeded {
                capacity,
                limit: self.config.max_capacity,
            });
        }

        let units = products
            .iter()
            .try_fold(0usize, |acc, p| acc.checked_add(p.count_in_stock() as usize));
        let too_large = |units: usize| PlacementError::ProblemTooLarge {
            units,
            capacity,
            limit: self.config.max_table_cells,
        };
        let units = units.ok_or_else(|| too_large(usize::MAX))?;
        match table_cells(units, capacity) {
            Some(cells) if cells <= self.config.max_table_cells => Ok(()),
            _ => Err(too_large(units)),
        }
    }

    fn assembly_failed(
        &self,
        err: AssemblyError,
        products: &[Product],
        carrier: &Carrier,
    ) -> PlacementError {
        match err {
            AssemblyError::PlacementImpossible {
                carrier_id,
                owner_id,
            } => PlacementError::PlacementImpossible {
                carrier_id,
                owner_id,
            },
            AssemblyError::Solver {
                source: SolverError::TableTooLarge { units, capacity },
                ..
            } => PlacementError::ProblemTooLarge {
                units,
                capacity,
                limit: self.config.max_table_cells,
            },
            AssemblyError::Solver {
                source,
                capacity,
                units,
            } => invariant_violated(source.to_string(), capacity, &units),
            AssemblyError::Domain(DomainError::Validation(msg) | DomainError::InvalidId(msg)) => {
                PlacementError::Validation(msg)
            }
            AssemblyError::Domain(e) => {
                invariant_violated(e.to_string(), carrier.capacity(), &expand_units(products))
            }
        }
    }
}

/// Every `InternalInvariantViolation` is built here so the inputs that
/// triggered it are always logged.
fn invariant_violated(reason: String, capacity: u32, units: &[UnitItem]) -> PlacementError {
    tracing::error!(
        capacity,
        unit_count = units.len(),
        units = ?units,
        reason = %reason,
        "internal invariant violated, placement aborted"
    );
    PlacementError::InternalInvariantViolation(reason)
}

fn validate_name(name: &str) -> Result<&str, PlacementError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PlacementError::Validation(
            "shipment name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_SHIPMENT_NAME_LEN {
        return Err(PlacementError::Validation(format!(
            "shipment name exceeds {MAX_SHIPMENT_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

/// New stock level for every product a shipment draws from.
fn stock_deductions(
    products: &[Product],
    shipment: &Shipment,
) -> Result<Vec<(ProductId, u32)>, DomainError> {
    shipment
        .lines()
        .iter()
        .map(|line| {
            let product = products
                .iter()
                .find(|p| p.id_typed() == line.product_id)
                .ok_or_else(|| {
                    DomainError::invariant(format!(
                        "shipment line references unknown product {}",
                        line.product_id
                    ))
                })?;
            Ok((line.product_id, product.remaining_after(line.quantity)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use shipit_auth::{GrantFlow, Scope};
    use shipit_catalog::{NewCarrier, NewProduct};
    use shipit_core::{AggregateRoot, FixedClock};

    use crate::store::InMemoryPlacementStore;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()))
    }

    fn claims(owner_id: OwnerId, scopes: Vec<Scope>) -> AccessClaims {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        AccessClaims {
            sub: owner_id,
            scopes,
            flow: GrantFlow::AuthorizationCode,
            issued_at: now - Duration::minutes(5),
            expires_at: now + Duration::hours(1),
        }
    }

    struct Fixture {
        owner: OwnerId,
        coordinator: PlacementCoordinator<InMemoryPlacementStore>,
        a: ProductId,
        b: ProductId,
        carrier: CarrierId,
    }

    fn fixture(capacity: u32, config: PlacementConfig) -> Fixture {
        let owner = OwnerId::new();
        let store = Arc::new(InMemoryPlacementStore::with_clock(clock()));
        let now = clock().now();

        let product = |name: &str, volume, price, stock| {
            let p = Product::create(
                ProductId::new(),
                NewProduct {
                    owner_id: owner,
                    name: name.to_string(),
                    volume,
                    price,
                    count_in_stock: stock,
                },
                now,
            )
            .unwrap();
            let id = p.id_typed();
            store.insert_product(p).unwrap();
            id
        };
        let a = product("A", 100, 12, 7);
        let b = product("B", 70, 16, 9);

        let carrier = Carrier::create(
            CarrierId::new(),
            NewCarrier {
                owner_id: owner,
                name: "Truck".to_string(),
                capacity,
            },
            now,
        )
        .unwrap();
        let carrier_id = carrier.id_typed();
        store.insert_carrier(carrier).unwrap();

        Fixture {
            owner,
            coordinator: PlacementCoordinator::new(store, config).with_clock(clock()),
            a,
            b,
            carrier: carrier_id,
        }
    }

    fn request(f: &Fixture, name: &str) -> PlaceShipment {
        PlaceShipment {
            owner_id: f.owner,
            name: name.to_string(),
            carrier_id: f.carrier,
        }
    }

    fn stock(f: &Fixture, id: ProductId) -> u32 {
        f.coordinator
            .store()
            .product(f.owner, id)
            .unwrap()
            .unwrap()
            .count_in_stock()
    }

    #[test]
    fn placement_persists_shipment_and_deducts_stock() {
        let f = fixture(300, PlacementConfig::default());
        let shipment = f
            .coordinator
            .place_shipment(&claims(f.owner, vec![Scope::WRITE]), request(&f, "  Monday run "))
            .unwrap();

        assert_eq!(shipment.name(), "Monday run");
        assert_eq!(shipment.created_at(), clock().now());
        assert_eq!(shipment.quantity_of(f.b), Some(4));
        assert_eq!(shipment.quantity_of(f.a), None);
        assert_eq!(shipment.total_price(), 64);

        assert_eq!(stock(&f, f.a), 7);
        assert_eq!(stock(&f, f.b), 5);

        let product_b = f.coordinator.store().product(f.owner, f.b).unwrap().unwrap();
        assert_eq!(product_b.version(), 2);

        let tx = f.coordinator.store().begin().unwrap();
        assert_eq!(tx.list(f.owner).unwrap(), vec![shipment]);
    }

    #[test]
    fn owner_lane_is_released_after_placement() {
        let f = fixture(300, PlacementConfig::default());
        let claims = claims(f.owner, vec![Scope::WRITE]);
        f.coordinator.place_shipment(&claims, request(&f, "first")).unwrap();
        assert_eq!(f.coordinator.locks.tracked(), 0);

        let mut impossible = request(&f, "second");
        impossible.carrier_id = CarrierId::new();
        assert!(f.coordinator.place_shipment(&claims, impossible).is_err());
        assert_eq!(f.coordinator.locks.tracked(), 0);
    }

    #[test]
    fn blank_or_oversized_names_are_rejected() {
        let f = fixture(300, PlacementConfig::default());
        let claims = claims(f.owner, vec![Scope::WRITE]);

        let err = f
            .coordinator
            .place_shipment(&claims, request(&f, "   "))
            .unwrap_err();
        assert!(matches!(err, PlacementError::Validation(_)));

        let long = "x".repeat(MAX_SHIPMENT_NAME_LEN + 1);
        let err = f
            .coordinator
            .place_shipment(&claims, request(&f, &long))
            .unwrap_err();
        assert!(matches!(err, PlacementError::Validation(_)));
    }

    #[test]
    fn missing_write_scope_is_denied_without_side_effects() {
        let f = fixture(300, PlacementConfig::default());
        let err = f
            .coordinator
            .place_shipment(&claims(f.owner, vec![Scope::READ]), request(&f, "Run"))
            .unwrap_err();

        assert!(matches!(
            err,
            PlacementError::Unauthorized(AuthzError::MissingScope(_))
        ));
        assert!(!err.is_retryable());
        assert_eq!(stock(&f, f.b), 9);
    }

    #[test]
    fn unknown_carrier_is_not_found() {
        let f = fixture(300, PlacementConfig::default());
        let mut req = request(&f, "Run");
        req.carrier_id = CarrierId::new();
        let err = f
            .coordinator
            .place_shipment(&claims(f.owner, vec![Scope::WRITE]), req.clone())
            .unwrap_err();
        assert_eq!(
            err,
            PlacementError::CarrierNotFound {
                carrier_id: req.carrier_id,
                owner_id: f.owner
            }
        );
    }

    #[test]
    fn carrier_too_small_for_any_unit_is_impossible() {
        let f = fixture(50, PlacementConfig::default());
        let err = f
            .coordinator
            .place_shipment(&claims(f.owner, vec![Scope::WRITE]), request(&f, "Run"))
            .unwrap_err();
        assert_eq!(
            err,
            PlacementError::PlacementImpossible {
                carrier_id: f.carrier,
                owner_id: f.owner
            }
        );
        assert_eq!(stock(&f, f.a), 7);
        assert_eq!(stock(&f, f.b), 9);
    }

    #[test]
    fn capacity_above_limit_is_rejected_before_solving() {
        let config = PlacementConfig {
            max_capacity: 299,
            ..PlacementConfig::default()
        };
        let f = fixture(300, config);
        let err = f
            .coordinator
            .place_shipment(&claims(f.owner, vec![Scope::WRITE]), request(&f, "Run"))
            .unwrap_err();
        assert_eq!(
            err,
            PlacementError::CapacityLimitExceeded {
                capacity: 300,
                limit: 299
            }
        );
    }

    #[test]
    fn oversized_table_is_rejected_before_solving() {
        // 16 units, capacity 300: 17 * 301 cells.
        let config = PlacementConfig {
            max_table_cells: 17 * 301 - 1,
            ..PlacementConfig::default()
        };
        let f = fixture(300, config);
        let err = f
            .coordinator
            .place_shipment(&claims(f.owner, vec![Scope::WRITE]), request(&f, "Run"))
            .unwrap_err();
        assert_eq!(
            err,
            PlacementError::ProblemTooLarge {
                units: 16,
                capacity: 300,
                limit: 17 * 301 - 1
            }
        );
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(PlacementError::from(StoreError::Conflict("v".into())).is_retryable());
        assert!(!PlacementError::from(StoreError::Unavailable("down".into())).is_retryable());
        assert!(!PlacementError::InternalInvariantViolation("bug".into()).is_retryable());
    }
}
