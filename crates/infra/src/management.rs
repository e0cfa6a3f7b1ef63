//! Owner-facing shipment management (read, list, delete).

use std::sync::Arc;

use thiserror::Error;

use shipit_auth::{AccessClaims, AuthzError, check_read_access, check_write_access};
use shipit_core::{Clock, OwnerId, ShipmentId, SystemClock};
use shipit_placement::Shipment;

use crate::store::{PlacementStore, PlacementTransaction, ShipmentStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManagementError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthzError),

    #[error("shipment {shipment_id} not found for owner {owner_id}")]
    NotFound {
        shipment_id: ShipmentId,
        owner_id: OwnerId,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub struct ShipmentService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> ShipmentService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl<S: PlacementStore> ShipmentService<S> {
    #[tracing::instrument(skip(self, claims))]
    pub fn get_shipment(
        &self,
        claims: &AccessClaims,
        owner_id: OwnerId,
        shipment_id: ShipmentId,
    ) -> Result<Shipment, ManagementError> {
        check_read_access(claims, owner_id, self.clock.now())?;
        self.store
            .begin()?
            .get(owner_id, shipment_id)?
            .ok_or(ManagementError::NotFound {
                shipment_id,
                owner_id,
            })
    }

    /// Owner's shipments, oldest first.
    #[tracing::instrument(skip(self, claims))]
    pub fn list_shipments(
        &self,
        claims: &AccessClaims,
        owner_id: OwnerId,
    ) -> Result<Vec<Shipment>, ManagementError> {
        check_read_access(claims, owner_id, self.clock.now())?;
        Ok(self.store.begin()?.list(owner_id)?)
    }

    /// Remove a shipment record. Stock already deducted stays deducted.
    #[tracing::instrument(skip(self, claims))]
    pub fn delete_shipment(
        &self,
        claims: &AccessClaims,
        owner_id: OwnerId,
        shipment_id: ShipmentId,
    ) -> Result<(), ManagementError> {
        check_write_access(claims, owner_id, self.clock.now())?;

        let mut tx = self.store.begin()?;
        if !tx.delete(owner_id, shipment_id)? {
            return Err(ManagementError::NotFound {
                shipment_id,
                owner_id,
            });
        }
        tx.commit()?;

        tracing::info!(%owner_id, %shipment_id, "shipment deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use shipit_auth::{GrantFlow, Scope};
    use shipit_core::{CarrierId, ProductId};
    use shipit_placement::{ShipmentDraft, ShipmentLine};

    use crate::store::InMemoryPlacementStore;

    fn claims(owner_id: OwnerId, scopes: Vec<Scope>) -> AccessClaims {
        let now = Utc::now();
        AccessClaims {
            sub: owner_id,
            scopes,
            flow: GrantFlow::AuthorizationCode,
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::hours(1),
        }
    }

    fn seeded(owner_id: OwnerId, names: &[&str]) -> (Arc<InMemoryPlacementStore>, Vec<Shipment>) {
        let store = Arc::new(InMemoryPlacementStore::new());
        let start = Utc::now();
        let mut tx = store.begin().unwrap();
        let mut shipments = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let s = Shipment::build(ShipmentDraft {
                id: ShipmentId::new(),
                name: name.to_string(),
                owner_id,
                carrier_id: CarrierId::new(),
                created_at: start + Duration::seconds(i as i64),
                total_price: 5,
                total_volume: 5,
                lines: vec![ShipmentLine::new(ProductId::new(), 1)],
            })
            .unwrap();
            tx.save(s.clone()).unwrap();
            shipments.push(s);
        }
        tx.commit().unwrap();
        (store, shipments)
    }

    #[test]
    fn list_is_oldest_first_and_owner_scoped() {
        let owner = OwnerId::new();
        let (store, shipments) = seeded(owner, &["first", "second"]);
        let service = ShipmentService::new(store);

        let listed = service
            .list_shipments(&claims(owner, vec![Scope::READ]), owner)
            .unwrap();
        assert_eq!(listed, shipments);

        let stranger = OwnerId::new();
        assert!(
            service
                .list_shipments(&claims(stranger, vec![Scope::READ]), stranger)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn get_requires_read_scope_and_existing_record() {
        let owner = OwnerId::new();
        let (store, shipments) = seeded(owner, &["only"]);
        let service = ShipmentService::new(store);
        let id = shipments[0].id_typed();

        assert_eq!(
            service
                .get_shipment(&claims(owner, vec![Scope::READ]), owner, id)
                .unwrap(),
            shipments[0]
        );
        assert!(matches!(
            service.get_shipment(&claims(owner, vec![Scope::WRITE]), owner, id),
            Err(ManagementError::Unauthorized(_))
        ));

        let missing = ShipmentId::new();
        assert_eq!(
            service.get_shipment(&claims(owner, vec![Scope::READ]), owner, missing),
            Err(ManagementError::NotFound {
                shipment_id: missing,
                owner_id: owner
            })
        );
    }

    #[test]
    fn delete_removes_once() {
        let owner = OwnerId::new();
        let (store, shipments) = seeded(owner, &["only"]);
        let service = ShipmentService::new(store);
        let id = shipments[0].id_typed();
        let writer = claims(owner, vec![Scope::READ, Scope::WRITE]);

        service.delete_shipment(&writer, owner, id).unwrap();
        assert!(matches!(
            service.delete_shipment(&writer, owner, id),
            Err(ManagementError::NotFound { .. })
        ));
        assert!(service.list_shipments(&writer, owner).unwrap().is_empty());
    }

    #[test]
    fn other_users_cannot_delete() {
        let owner = OwnerId::new();
        let (store, shipments) = seeded(owner, &["only"]);
        let service = ShipmentService::new(store);
        let intruder = OwnerId::new();

        assert!(matches!(
            service.delete_shipment(
                &claims(intruder, vec![Scope::WRITE]),
                owner,
                shipments[0].id_typed()
            ),
            Err(ManagementError::Unauthorized(AuthzError::SubjectMismatch { .. }))
        ));
    }
}
