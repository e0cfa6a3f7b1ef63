use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser as ClapParser;
use tracing::info;

use shipit_auth::{AccessClaims, GrantFlow, Scope};
use shipit_core::OwnerId;
use shipit_infra::{
    AppConfig, InMemoryPlacementStore, PlaceShipment, PlacementConfig, PlacementCoordinator,
};

use crate::cli::Cli;
use crate::inventory::{Inventory, Report};

mod cli;
mod inventory;

fn main() -> Result<()> {
    let args = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if args.pretty_logs {
        config.log.json = false;
    }
    shipit_observability::init(&config.log);

    let inventory = inventory::read_inventory(&args.input_file)?;
    info!(
        file = %args.input_file.display(),
        products = inventory.products.len(),
        carriers = inventory.carriers.len(),
        "inventory loaded"
    );

    let report = place(
        inventory,
        args.carrier.as_deref(),
        &args.name,
        config.placement,
    )?;

    serde_json::to_writer_pretty(std::io::stdout().lock(), &report)?;
    println!();
    Ok(())
}

/// The CLI acts as a trusted machine client for the inventory's owner.
fn service_claims(owner_id: OwnerId, now: DateTime<Utc>) -> AccessClaims {
    AccessClaims {
        sub: owner_id,
        scopes: vec![Scope::READ, Scope::WRITE],
        flow: GrantFlow::ClientCredentials,
        issued_at: now,
        expires_at: now + Duration::minutes(5),
    }
}

fn place(
    inventory: Inventory,
    carrier: Option<&str>,
    name: &str,
    config: PlacementConfig,
) -> Result<Report> {
    let store = Arc::new(InMemoryPlacementStore::new());
    let seeded = inventory::seed(&store, inventory, Utc::now())?;
    let carrier_id = seeded.carrier(carrier)?;

    let coordinator = PlacementCoordinator::new(Arc::clone(&store), config);
    let shipment = coordinator
        .place_shipment(
            &service_claims(seeded.owner_id, Utc::now()),
            PlaceShipment {
                owner_id: seeded.owner_id,
                name: name.to_string(),
                carrier_id,
            },
        )
        .context("placement failed")?;

    seeded.report(&store, shipment)
}
