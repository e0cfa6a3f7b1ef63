//! Unit expansion: stocked products become individually tracked unit items.

use serde::{Deserialize, Serialize};

use shipit_catalog::Product;
use shipit_core::{ProductId, ValueObject};

/// One physical unit of a product, as seen by the solver.
///
/// Units of the same product are interchangeable; they only differ by their
/// position in the solver input.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitItem {
    pub product_id: ProductId,
    pub volume: u32,
    pub price: u32,
}

impl UnitItem {
    pub fn new(product_id: ProductId, volume: u32, price: u32) -> Self {
        Self {
            product_id,
            volume,
            price,
        }
    }

    pub fn of(product: &Product) -> Self {
        Self::new(product.id_typed(), product.volume(), product.price())
    }
}

impl ValueObject for UnitItem {}

/// Expand products into a flat unit sequence.
///
/// Each shippable product contributes exactly `count_in_stock` consecutive
/// entries, in the order the products were given. Inactive products are
/// skipped. Empty input yields empty output.
pub fn expand_units(products: &[Product]) -> Vec<UnitItem> {
    let shippable = || products.iter().filter(|p| p.can_be_shipped());
    let total: usize = shippable().map(|p| p.count_in_stock() as usize).sum();
    let mut units = Vec::with_capacity(total);
    for product in shippable() {
        let unit = UnitItem::of(product);
        units.extend(std::iter::repeat_n(unit, product.count_in_stock() as usize));
    }
    units
}
