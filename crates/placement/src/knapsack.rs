//! Exact 0/1 knapsack solver over unit items.
//!
//! ## Algorithm
//!
//! ```text
//! maxValue[i][c] = best total price using the first i units within capacity c
//!
//!     0 1 . . . capacity
//!   | - - - - - - |
//! 0 | 0 0 . . . 0 |      row 0:    no units considered
//! 1 | 0 . . . . . |      column 0: no room left
//! . | . .         |
//! n | 0 . . . . . |
//! ```
//!
//! The table is filled row by row, then walked backwards from
//! `(n, capacity)` to recover which units make up the optimum. A unit is
//! skipped whenever the row above already reaches the remaining goal, so when
//! several optimal subsets exist the walk keeps the lower-indexed units.
//!
//! Time and memory are both `O(n * capacity)`; callers bound `capacity`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::unit::UnitItem;

/// Outcome of one knapsack solve.
///
/// `items` are in backtrack order (highest input index first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnapsackResult {
    capacity: u32,
    total_price: u64,
    items: Vec<UnitItem>,
}

impl KnapsackResult {
    pub fn new(capacity: u32, total_price: u64, items: Vec<UnitItem>) -> Self {
        Self {
            capacity,
            total_price,
            items,
        }
    }

    pub fn empty(capacity: u32) -> Self {
        Self::new(capacity, 0, Vec::new())
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn total_price(&self) -> u64 {
        self.total_price
    }

    pub fn total_volume(&self) -> u64 {
        self.items.iter().map(|u| u64::from(u.volume)).sum()
    }

    pub fn items(&self) -> &[UnitItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Solver failures. Both indicate the inputs could not be solved as given,
/// never a user-correctable condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// The `(n + 1) * (capacity + 1)` table does not fit in addressable memory.
    #[error("value table for {units} units and capacity {capacity} is too large")]
    TableTooLarge { units: usize, capacity: u32 },

    /// Backtracking drove a goal below zero or failed to reach zero.
    #[error(
        "backtracking invariant violated at unit {index}: goal price {goal_price}, goal capacity {goal_capacity}"
    )]
    Backtrack {
        index: usize,
        goal_price: u64,
        goal_capacity: u32,
    },
}

/// Strategy seam for choosing units. The assembler depends on this, not on
/// the concrete solver.
pub trait Placer: Send + Sync {
    fn place(&self, items: &[UnitItem], capacity: u32) -> Result<KnapsackResult, SolverError>;
}

impl<P> Placer for std::sync::Arc<P>
where
    P: Placer + ?Sized,
{
    fn place(&self, items: &[UnitItem], capacity: u32) -> Result<KnapsackResult, SolverError> {
        (**self).place(items, capacity)
    }
}

/// Dynamic-programming placer (exact, deterministic).
#[derive(Debug, Default, Copy, Clone)]
pub struct KnapsackPlacer;

impl Placer for KnapsackPlacer {
    fn place(&self, items: &[UnitItem], capacity: u32) -> Result<KnapsackResult, SolverError> {
        solve(items, capacity)
    }
}

/// Number of cells a solve over `units` units and `capacity` would allocate.
///
/// `None` when the count overflows `usize`.
pub fn table_cells(units: usize, capacity: u32) -> Option<usize> {
    units
        .checked_add(1)?
        .checked_mul((capacity as usize).checked_add(1)?)
}

/// Row-major `(n + 1) x (capacity + 1)` table of best prices.
struct ValueTable {
    width: usize,
    cells: Vec<u64>,
}

impl ValueTable {
    fn zeroed(units: usize, capacity: u32) -> Result<Self, SolverError> {
        let len =
            table_cells(units, capacity).ok_or(SolverError::TableTooLarge { units, capacity })?;
        Ok(Self {
            width: capacity as usize + 1,
            cells: vec![0; len],
        })
    }

    fn get(&self, row: usize, capacity: usize) -> u64 {
        self.cells[row * self.width + capacity]
    }

    fn set(&mut self, row: usize, capacity: usize, value: u64) {
        self.cells[row * self.width + capacity] = value;
    }
}

fn fill_table(items: &[UnitItem], capacity: u32) -> Result<ValueTable, SolverError> {
    let mut table = ValueTable::zeroed(items.len(), capacity)?;

    for row in 1..=items.len() {
        let item = items[row - 1];
        let volume = item.volume as usize;
        for c in 0..=capacity as usize {
            let without = table.get(row - 1, c);
            let best = if volume > c {
                without
            } else {
                without.max(u64::from(item.price) + table.get(row - 1, c - volume))
            };
            table.set(row, c, best);
        }
    }

    Ok(table)
}

/// Compute the price-maximising subset of `items` that fits in `capacity`.
///
/// Pure function of its inputs. Empty input or zero capacity yields an empty
/// result; units larger than `capacity` are never selected.
pub fn solve(items: &[UnitItem], capacity: u32) -> Result<KnapsackResult, SolverError> {
    let table = fill_table(items, capacity)?;
    let n = items.len();
    let best = table.get(n, capacity as usize);

    let mut goal_price = best;
    let mut goal_capacity = capacity;
    let mut chosen = Vec::new();

    for index in (1..=n).rev() {
        if goal_price == 0 {
            break;
        }

        // Optimum reachable without this unit: skip it.
        if table.get(index - 1, goal_capacity as usize) == goal_price {
            continue;
        }

        let item = items[index - 1];
        chosen.push(item);

        let violated = SolverError::Backtrack {
            index,
            goal_price,
            goal_capacity,
        };
        goal_price = goal_price
            .checked_sub(u64::from(item.price))
            .ok_or_else(|| violated.clone())?;
        goal_capacity = goal_capacity.checked_sub(item.volume).ok_or(violated)?;
    }

    if goal_price != 0 {
        return Err(SolverError::Backtrack {
            index: 0,
            goal_price,
            goal_capacity,
        });
    }

    Ok(KnapsackResult::new(capacity, best, chosen))
}
