use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shipit_core::OwnerId;

/// One mutex per owner.
///
/// Placements for the same owner run one at a time inside a process;
/// different owners never wait on each other. Commit-time version checks
/// still catch writers outside this process.
///
/// A lane exists only while some placement holds or waits on it; the last
/// one out removes it from the map.
#[derive(Debug, Default)]
pub struct OwnerLocks {
    lanes: Mutex<HashMap<OwnerId, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding `owner_id`'s lane.
    pub fn run_exclusive<T>(&self, owner_id: OwnerId, f: impl FnOnce() -> T) -> T {
        let lane = Arc::clone(self.lanes().entry(owner_id).or_default());
        let out = {
            let _guard = lane.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut lanes = self.lanes();
        drop(lane);
        if lanes
            .get(&owner_id)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            lanes.remove(&owner_id);
        }
        out
    }

    // The map only holds `Arc`s, so a poisoned guard cannot leave it inconsistent.
    fn lanes(&self) -> MutexGuard<'_, HashMap<OwnerId, Arc<Mutex<()>>>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.lanes().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn lane_is_dropped_once_idle() {
        let locks = OwnerLocks::new();
        let owner = OwnerId::new();
        let seen = locks.run_exclusive(owner, || locks.tracked());
        assert_eq!(seen, 1);
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn same_owner_runs_one_at_a_time() {
        let locks = Arc::new(OwnerLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let owner = OwnerId::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (locks, inside, barrier) =
                    (Arc::clone(&locks), Arc::clone(&inside), Arc::clone(&barrier));
                thread::spawn(move || {
                    barrier.wait();
                    locks.run_exclusive(owner, || {
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn different_owners_do_not_block() {
        let locks = OwnerLocks::new();
        let (a, b) = (OwnerId::new(), OwnerId::new());
        let nested = locks.run_exclusive(a, || locks.run_exclusive(b, || locks.tracked()));
        assert_eq!(nested, 2);
        assert_eq!(locks.tracked(), 0);
    }
}
