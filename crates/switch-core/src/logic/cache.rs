//! Previous Snapshot storage
//!
//! Only ever touched while [`SwitchLogic`](crate::SwitchLogic)'s lock is held.
//! The snapshot is replaced wholesale, never edited in place.

use crate::traits::StateSnapshot;

#[derive(Debug, Default)]
pub(crate) struct StateCache {
    previous: StateSnapshot,
}

impl StateCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn previous(&self) -> &StateSnapshot {
        &self.previous
    }

    /// Install `snapshot` as the new comparison base, returning the old one
    pub(crate) fn replace(&mut self, snapshot: StateSnapshot) -> StateSnapshot {
        std::mem::replace(&mut self.previous, snapshot)
    }

    /// Switches present in both snapshots whose state differs, with their new state
    pub(crate) fn delta(&self, current: &StateSnapshot) -> StateSnapshot {
        current
            .iter()
            .filter(|(switch, state)| {
                self.previous
                    .get(*switch)
                    .is_some_and(|previous| previous != *state)
            })
            .map(|(switch, state)| (switch.clone(), state.clone()))
            .collect()
    }

    /// Fold states observed right after an explicit set into a new snapshot
    ///
    /// Switches that were not part of the set keep their previous value, so
    /// drift on them is still reported by the next watchdog tick.
    pub(crate) fn record_observed(&mut self, observed: &StateSnapshot) {
        let mut next = self.previous.clone();
        next.extend(observed.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.replace(next);
    }
}
