//! Read-only copy of the opponent's last known snapshot

/// Local representation of the remote player's visible state
///
/// Written only when a snapshot arrives (or on disconnect), read only by the
/// presentation layer. There is no staleness check: the last snapshot received
/// always wins, and the next periodic push corrects any reordering.
#[derive(Debug, Clone, Default)]
pub struct Mirror<S> {
    snapshot: S,
    updates: u64,
}

impl<S: Default> Mirror<S> {
    pub fn new() -> Self {
        Self {
            snapshot: S::default(),
            updates: 0,
        }
    }

    /// Overwrite with a received snapshot
    pub fn apply(&mut self, snapshot: S) {
        self.snapshot = snapshot;
        self.updates += 1;
    }

    /// Back to an empty board and default preview
    pub fn reset(&mut self) {
        self.snapshot = S::default();
        self.updates = 0;
    }

    pub fn get(&self) -> &S {
        &self.snapshot
    }

    /// Whether at least one snapshot arrived since the last reset
    pub fn has_data(&self) -> bool {
        self.updates > 0
    }

    /// Number of snapshots applied since the last reset
    pub fn updates(&self) -> u64 {
        self.updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overwrites_unconditionally() {
        let mut mirror = Mirror::<Vec<u8>>::new();
        assert!(!mirror.has_data());

        mirror.apply(vec![3, 3, 3]);
        // An older snapshot arriving late still wins
        mirror.apply(vec![1]);
        assert_eq!(mirror.get(), &vec![1]);
        assert_eq!(mirror.updates(), 2);

        mirror.reset();
        assert!(mirror.get().is_empty());
        assert!(!mirror.has_data());
    }
}
