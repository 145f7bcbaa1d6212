//! Migration: the retired table and the cursor that drains it.
//!
//! Each mutating call on the cache advances the cursor by a fixed quota of
//! slots (a quarter of the old capacity, at least one), moving live records
//! into the current table and discarding tombstones. Once the cursor reaches
//! the old capacity the old table is released.
//!
//! A record that finds no free slot in the current table stays where it was
//! and the next pass sweeps the old table again, so a migration never drops
//! a record. The cache reserves room for every pending record, which keeps
//! that path cold.

use crate::config::TRANSFER_FRACTION;
use crate::hasher::KeyHasher;
use crate::table::{Drain, RecordArena, Table};

#[derive(Debug)]
pub(crate) struct Migration {
    old: Table,
    cursor: usize,
}

/// Result of one migration slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    InProgress,
    Complete,
}

/// Slots drained per slice from a table of `capacity`.
pub(crate) fn quota(capacity: usize) -> usize {
    ((capacity as f64 * TRANSFER_FRACTION).floor() as usize).max(1)
}

impl Migration {
    pub(crate) fn new(old: Table) -> Self {
        Self { old, cursor: 0 }
    }

    pub(crate) fn old(&self) -> &Table {
        &self.old
    }

    pub(crate) fn old_mut(&mut self) -> &mut Table {
        &mut self.old
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    /// Drain the next slice of the old table into `current`.
    pub(crate) fn step<H: KeyHasher>(
        &mut self,
        current: &mut Table,
        arena: &mut RecordArena,
        hasher: &H,
    ) -> Step {
        let cap = self.old.capacity();
        let quota = quota(cap);
        let end = (self.cursor + quota).min(cap);
        let (mut moved, mut discarded, mut stranded) = (0usize, 0usize, 0usize);

        for idx in self.cursor..end {
            match self.old.drain_slot(arena, idx) {
                Drain::Nothing => {}
                Drain::Tombstone(rk) => {
                    arena.remove(rk);
                    discarded += 1;
                }
                Drain::Live(rk) => {
                    let hashed = hasher.hash_key(arena[rk].key());
                    match current.place(arena, hashed, rk) {
                        Ok(()) => moved += 1,
                        Err(rk) => {
                            self.old.restore(idx, rk);
                            stranded += 1;
                        }
                    }
                }
            }
        }
        self.cursor += quota;
        tracing::trace!(cursor = self.cursor, quota, moved, discarded, "migration slice");
        if stranded > 0 {
            tracing::warn!(
                stranded,
                capacity = current.capacity(),
                "no free slot for migrated records; kept in the old table"
            );
        }

        if self.cursor < cap {
            return Step::InProgress;
        }
        if self.old.size() > 0 {
            // Records were left behind: sweep again from the start.
            self.cursor = 0;
            return Step::InProgress;
        }
        Step::Complete
    }

    /// Free the drained old table and whatever it still holds.
    pub(crate) fn finish(self, arena: &mut RecordArena) {
        self.old.release(arena);
    }
}
