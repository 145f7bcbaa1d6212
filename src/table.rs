//! Table: one fixed-capacity open-addressing array.
//!
//! Slots hold keys into a record arena owned by the engine rather than the
//! records themselves, so migrating a record between tables moves a key and
//! never copies the record.
//!
//! A slot is never returned to `Empty` once written. Removal flips the
//! record's `live` flag (tombstone) and migration leaves `Drained` behind;
//! both are probed past. A probe that reaches `Empty` can therefore stop:
//! nothing in that key's chain lies beyond it.

use crate::probe::{ProbeSeq, ProbingPolicy};
use crate::record::Record;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Arena key of one stored record.
    pub(crate) struct RecordKey;
}

pub(crate) type RecordArena = SlotMap<RecordKey, Record>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Empty,
    Filled(RecordKey),
    Drained,
}

#[derive(Debug)]
pub(crate) struct Table {
    slots: Vec<Slot>,
    // Filled slots, live or tombstone.
    size: usize,
    deleted: usize,
    policy: ProbingPolicy,
}

impl Table {
    pub(crate) fn new(capacity: usize, policy: ProbingPolicy) -> Self {
        Self {
            slots: vec![Slot::Empty; capacity],
            size: 0,
            deleted: 0,
            policy,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }
    pub(crate) fn size(&self) -> usize {
        self.size
    }
    pub(crate) fn deleted(&self) -> usize {
        self.deleted
    }
    pub(crate) fn live(&self) -> usize {
        self.size - self.deleted
    }
    pub(crate) fn policy(&self) -> ProbingPolicy {
        self.policy
    }

    fn probe(&self, hashed: u32) -> ProbeSeq {
        ProbeSeq::new(hashed, self.capacity(), self.policy)
    }

    /// Index of the live record `(key, id)`, if present.
    pub(crate) fn find_index(
        &self,
        arena: &RecordArena,
        hashed: u32,
        key: &str,
        id: i32,
    ) -> Option<usize> {
        for idx in self.probe(hashed) {
            match self.slots[idx] {
                Slot::Empty => return None,
                Slot::Drained => continue,
                Slot::Filled(rk) => {
                    let r = &arena[rk];
                    if r.live && r.matches(key, id) {
                        return Some(idx);
                    }
                }
            }
        }
        None
    }

    /// First slot in `hashed`'s chain that is empty or holds a tombstone.
    fn free_slot(&self, arena: &RecordArena, hashed: u32) -> Option<usize> {
        self.probe(hashed).find(|&idx| match self.slots[idx] {
            Slot::Empty => true,
            Slot::Filled(rk) => !arena[rk].live,
            Slot::Drained => false,
        })
    }

    /// Store a new live record. Fails only when the probe sequence is exhausted.
    pub(crate) fn insert(
        &mut self,
        arena: &mut RecordArena,
        hashed: u32,
        mut record: Record,
    ) -> Result<(), Record> {
        let Some(idx) = self.free_slot(arena, hashed) else {
            return Err(record);
        };
        record.live = true;
        match self.slots[idx] {
            Slot::Filled(rk) => {
                // Reusing a tombstone: the slot stays occupied.
                arena[rk] = record;
                self.deleted -= 1;
            }
            _ => {
                self.slots[idx] = Slot::Filled(arena.insert(record));
                self.size += 1;
            }
        }
        Ok(())
    }

    /// Link an already-stored live record into this table.
    pub(crate) fn place(
        &mut self,
        arena: &mut RecordArena,
        hashed: u32,
        rk: RecordKey,
    ) -> Result<(), RecordKey> {
        let Some(idx) = self.free_slot(arena, hashed) else {
            return Err(rk);
        };
        match self.slots[idx] {
            Slot::Filled(dead) => {
                arena.remove(dead);
                self.deleted -= 1;
            }
            _ => self.size += 1,
        }
        self.slots[idx] = Slot::Filled(rk);
        Ok(())
    }

    /// Link a live record into a table that holds no tombstones.
    pub(crate) fn link(&mut self, hashed: u32, rk: RecordKey) -> Result<(), RecordKey> {
        let Some(idx) = self.probe(hashed).find(|&idx| self.slots[idx] == Slot::Empty) else {
            return Err(rk);
        };
        self.slots[idx] = Slot::Filled(rk);
        self.size += 1;
        Ok(())
    }

    /// Keys of the live records, in slot order.
    pub(crate) fn live_keys<'a>(
        &'a self,
        arena: &'a RecordArena,
    ) -> impl Iterator<Item = RecordKey> + 'a {
        self.slots.iter().filter_map(move |slot| match *slot {
            Slot::Filled(rk) if arena[rk].live => Some(rk),
            _ => None,
        })
    }

    /// Tombstone the live record at `idx`.
    pub(crate) fn tombstone(&mut self, arena: &mut RecordArena, idx: usize) {
        if let Slot::Filled(rk) = self.slots[idx] {
            let r = &mut arena[rk];
            debug_assert!(r.live, "tombstoning a dead slot");
            r.live = false;
            self.deleted += 1;
        }
    }

    pub(crate) fn record<'a>(&self, arena: &'a RecordArena, idx: usize) -> Option<&'a Record> {
        match self.slots[idx] {
            Slot::Filled(rk) => arena.get(rk),
            _ => None,
        }
    }

    pub(crate) fn record_mut<'a>(
        &self,
        arena: &'a mut RecordArena,
        idx: usize,
    ) -> Option<&'a mut Record> {
        match self.slots[idx] {
            Slot::Filled(rk) => arena.get_mut(rk),
            _ => None,
        }
    }

    /// Detach the slot at `idx`, leaving `Drained` behind if it was occupied.
    pub(crate) fn drain_slot(&mut self, arena: &RecordArena, idx: usize) -> Drain {
        let Slot::Filled(rk) = self.slots[idx] else {
            return Drain::Nothing;
        };
        self.slots[idx] = Slot::Drained;
        self.size -= 1;
        if arena[rk].live {
            Drain::Live(rk)
        } else {
            self.deleted -= 1;
            Drain::Tombstone(rk)
        }
    }

    /// Put back a live record that `drain_slot` detached from `idx`.
    pub(crate) fn restore(&mut self, idx: usize, rk: RecordKey) {
        debug_assert_eq!(self.slots[idx], Slot::Drained);
        self.slots[idx] = Slot::Filled(rk);
        self.size += 1;
    }

    /// Consume the table, freeing every record it still holds.
    pub(crate) fn release(self, arena: &mut RecordArena) {
        for slot in self.slots {
            if let Slot::Filled(rk) = slot {
                arena.remove(rk);
            }
        }
    }

    /// Consume a table whose live records were linked elsewhere, freeing
    /// only its tombstones.
    pub(crate) fn discard_tombstones(self, arena: &mut RecordArena) {
        for slot in self.slots {
            if let Slot::Filled(rk) = slot {
                if !arena[rk].live {
                    arena.remove(rk);
                }
            }
        }
    }

    pub(crate) fn dump_into(&self, out: &mut String, arena: &RecordArena) {
        for (i, slot) in self.slots.iter().enumerate() {
            match slot {
                Slot::Empty => {}
                Slot::Drained => out.push_str(&format!("[{i}] : drained\n")),
                Slot::Filled(rk) => out.push_str(&format!("[{i}] : {}\n", arena[*rk])),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Drain {
    Nothing,
    Live(RecordKey),
    Tombstone(RecordKey),
}
