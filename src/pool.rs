// src/pool.rs
//! Flat array-backed LRU of handle wrappers.
//!
//! Capacity is bounded by the per-process file-descriptor limit (typically
//! 256-1024), so a linear scan over a flat array beats pointer chasing; do
//! not replace this with a hash map unless that limit grows by an order of
//! magnitude. A key may occupy several slots at once: growing copies of a
//! hot key is the whole point, since a second copy is what lets a second
//! reader proceed while the first is inside a slow codec call.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::seq::SliceRandom;

use crate::codec::RasterCodec;
use crate::dataset::LockedDataset;
use crate::types::Key;

struct Slot<C: RasterCodec> {
    /// Cached key hash; 0 marks an empty slot.
    tag: u64,
    /// Last-access counter. Relaxed stores suffice: timestamps only bias
    /// eviction priority, so non-strict monotonicity under races is fine.
    atime: AtomicU64,
    value: Option<Arc<LockedDataset<C>>>,
}

pub struct DatasetPool<C: RasterCodec> {
    codec: Arc<C>,
    slots: RwLock<Vec<Slot<C>>>,
    clock: AtomicU64,
    occupied: AtomicUsize,
    capacity: usize,
}

impl<C: RasterCodec> DatasetPool<C> {
    pub fn new(codec: Arc<C>, capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                tag: 0,
                atime: AtomicU64::new(0),
                value: None,
            })
            .collect();
        Self {
            codec,
            slots: RwLock::new(slots),
            clock: AtomicU64::new(0),
            occupied: AtomicUsize::new(0),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots; never exceeds the capacity.
    pub fn size(&self) -> usize {
        self.occupied.load(Ordering::Relaxed)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.count(key) > 0
    }

    /// How many copies of `key` are currently pooled.
    pub fn count(&self, key: &Key) -> usize {
        let tag = key.tag();
        let slots = self.slots.read();
        slots
            .iter()
            .filter(|slot| slot.tag == tag && slot.value.as_ref().is_some_and(|v| v.key() == key))
            .count()
    }

    /// Fetch copies of `key`, opening new ones as needed.
    ///
    /// `copies > 0` tries hard for at least that many copies, blocking on
    /// the writer lock and evicting as needed. `copies < 0` tries softly
    /// for `|copies|`: the writer lock is only taken if it is free right
    /// now. `copies == 0` behaves as 1, hard.
    ///
    /// Every returned handle has had its use counter incremented exactly
    /// once; the caller must `dec()` each exactly once.
    pub fn get(&self, key: &Key, copies: i32) -> Vec<Arc<LockedDataset<C>>> {
        let tag = key.tag();
        let now = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        let mut found = Vec::new();

        {
            let slots = self.slots.read();
            for slot in slots.iter() {
                if slot.tag == tag {
                    if let Some(value) = &slot.value {
                        if value.key() == key {
                            value.inc();
                            slot.atime.store(now, Ordering::Relaxed);
                            found.push(Arc::clone(value));
                        }
                    }
                }
            }
        }
        if found.len() > 1 {
            // Spread callers across copies instead of all landing on slot 0.
            found.shuffle(&mut rand::thread_rng());
        }

        let want = if copies == 0 { 1 } else { copies.unsigned_abs() as usize };
        if found.len() >= want {
            return found;
        }

        if copies >= 0 {
            let mut slots = self.slots.write();
            while found.len() < want {
                match self.insert(&mut slots, tag, key) {
                    Some(value) => {
                        value.inc();
                        found.push(value);
                    }
                    None => break,
                }
            }
        } else if let Some(mut slots) = self.slots.try_write() {
            while found.len() < want {
                match self.insert(&mut slots, tag, key) {
                    Some(value) => {
                        value.inc();
                        found.push(value);
                    }
                    None => break,
                }
            }
        }

        found
    }

    /// Open a fresh copy of `key` into the best victim slot. Requires the
    /// writer lock (callers pass its guard), which is what makes the
    /// idle-check-then-overwrite sequence sound: no new handles can be
    /// handed out, and in-flight holders only ever release.
    fn insert(
        &self,
        slots: &mut [Slot<C>],
        tag: u64,
        key: &Key,
    ) -> Option<Arc<LockedDataset<C>>> {
        let now = self.clock.load(Ordering::Relaxed);
        let mut best: Option<(usize, u64)> = None;
        for (index, slot) in slots.iter().enumerate() {
            let atime = slot.atime.load(Ordering::Relaxed);
            if best.is_some_and(|(_, b)| atime >= b) {
                continue;
            }
            if slot.value.as_ref().map_or(true, |v| v.is_idle()) {
                best = Some((index, atime));
            }
        }
        let (index, _) = best?;

        match LockedDataset::open(self.codec.as_ref(), key.clone()) {
            Some(dataset) => {
                let value = Arc::new(dataset);
                let slot = &mut slots[index];
                if slot.value.is_none() {
                    self.occupied.fetch_add(1, Ordering::Relaxed);
                } else {
                    tracing::debug!(uri = %key.uri, slot = index, "evicting pooled dataset");
                }
                // An outstanding holder (if the old value raced a dec) keeps
                // the evicted pair alive until its own Arc drops.
                slot.value = Some(Arc::clone(&value));
                slot.tag = tag;
                slot.atime.store(now, Ordering::Relaxed);
                Some(value)
            }
            None => {
                // The open failed; leave the victim slot empty.
                let slot = &mut slots[index];
                if slot.value.take().is_some() {
                    self.occupied.fetch_sub(1, Ordering::Relaxed);
                }
                slot.tag = 0;
                slot.atime.store(0, Ordering::Relaxed);
                tracing::debug!(uri = %key.uri, "open failed, slot left empty");
                None
            }
        }
    }

    /// Empty every slot. Handles still outstanding keep their datasets
    /// alive until released; the slots themselves are reusable immediately.
    pub fn clear(&self) {
        let mut slots = self.slots.write();
        for slot in slots.iter_mut() {
            slot.tag = 0;
            slot.atime.store(0, Ordering::Relaxed);
            slot.value = None;
        }
        self.occupied.store(0, Ordering::Relaxed);
    }
}
