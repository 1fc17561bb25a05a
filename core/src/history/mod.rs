//! Log history ring buffer
//!
//! Fixed-capacity circular store of recent entries, addressed by absolute
//! write index. Index `i` lives in slot `i % capacity` until the ring wraps
//! past it.
//!
//! # Backlog
//!
//! While at least one backlog lock is held (see [`LogHistory::pin`]), every
//! entry about to be evicted is copied into an oldest-first side list, so a
//! consumer scrolled back through old entries doesn't lose them. Releasing
//! the last lock drops the backlog. The side list is separate from the ring,
//! so the common unpinned path never allocates.
//!
//! # Concurrency
//!
//! One global lock covers the head counter, slot table, backlog and lock
//! count. It is held only to claim an index (plus sharing the evicted entry
//! with the backlog when pinned). Each slot holds an `Arc<LogEntry>` behind
//! its own lock, which is only ever held to swap or clone that `Arc`:
//!
//! - writers fill the claimed slot outside the global lock, in place when
//!   nobody else holds the entry, otherwise by swapping in a new one;
//! - readers clone the slot's `Arc` and release the lock before calling
//!   back, so callbacks may freely query the history or log.
//!
//! Each write stamps the entry with its `(generation, index)`: a late writer
//! never clobbers a newer write, and readers only see an entry whose stamp
//! matches the index they asked for.


use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::builder::LogRecordBuilder;
use crate::entry::{LogEntry, SlotStamp};

/// History capacity used when none is configured
pub const DEFAULT_HISTORY_CAPACITY: usize = 1024;

/// Backlog capacity above which it is shrunk once backlogging stops
pub const DEFAULT_BACKLOG_SHRINK_THRESHOLD: usize = 4096;

type Slot = Arc<Mutex<Arc<LogEntry>>>;

fn new_slot() -> Slot {
    slot_holding(Arc::new(LogEntry::new()))
}

fn slot_holding(entry: Arc<LogEntry>) -> Slot {
    Arc::new(Mutex::new(entry))
}

fn lock_slot(slot: &Mutex<Arc<LogEntry>>) -> MutexGuard<'_, Arc<LogEntry>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Entry currently held by a slot
fn current_entry(slot: &Mutex<Arc<LogEntry>>) -> Arc<LogEntry> {
    Arc::clone(&lock_slot(slot))
}

/// Where an absolute index currently lives
enum Located {
    Ring(Slot),
    Backlog(Arc<LogEntry>),
}

/// Point-in-time view of the history counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryStats {
    pub capacity: usize,
    pub head: usize,
    pub first_visible_index: usize,
    pub visible_count: usize,
    pub backlog_len: usize,
    pub backlog_locks: usize,
    pub clear_generation: u64,
}

struct HistoryState {
    slots: Vec<Slot>,
    /// Total writes since the last clear; never wraps
    head: usize,
    generation: u64,
    /// Lowest index that may still be retrievable
    floor: usize,
    backlog_locks: usize,
    /// Evicted entries, oldest first
    backlog: Vec<Arc<LogEntry>>,
}

impl HistoryState {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn live_start(&self) -> usize {
        self.head.saturating_sub(self.capacity())
    }

    fn first_visible_index(&self) -> usize {
        self.live_start()
            .saturating_sub(self.backlog.len())
            .max(self.floor)
            .min(self.head)
    }

    fn claim(&mut self) -> (Slot, SlotStamp) {
        let capacity = self.capacity();
        let index = self.head;
        let slot = Arc::clone(&self.slots[index % capacity]);
        if self.backlog_locks > 0 && index >= capacity {
            self.backlog.push(current_entry(&slot));
        }
        self.head += 1;
        let stamp = SlotStamp {
            generation: self.generation,
            index,
        };
        (slot, stamp)
    }

    fn locate(&self, index: usize) -> Option<Located> {
        if index >= self.head || index < self.floor {
            return None;
        }
        let live_start = self.live_start();
        if index >= live_start {
            let slot = &self.slots[index % self.capacity()];
            return Some(Located::Ring(Arc::clone(slot)));
        }
        let offset = live_start - index;
        let len = self.backlog.len();
        (offset <= len).then(|| Located::Backlog(Arc::clone(&self.backlog[len - offset])))
    }

    /// Index range `[start, head)` to visit, clipped to the newest `max_count`
    fn visible_range(&self, max_count: Option<usize>) -> (usize, usize) {
        let first = self.first_visible_index();
        let start = match max_count {
            Some(max) => first.max(self.head.saturating_sub(max)),
            None => first,
        };
        (start, self.head)
    }

    fn stats(&self) -> HistoryStats {
        let first_visible_index = self.first_visible_index();
        HistoryStats {
            capacity: self.capacity(),
            head: self.head,
            first_visible_index,
            visible_count: self.head - first_visible_index,
            backlog_len: self.backlog.len(),
            backlog_locks: self.backlog_locks,
            clear_generation: self.generation,
        }
    }

    fn drop_backlog(&mut self) {
        self.backlog.clear();
    }
}

/// Fixed-capacity, thread-safe log history with a backlog overflow
pub struct LogHistory {
    state: Mutex<HistoryState>,
    backlog_shrink_threshold: usize,
}

impl Default for LogHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl LogHistory {
    /// Create a history holding `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        Self::with_backlog_shrink_threshold(capacity, DEFAULT_BACKLOG_SHRINK_THRESHOLD)
    }

    pub fn with_backlog_shrink_threshold(capacity: usize, backlog_shrink_threshold: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(HistoryState {
                slots: (0..capacity).map(|_| new_slot()).collect(),
                head: 0,
                generation: 0,
                floor: 0,
                backlog_locks: 0,
                backlog: Vec::new(),
            }),
            backlog_shrink_threshold,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Append
    // =========================================================================

    /// Commit a record, returning its absolute index
    ///
    /// # Panics
    ///
    /// Panics if the record holds more than
    /// [`MAX_VALUES`](crate::MAX_VALUES) values.
    pub fn add(&self, record: LogRecordBuilder) -> usize {
        self.commit(record).0
    }

    /// Commit a record and run `committed` on the stored entry
    ///
    /// `committed` runs after every lock is released. It is skipped if a
    /// newer write already reached the slot.
    pub fn add_with(&self, record: LogRecordBuilder, committed: impl FnOnce(&LogEntry)) -> usize {
        let (index, entry) = self.commit(record);
        if let Some(entry) = entry {
            committed(&entry);
        }
        index
    }

    /// Commit a record, returning its index and the stored entry
    ///
    /// The entry is `None` if a newer write already reached the slot.
    pub fn commit(&self, record: LogRecordBuilder) -> (usize, Option<Arc<LogEntry>>) {
        let (slot, stamp) = self.lock_state().claim();

        // Previous contents are dropped only after the slot lock is released.
        let mut replaced_in_place = None;
        let mut replaced_shared = None;
        let committed = {
            let mut current = lock_slot(&slot);
            if current.stamp.is_some_and(|newer| newer > stamp) {
                return (stamp.index, None);
            }
            if let Some(entry) = Arc::get_mut(&mut *current) {
                replaced_in_place = Some(std::mem::take(entry));
                entry.set(record);
                entry.stamp = Some(stamp);
            } else {
                let mut entry = LogEntry::new();
                entry.set(record);
                entry.stamp = Some(stamp);
                replaced_shared = Some(std::mem::replace(&mut *current, Arc::new(entry)));
            }
            Arc::clone(&current)
        };
        drop(replaced_in_place);
        drop(replaced_shared);
        (stamp.index, Some(committed))
    }

    // =========================================================================
    // Query
    // =========================================================================

    /// Shared snapshot of the entry at absolute `index`, if still retrievable
    ///
    /// The snapshot stays valid after the slot is overwritten.
    pub fn get_log(&self, index: usize) -> Option<Arc<LogEntry>> {
        let (located, generation) = {
            let state = self.lock_state();
            (state.locate(index)?, state.generation)
        };
        let entry = match located {
            Located::Ring(slot) => current_entry(&slot),
            Located::Backlog(entry) => entry,
        };
        (entry.stamp == Some(SlotStamp { generation, index })).then_some(entry)
    }

    /// Run `f` on the entry at absolute `index`, if it is still retrievable
    ///
    /// No lock is held while `f` runs.
    pub fn with_log<R>(&self, index: usize, f: impl FnOnce(&LogEntry) -> R) -> Option<R> {
        self.get_log(index).map(|entry| f(&entry))
    }

    /// Visit visible entries from newest to oldest
    ///
    /// `max_count` limits the walk to the newest `max_count` indices;
    /// `None` visits everything visible. Missing entries are skipped.
    pub fn for_each_newest_to_oldest(
        &self,
        max_count: Option<usize>,
        mut f: impl FnMut(usize, &LogEntry),
    ) {
        let (start, end) = self.lock_state().visible_range(max_count);
        for index in (start..end).rev() {
            self.with_log(index, |entry| f(index, entry));
        }
    }

    /// Visit visible entries from oldest to newest
    ///
    /// See [`for_each_newest_to_oldest`](Self::for_each_newest_to_oldest)
    /// for the meaning of `max_count`.
    pub fn for_each_oldest_to_newest(
        &self,
        max_count: Option<usize>,
        mut f: impl FnMut(usize, &LogEntry),
    ) {
        let (start, end) = self.lock_state().visible_range(max_count);
        for index in start..end {
            self.with_log(index, |entry| f(index, entry));
        }
    }

    /// Number of ring slots
    pub fn capacity(&self) -> usize {
        self.lock_state().capacity()
    }

    /// Total writes since the last clear
    pub fn head(&self) -> usize {
        self.lock_state().head
    }

    /// Incremented by every [`clear`](Self::clear)
    ///
    /// Consumers caching indices compare generations to detect that their
    /// cache is stale.
    pub fn clear_generation(&self) -> u64 {
        self.lock_state().generation
    }

    /// Oldest index that may still be retrieved
    pub fn first_visible_index(&self) -> usize {
        self.lock_state().first_visible_index()
    }

    /// Number of indices in `[first_visible_index, head)`
    pub fn visible_count(&self) -> usize {
        let state = self.lock_state();
        state.head - state.first_visible_index()
    }

    pub fn backlog_len(&self) -> usize {
        self.lock_state().backlog.len()
    }

    pub fn backlog_lock_count(&self) -> usize {
        self.lock_state().backlog_locks
    }

    pub fn stats(&self) -> HistoryStats {
        self.lock_state().stats()
    }

    // =========================================================================
    // Control
    // =========================================================================

    /// Start preserving entries that would otherwise be evicted
    ///
    /// Calls nest; each must be matched by
    /// [`stop_backlogging`](Self::stop_backlogging).
    pub fn start_backlogging(&self) {
        self.lock_state().backlog_locks += 1;
    }

    /// Release one backlog lock; the last release drops the backlog
    ///
    /// Unbalanced calls are ignored rather than driving the count negative.
    pub fn stop_backlogging(&self) {
        let mut state = self.lock_state();
        if state.backlog_locks == 0 {
            drop(state);
            warn!("stop_backlogging called without a matching start");
            return;
        }
        state.backlog_locks -= 1;
        if state.backlog_locks > 0 {
            return;
        }
        state.drop_backlog();
        if state.backlog.capacity() > self.backlog_shrink_threshold {
            let capacity = state.capacity();
            state.backlog.shrink_to(capacity);
        }
    }

    /// Hold a backlog lock for the lifetime of the returned guard
    pub fn pin(&self) -> BacklogPin<'_> {
        self.start_backlogging();
        BacklogPin { history: self }
    }

    /// Forget all entries
    ///
    /// Resets the head to zero and bumps the clear generation. Ring slots, the
    /// backlog lock count and the backlog's reserved memory are kept.
    ///
    /// Unlike a plain head reset, this also drops the backlogged entries, even
    /// while pinned. Their indices belong to the previous generation and could
    /// never be retrieved again.
    pub fn clear(&self) {
        let generation = {
            let mut state = self.lock_state();
            state.head = 0;
            state.floor = 0;
            state.generation += 1;
            state.drop_backlog();
            state.generation
        };
        debug!(generation, "log history cleared");
    }

    /// Change the ring capacity, keeping retrievable entries in order
    ///
    /// A size of zero or the current capacity does nothing. Shrinking while
    /// pinned moves entries that fall out of the ring into the backlog;
    /// growing refills the ring from the newest backlogged entries.
    pub fn set_max_history_count(&self, new_capacity: usize) {
        let old_capacity = {
            let mut state = self.lock_state();
            let old_capacity = state.capacity();
            if new_capacity == 0 || new_capacity == old_capacity {
                return;
            }
            state.resize(new_capacity);
            old_capacity
        };
        debug!(old_capacity, new_capacity, "log history resized");
    }
}

impl HistoryState {
    fn resize(&mut self, new_capacity: usize) {
        let old_capacity = self.capacity();
        let head = self.head;
        let old_live = self.live_start();
        let new_live = head.saturating_sub(new_capacity);

        let mut old_slots: Vec<Option<Slot>> =
            std::mem::take(&mut self.slots).into_iter().map(Some).collect();
        let mut new_slots: Vec<Option<Slot>> = (0..new_capacity).map(|_| None).collect();

        for index in old_live.max(new_live)..head {
            new_slots[index % new_capacity] = old_slots[index % old_capacity].take();
        }

        if new_live < old_live {
            // Grown past the old live range: refill from the backlog's newest end.
            let mut index = old_live;
            while index > new_live {
                let Some(entry) = self.backlog.pop() else {
                    break;
                };
                index -= 1;
                new_slots[index % new_capacity] = Some(slot_holding(entry));
            }
            if index > new_live {
                self.floor = self.floor.max(index);
            }
        } else if self.backlog_locks > 0 {
            // Shrunk while pinned: entries leaving the ring join the backlog.
            for index in old_live..new_live {
                if let Some(slot) = old_slots[index % old_capacity].take() {
                    self.backlog.push(current_entry(&slot));
                }
            }
        }

        self.slots = new_slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(new_slot))
            .collect();
    }
}

/// Guard holding one backlog lock; see [`LogHistory::pin`]
#[must_use = "the backlog lock is released when the pin is dropped"]
pub struct BacklogPin<'a> {
    history: &'a LogHistory,
}

impl Drop for BacklogPin<'_> {
    fn drop(&mut self) {
        self.history.stop_backlogging();
    }
}
