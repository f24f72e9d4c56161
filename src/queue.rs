//! Priority Queue - bounded, ordered store of pending executables.
//!
//! See `spec.md` §4.B. Entries are kept in a `BTreeMap` ordered by
//! `(priority descending, sequence ascending)`, with a side index from id to
//! key for O(log n) `delete`. This is the "ordered map" alternative the
//! spec's `DESIGN NOTES` calls out explicitly.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_stream::stream;
use futures::Stream;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::task::Executable;

/// Returned by [`PriorityQueue::enqueue`] when the queue is already at
/// `capacity`. This is the only operation that fails; `dequeue` and
/// `delete` never fail, they may only suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("queue is at capacity")]
pub(crate) struct LimitReached;

/// Orders entries by priority descending, then sequence ascending, without
/// negating `priority` (which would overflow at `i64::MIN`). `Reverse`
/// flips the comparison so the ascending `BTreeMap` order already matches
/// the spec's `(−priority, sequence)` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    priority: Reverse<i64>,
    sequence: u64,
}

struct QueueState {
    entries: BTreeMap<QueueKey, (u64, Executable)>,
    index: HashMap<u64, QueueKey>,
    capacity: usize,
    next_sequence: u64,
    next_id: u64,
}

impl QueueState {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The bounded, priority-ordered, FCFS-tie-broken queue shared between
/// submitters and the executor loop.
pub(crate) struct PriorityQueue {
    state: Mutex<QueueState>,
    not_empty: Notify,
}

impl PriorityQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be greater than zero");
        Self {
            state: Mutex::new(QueueState {
                entries: BTreeMap::new(),
                index: HashMap::new(),
                capacity,
                next_sequence: 0,
                next_id: 0,
            }),
            not_empty: Notify::new(),
        }
    }

    /// Inserts `item` at `priority`, failing with [`LimitReached`] if the
    /// queue is already at capacity. Wakes exactly one dequeue waiter.
    pub(crate) fn enqueue(&self, item: Executable, priority: i64) -> Result<u64, LimitReached> {
        let mut state = self.state.lock().unwrap();
        if state.len() >= state.capacity {
            return Err(LimitReached);
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let id = state.next_id;
        state.next_id += 1;

        let key = QueueKey {
            priority: Reverse(priority),
            sequence,
        };
        state.entries.insert(key, (id, item));
        state.index.insert(id, key);

        trace!(id, priority, sequence, "enqueued");
        drop(state);
        self.not_empty.notify_one();
        Ok(id)
    }

    /// Removes and returns the highest-priority, earliest-sequenced entry,
    /// suspending until one is available. A waiter that is notified but
    /// finds the queue empty (lost the race to another dequeuer) re-suspends
    /// rather than returning a spurious result.
    pub(crate) async fn dequeue(&self) -> Executable {
        loop {
            {
                let mut state = self.state.lock().unwrap();
                if let Some((&key, _)) = state.entries.iter().next() {
                    let (id, item) = state.entries.remove(&key).expect("key just observed");
                    state.index.remove(&id);
                    trace!(id, sequence = key.sequence, "dequeued");
                    return item;
                }
            }
            self.not_empty.notified().await;
        }
    }

    /// Removes the entry with the given id if it is still queued. Returns
    /// `true` if an entry was removed (it had not yet been dequeued),
    /// `false` if no such entry exists (already dequeued, or never
    /// existed).
    pub(crate) fn delete(&self, id: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.index.remove(&id) {
            Some(key) => {
                state.entries.remove(&key);
                debug!(id, "deleted queued entry before admission");
                true
            }
            None => false,
        }
    }

    /// A best-effort, possibly-stale snapshot of the current queue size.
    pub(crate) fn size(&self) -> usize {
        self.state.lock().unwrap().len()
    }

    /// Drains every still-queued entry, in no particular order. Used only
    /// at shutdown, where what matters is that every entry is removed and
    /// handed to the caller for cancellation, not the order it happens in.
    pub(crate) fn drain(&self) -> Vec<Executable> {
        let mut state = self.state.lock().unwrap();
        state.index.clear();
        std::mem::take(&mut state.entries)
            .into_values()
            .map(|(_, item)| item)
            .collect()
    }

    /// An unending stream of dequeued items, used by the executor loop.
    pub(crate) fn dequeue_all(self: std::sync::Arc<Self>) -> impl Stream<Item = Executable> + 'static {
        stream! {
            loop {
                yield self.dequeue().await;
            }
        }
    }
}
