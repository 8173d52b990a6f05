//! Deterministic single-threaded task scheduling.
//!
//! Every periodic process in a session (the 1 Hz clock, the spawn cadence,
//! per-target expiries, puzzle-advance delays) is an entry here rather than
//! an ad hoc interval handle. The host loop advances the scheduler with wall
//! time deltas; tests advance it with exact millisecond steps.

pub type TaskId = u64;

#[derive(Debug)]
struct Entry<T> {
    id: TaskId,
    due_ms: u64,
    period_ms: Option<u64>,
    payload: T,
}

/// A logical-clock scheduler. Tasks fire in due order (ties break by
/// scheduling order) when `advance` moves the clock past their deadline.
/// One-shots are dropped after firing; periodic tasks are re-armed.
#[derive(Debug)]
pub struct Scheduler<T> {
    now_ms: u64,
    next_id: TaskId,
    entries: Vec<Entry<T>>,
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_id: 1,
            entries: Vec::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Schedule a one-shot `delay_ms` from now.
    pub fn once(&mut self, delay_ms: u64, payload: T) -> TaskId {
        self.push(delay_ms, None, payload)
    }

    /// Schedule a repeating task; first fire is one full period from now.
    pub fn every(&mut self, period_ms: u64, payload: T) -> TaskId {
        self.push(period_ms, Some(period_ms.max(1)), payload)
    }

    fn push(&mut self, delay_ms: u64, period_ms: Option<u64>, payload: T) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            due_ms: self.now_ms + delay_ms,
            period_ms,
            payload,
        });
        id
    }

    /// Remove a task if it is still pending. Cancelling an already-fired or
    /// unknown id is a no-op.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Drop every pending task. Used exactly once per session, on
    /// termination.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Move the clock forward and return the payloads of everything that
    /// came due, in firing order. A delta spanning several periods of a
    /// repeating task yields one payload per missed period.
    pub fn advance(&mut self, delta_ms: u64) -> Vec<T> {
        self.now_ms += delta_ms;
        let now = self.now_ms;

        let mut fired: Vec<(u64, TaskId, T)> = Vec::new();
        let mut remaining: Vec<Entry<T>> = Vec::with_capacity(self.entries.len());

        for mut entry in self.entries.drain(..) {
            match entry.period_ms {
                Some(period) => {
                    while entry.due_ms <= now {
                        fired.push((entry.due_ms, entry.id, entry.payload.clone()));
                        entry.due_ms += period;
                    }
                    remaining.push(entry);
                }
                None => {
                    if entry.due_ms <= now {
                        fired.push((entry.due_ms, entry.id, entry.payload));
                    } else {
                        remaining.push(entry);
                    }
                }
            }
        }

        self.entries = remaining;
        fired.sort_by_key(|(due, id, _)| (*due, *id));
        fired.into_iter().map(|(_, _, payload)| payload).collect()
    }
}

impl<T: Clone> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
