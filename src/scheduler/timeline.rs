//! Virtual-time task queue with delay, repeat and next-tick tasks

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Smallest period a repeating task may use
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle returned for every scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskToken(u64);

/// Lifetime a task is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskScope {
    /// Invalidated whenever the phase changes, including re-entry
    Phase,
    /// Invalidated when a new map starts
    Map,
    /// Invalidated by a full reset
    Session,
    /// Never invalidated by epochs, only by explicit cancel
    Detached,
}

/// Scope plus the epoch value current when the task was registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeStamp {
    pub scope: TaskScope,
    pub epoch: u64,
}

/// Epoch counters for each invalidating scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Epochs {
    phase: u64,
    map: u64,
    session: u64,
}

impl Epochs {
    pub fn stamp(&self, scope: TaskScope) -> ScopeStamp {
        let epoch = match scope {
            TaskScope::Phase => self.phase,
            TaskScope::Map => self.map,
            TaskScope::Session => self.session,
            TaskScope::Detached => 0,
        };
        ScopeStamp { scope, epoch }
    }

    pub fn is_current(&self, stamp: &ScopeStamp) -> bool {
        self.stamp(stamp.scope).epoch == stamp.epoch
    }

    pub fn bump_phase(&mut self) {
        self.phase += 1;
    }

    pub fn bump_map(&mut self) {
        self.map += 1;
    }

    /// A session bump also ends the current phase and map
    pub fn bump_session(&mut self) {
        self.session += 1;
        self.phase += 1;
        self.map += 1;
    }
}

#[derive(Debug, Clone)]
struct Entry<A> {
    token: TaskToken,
    stamp: ScopeStamp,
    action: A,
    period: Option<Duration>,
}

/// A task whose fire time has been reached
#[derive(Debug, Clone, PartialEq)]
pub struct DueTask<A> {
    pub token: TaskToken,
    pub stamp: ScopeStamp,
    pub action: A,
    pub fired_at: Duration,
}

/// Ordered queue of tasks keyed by virtual fire time.
///
/// Tasks scheduled for the same instant fire in registration order. A task
/// scheduled with zero delay fires on the next call to [`Timeline::pop_due`].
#[derive(Debug, Clone)]
pub struct Timeline<A> {
    now: Duration,
    next_token: u64,
    next_seq: u64,
    queue: BTreeMap<(Duration, u64), Entry<A>>,
    index: HashMap<TaskToken, (Duration, u64)>,
}

impl<A: Clone> Default for Timeline<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Clone> Timeline<A> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_token: 0,
            next_seq: 0,
            queue: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of live tasks, including stale ones not yet drained
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Run `action` once after `delay`
    pub fn schedule(&mut self, delay: Duration, stamp: ScopeStamp, action: A) -> TaskToken {
        let token = self.allocate_token();
        self.insert(self.now + delay, token, stamp, action, None);
        token
    }

    /// Run `action` on the next processing tick
    pub fn schedule_next_tick(&mut self, stamp: ScopeStamp, action: A) -> TaskToken {
        self.schedule(Duration::ZERO, stamp, action)
    }

    /// Run `action` every `period`, first after one period
    pub fn schedule_repeating(
        &mut self,
        period: Duration,
        stamp: ScopeStamp,
        action: A,
    ) -> TaskToken {
        let period = period.max(MIN_PERIOD);
        let token = self.allocate_token();
        self.insert(self.now + period, token, stamp, action, Some(period));
        token
    }

    /// Cancel a task. Returns false if it already fired or was never known.
    pub fn cancel(&mut self, token: TaskToken) -> bool {
        match self.index.remove(&token) {
            Some(key) => self.queue.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn is_scheduled(&self, token: TaskToken) -> bool {
        self.index.contains_key(&token)
    }

    /// Drop every task whose scope epoch is no longer current
    pub fn purge_stale(&mut self, epochs: &Epochs) -> usize {
        let stale: Vec<(Duration, u64)> = self
            .queue
            .iter()
            .filter(|(_, entry)| !epochs.is_current(&entry.stamp))
            .map(|(key, _)| *key)
            .collect();
        for key in &stale {
            if let Some(entry) = self.queue.remove(key) {
                self.index.remove(&entry.token);
            }
        }
        stale.len()
    }

    /// Pop the earliest task due at or before `until`, moving the clock to its
    /// fire time. Repeating tasks are re-queued one period later.
    pub fn pop_due(&mut self, until: Duration) -> Option<DueTask<A>> {
        let key = *self.queue.keys().next()?;
        if key.0 > until {
            return None;
        }
        let entry = self.queue.remove(&key)?;
        self.index.remove(&entry.token);
        let fired_at = key.0.max(self.now);
        self.now = fired_at;

        if let Some(period) = entry.period {
            self.insert(
                fired_at + period,
                entry.token,
                entry.stamp,
                entry.action.clone(),
                Some(period),
            );
        }

        Some(DueTask {
            token: entry.token,
            stamp: entry.stamp,
            action: entry.action,
            fired_at,
        })
    }

    /// Move the clock forward once all due tasks have been drained
    pub fn settle(&mut self, until: Duration) {
        if until > self.now {
            self.now = until;
        }
    }

    fn allocate_token(&mut self) -> TaskToken {
        self.next_token += 1;
        TaskToken(self.next_token)
    }

    fn insert(
        &mut self,
        at: Duration,
        token: TaskToken,
        stamp: ScopeStamp,
        action: A,
        period: Option<Duration>,
    ) {
        self.next_seq += 1;
        let key = (at, self.next_seq);
        self.queue.insert(
            key,
            Entry {
                token,
                stamp,
                action,
                period,
            },
        );
        self.index.insert(token, key);
    }
}
