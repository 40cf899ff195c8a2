//! Per-kind subscriber bookkeeping
//!
//! The registry only holds data; it never calls a subscriber. The hub takes
//! a snapshot of [`Listener`]s under the lock and invokes them after
//! releasing it, so a callback may subscribe or unsubscribe freely.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::MotionError;
use crate::types::{SensorKind, SensorReading};

pub type ReadingCallback = Arc<dyn Fn(&SensorReading) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&MotionError) + Send + Sync>;

/// Opaque token returned by `subscribe`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(raw: u64) -> Self {
        SubscriptionId(raw)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// What a caller asks the hub for
pub struct SubscriptionRequest {
    pub(crate) kind: SensorKind,
    pub(crate) interval: Option<Duration>,
    pub(crate) one_shot: bool,
    pub(crate) on_reading: ReadingCallback,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl SubscriptionRequest {
    pub fn new<F>(kind: SensorKind, on_reading: F) -> Self
    where
        F: Fn(&SensorReading) + Send + Sync + 'static,
    {
        Self {
            kind,
            interval: None,
            one_shot: false,
            on_reading: Arc::new(on_reading),
            on_error: None,
        }
    }

    /// Requested update interval; the hub default applies when unset
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Cancel automatically after the first delivered reading
    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    /// Channel for per-sample failures; the stream keeps running
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&MotionError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }
}

pub struct Subscription {
    pub id: SubscriptionId,
    pub kind: SensorKind,
    pub interval: Duration,
    pub one_shot: bool,
    on_reading: ReadingCallback,
    on_error: Option<ErrorCallback>,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub(crate) fn from_request(
        id: SubscriptionId,
        request: SubscriptionRequest,
        interval: Duration,
    ) -> Self {
        Subscription {
            id,
            kind: request.kind,
            interval,
            one_shot: request.one_shot,
            on_reading: request.on_reading,
            on_error: request.on_error,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    fn listener(&self) -> Listener {
        Listener {
            id: self.id,
            one_shot: self.one_shot,
            on_reading: Arc::clone(&self.on_reading),
            on_error: self.on_error.clone(),
            active: Arc::clone(&self.active),
        }
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Snapshot of one subscriber, safe to call without holding the registry
#[derive(Clone)]
pub struct Listener {
    pub id: SubscriptionId,
    pub one_shot: bool,
    on_reading: ReadingCallback,
    on_error: Option<ErrorCallback>,
    active: Arc<AtomicBool>,
}

impl Listener {
    /// Deliver unless cancelled meanwhile; a one-shot fires at most once
    pub fn deliver(&self, reading: &SensorReading) -> bool {
        let live = if self.one_shot {
            self.active.swap(false, Ordering::SeqCst)
        } else {
            self.active.load(Ordering::SeqCst)
        };
        if live {
            (self.on_reading)(reading);
        }
        live
    }

    pub fn report(&self, err: &MotionError) -> bool {
        match &self.on_error {
            Some(on_error) if self.active.load(Ordering::SeqCst) => {
                on_error(err);
                true
            }
            _ => false,
        }
    }
}

/// Active subscriptions for one sensor kind, in registration order
pub struct SubscriptionRegistry {
    kind: SensorKind,
    entries: Vec<Subscription>,
}

impl SubscriptionRegistry {
    pub fn new(kind: SensorKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn insert(&mut self, subscription: Subscription) {
        debug_assert_eq!(subscription.kind, self.kind);
        self.entries.push(subscription);
    }

    /// Remove and deactivate; `None` for unknown ids
    pub fn remove(&mut self, id: SubscriptionId) -> Option<Subscription> {
        let index = self.entries.iter().position(|s| s.id == id)?;
        let subscription = self.entries.remove(index);
        subscription.deactivate();
        Some(subscription)
    }

    /// Drop every subscription, returning how many there were
    pub fn clear(&mut self) -> usize {
        for subscription in &self.entries {
            subscription.deactivate();
        }
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.iter().any(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fastest interval any subscriber asked for
    pub fn min_interval(&self) -> Option<Duration> {
        self.entries.iter().map(|s| s.interval).min()
    }

    /// Listeners for one reading: long-lived ones first, then one-shots.
    ///
    /// One-shots leave the registry here, so the next sample cannot reach them.
    pub fn take_for_dispatch(&mut self) -> Vec<Listener> {
        let mut listeners: Vec<Listener> = self
            .entries
            .iter()
            .filter(|s| !s.one_shot)
            .map(Subscription::listener)
            .collect();

        let mut one_shots = Vec::new();
        self.entries.retain(|s| {
            if s.one_shot {
                one_shots.push(s.listener());
                false
            } else {
                true
            }
        });
        listeners.extend(one_shots);
        listeners
    }

    /// Every subscriber that registered an error channel
    pub fn error_listeners(&self) -> Vec<Listener> {
        self.entries
            .iter()
            .filter(|s| s.on_error.is_some())
            .map(Subscription::listener)
            .collect()
    }
}
