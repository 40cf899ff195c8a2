// One SensorKind's source and registry, plus the dispatch path between them.
//
// Lock order: registry -> source lifecycle -> source state. The registry lock
// is never held while a subscriber runs, and never while waiting for a
// delivery to drain.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use super::normalize::normalize;
use crate::error::{MotionError, MotionResult};
use crate::platform::SensorBackend;
use crate::registry::{Subscription, SubscriptionId, SubscriptionRegistry};
use crate::source::{relock, ErrorHandler, SampleHandler, SensorSource};
use crate::types::{RawSample, SensorKind};

pub(crate) struct Channel {
    kind: SensorKind,
    source: SensorSource,
    registry: Mutex<SubscriptionRegistry>,
}

impl Channel {
    pub(crate) fn new(kind: SensorKind, backend: Option<Arc<dyn SensorBackend>>) -> Arc<Self> {
        Arc::new(Channel {
            kind,
            source: SensorSource::new(kind, backend),
            registry: Mutex::new(SubscriptionRegistry::new(kind)),
        })
    }

    pub(crate) fn is_available(&self) -> bool {
        self.source.is_available()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.source.is_running()
    }

    pub(crate) fn interval(&self) -> Option<Duration> {
        self.source.interval()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        relock(&self.registry).len()
    }

    pub(crate) fn subscribe(self: &Arc<Self>, subscription: Subscription) -> MotionResult<()> {
        let mut registry = relock(&self.registry);

        if !self.source.is_available() {
            return Err(MotionError::Unavailable(self.kind));
        }

        let id = subscription.id;
        let requested = subscription.interval;
        registry.insert(subscription);
        let interval = registry.min_interval().unwrap_or(requested);

        if let Err(err) = self
            .source
            .start(interval, self.sample_handler(), self.error_handler())
        {
            registry.remove(id);
            return Err(err);
        }

        log::debug!(
            "{} subscribed to {} ({} active, hardware at {:?})",
            id,
            self.kind,
            registry.len(),
            interval
        );
        Ok(())
    }

    /// Returns false for ids this channel does not hold
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let halted = {
            let mut registry = relock(&self.registry);
            if registry.remove(id).is_none() {
                return false;
            }
            log::debug!("{} unsubscribed from {} ({} left)", id, self.kind, registry.len());
            self.settle(&registry)
        };
        if halted {
            self.source.drain();
        }
        true
    }

    /// Drop every subscription and stop the source
    pub(crate) fn cancel_all(&self) -> usize {
        let (count, halted) = {
            let mut registry = relock(&self.registry);
            let count = registry.clear();
            (count, self.source.halt())
        };
        if halted {
            self.source.drain();
        }
        count
    }

    // Keep "running iff subscribed" and the min-interval rule after a removal.
    // Returns whether the source was halted and still needs draining.
    fn settle(&self, registry: &SubscriptionRegistry) -> bool {
        match registry.min_interval() {
            None => self.source.halt(),
            Some(interval) => {
                if let Err(err) = self.source.set_interval(interval) {
                    log::warn!("{} could not relax interval: {}", self.kind, err);
                }
                false
            }
        }
    }

    fn sample_handler(self: &Arc<Self>) -> SampleHandler {
        let channel: Weak<Channel> = Arc::downgrade(self);
        Arc::new(move |raw: RawSample| {
            if let Some(channel) = channel.upgrade() {
                channel.dispatch_sample(raw);
            }
        })
    }

    fn error_handler(self: &Arc<Self>) -> ErrorHandler {
        let channel: Weak<Channel> = Arc::downgrade(self);
        Arc::new(move |err: MotionError| {
            if let Some(channel) = channel.upgrade() {
                channel.dispatch_error(err);
            }
        })
    }

    // Runs on the backend's delivery thread, under the source gate
    fn dispatch_sample(&self, raw: RawSample) {
        let reading = match normalize(self.kind, raw) {
            Ok(reading) => reading,
            Err(err) => return self.dispatch_error(err),
        };

        let listeners = {
            let mut registry = relock(&self.registry);
            let listeners = registry.take_for_dispatch();
            if listeners.iter().any(|l| l.one_shot) {
                // Already on the delivery thread: halting needs no drain
                self.settle(&registry);
            }
            listeners
        };

        for listener in &listeners {
            listener.deliver(&reading);
        }
    }

    fn dispatch_error(&self, err: MotionError) {
        // Subscribers only ever see per-sample failures; the stream survives
        let err = if err.is_recoverable() {
            err
        } else {
            MotionError::SampleError(err.to_string())
        };
        log::warn!("{} {}", self.kind, err);

        let listeners = relock(&self.registry).error_listeners();
        for listener in &listeners {
            listener.report(&err);
        }
    }
}
