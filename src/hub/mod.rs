//! Motion hub
//!
//! Maps every [`SensorKind`] to one [`SensorSource`] and its subscribers.
//! A source runs exactly while its kind has at least one subscription, at
//! the fastest interval any of them asked for.
//!
//! Callbacks run on the backend's delivery thread, one delivery at a time
//! per kind. They may subscribe or unsubscribe (their own id or any other)
//! but must not block on `get_current_value` for the kind they serve.

mod channel;
pub mod normalize;

use crossbeam::channel::{self as xchannel, RecvTimeoutError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use self::channel::Channel;
use crate::config::HubConfig;
use crate::error::{validate_interval, MotionError, MotionResult};
use crate::platform::SensorBackend;
use crate::registry::{Subscription, SubscriptionId, SubscriptionRequest};
use crate::source::relock;
use crate::types::{Attitude, MagneticAccuracy, SensorKind, SensorReading, Vector3};

struct HubInner {
    config: HubConfig,
    default_interval: Duration,
    current_value_interval: Duration,
    current_value_timeout: Duration,
    channels: BTreeMap<SensorKind, Arc<Channel>>,
    next_id: AtomicU64,
}

impl Drop for HubInner {
    fn drop(&mut self) {
        for channel in self.channels.values() {
            channel.cancel_all();
        }
    }
}

/// Builds a [`MotionHub`] with one backend per sensor kind.
///
/// Kinds without a backend behave like hardware the device lacks.
#[derive(Default)]
pub struct MotionHubBuilder {
    config: HubConfig,
    backends: BTreeMap<SensorKind, Arc<dyn SensorBackend>>,
}

impl MotionHubBuilder {
    pub fn config(mut self, config: HubConfig) -> Self {
        self.config = config;
        self
    }

    pub fn backend<B: SensorBackend + 'static>(mut self, kind: SensorKind, backend: Arc<B>) -> Self {
        self.backends.insert(kind, backend);
        self
    }

    pub fn build(mut self) -> MotionResult<MotionHub> {
        self.config.validate()?;

        let channels = SensorKind::ALL
            .iter()
            .map(|&kind| (kind, Channel::new(kind, self.backends.remove(&kind))))
            .collect();

        Ok(MotionHub {
            inner: Arc::new(HubInner {
                default_interval: self.config.default_interval()?,
                current_value_interval: self.config.current_value_interval()?,
                current_value_timeout: self.config.current_value_timeout()?,
                config: self.config,
                channels,
                next_id: AtomicU64::new(1),
            }),
        })
    }
}

/// Cheap to clone; every clone drives the same sources. Dropping the last
/// clone stops whatever is still running.
#[derive(Clone)]
pub struct MotionHub {
    inner: Arc<HubInner>,
}

impl MotionHub {
    pub fn builder() -> MotionHubBuilder {
        MotionHubBuilder::default()
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    fn channel(&self, kind: SensorKind) -> MotionResult<&Arc<Channel>> {
        self.inner
            .channels
            .get(&kind)
            .ok_or_else(|| MotionError::Internal(format!("no channel for {}", kind)))
    }

    /// Register a subscriber and make sure its source runs fast enough.
    ///
    /// Fails with `Unavailable` or `InvalidParameters` without registering anything.
    pub fn subscribe(&self, request: SubscriptionRequest) -> MotionResult<SubscriptionId> {
        let interval = match request.interval {
            Some(interval) => {
                validate_interval(interval)?;
                interval
            }
            None => self.inner.default_interval,
        };
        let channel = self.channel(request.kind)?;
        let id = SubscriptionId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        channel.subscribe(Subscription::from_request(id, request, interval))?;
        Ok(id)
    }

    /// Returns false for unknown or already cancelled ids
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.channels.values().any(|c| c.unsubscribe(id))
    }

    /// Block until the next reading of `kind` arrives.
    ///
    /// Sample errors during the wait are ignored. The temporary subscription
    /// is always removed before returning.
    pub fn get_current_value(
        &self,
        kind: SensorKind,
        timeout: Duration,
    ) -> MotionResult<SensorReading> {
        let (tx, rx) = xchannel::bounded(1);
        let request = SubscriptionRequest::new(kind, move |reading: &SensorReading| {
            let _ = tx.try_send(reading.clone());
        })
        .interval(self.inner.current_value_interval)
        .one_shot();

        let id = self.subscribe(request)?;
        let result = rx.recv_timeout(timeout);
        self.unsubscribe(id);

        match result {
            Ok(reading) => Ok(reading),
            Err(RecvTimeoutError::Timeout) => {
                log::debug!("{} current value timed out after {:?}", kind, timeout);
                Err(MotionError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(MotionError::Internal(format!(
                "{} subscription cancelled while waiting",
                kind
            ))),
        }
    }

    /// Async flavour of [`get_current_value`](Self::get_current_value).
    ///
    /// Dropping the future early also removes the subscription.
    pub async fn get_current_value_async(
        &self,
        kind: SensorKind,
        timeout: Duration,
    ) -> MotionResult<SensorReading> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let request = SubscriptionRequest::new(kind, move |reading: &SensorReading| {
            if let Some(tx) = relock(&slot).take() {
                let _ = tx.send(reading.clone());
            }
        })
        .interval(self.inner.current_value_interval)
        .one_shot();

        let id = self.subscribe(request)?;
        let _guard = UnsubscribeGuard { hub: self, id };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reading)) => Ok(reading),
            Ok(Err(_)) => Err(MotionError::Internal(format!(
                "{} subscription cancelled while waiting",
                kind
            ))),
            Err(_) => Err(MotionError::Timeout(timeout)),
        }
    }

    // Fused facets all share the one device-motion stream

    fn subscribe_facet<T, G, F>(
        &self,
        interval: Duration,
        facet: G,
        sink: F,
    ) -> MotionResult<SubscriptionId>
    where
        G: Fn(&SensorReading) -> Option<T> + Send + Sync + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let request = SubscriptionRequest::new(SensorKind::DeviceMotion, move |reading| {
            if let Some(value) = facet(reading) {
                sink(value);
            }
        })
        .interval(interval);
        self.subscribe(request)
    }

    pub fn subscribe_attitude<F>(&self, interval: Duration, sink: F) -> MotionResult<SubscriptionId>
    where
        F: Fn(Attitude) + Send + Sync + 'static,
    {
        self.subscribe_facet(interval, SensorReading::attitude, sink)
    }

    pub fn subscribe_gravity<F>(&self, interval: Duration, sink: F) -> MotionResult<SubscriptionId>
    where
        F: Fn(Vector3) + Send + Sync + 'static,
    {
        self.subscribe_facet(interval, SensorReading::gravity, sink)
    }

    /// Acceleration with gravity removed
    pub fn subscribe_user_acceleration<F>(
        &self,
        interval: Duration,
        sink: F,
    ) -> MotionResult<SubscriptionId>
    where
        F: Fn(Vector3) + Send + Sync + 'static,
    {
        self.subscribe_facet(interval, SensorReading::user_acceleration, sink)
    }

    pub fn subscribe_rotation_rate<F>(
        &self,
        interval: Duration,
        sink: F,
    ) -> MotionResult<SubscriptionId>
    where
        F: Fn(Vector3) + Send + Sync + 'static,
    {
        self.subscribe_facet(interval, SensorReading::rotation_rate, sink)
    }

    /// Calibrated field from the fused stream, with its accuracy
    pub fn subscribe_magnetic_field<F>(
        &self,
        interval: Duration,
        sink: F,
    ) -> MotionResult<SubscriptionId>
    where
        F: Fn((Vector3, MagneticAccuracy)) + Send + Sync + 'static,
    {
        self.subscribe_facet(interval, SensorReading::magnetic_field, sink)
    }

    fn current_facet<T>(&self, name: &str, facet: fn(&SensorReading) -> Option<T>) -> MotionResult<T> {
        let reading =
            self.get_current_value(SensorKind::DeviceMotion, self.inner.current_value_timeout)?;
        facet(&reading).ok_or_else(|| {
            MotionError::Internal(format!("{} reading carried no {}", reading.kind(), name))
        })
    }

    pub fn current_attitude(&self) -> MotionResult<Attitude> {
        self.current_facet("attitude", SensorReading::attitude)
    }

    pub fn current_gravity(&self) -> MotionResult<Vector3> {
        self.current_facet("gravity", SensorReading::gravity)
    }

    pub fn current_user_acceleration(&self) -> MotionResult<Vector3> {
        self.current_facet("user acceleration", SensorReading::user_acceleration)
    }

    pub fn current_rotation_rate(&self) -> MotionResult<Vector3> {
        self.current_facet("rotation rate", SensorReading::rotation_rate)
    }

    pub fn current_magnetic_field(&self) -> MotionResult<(Vector3, MagneticAccuracy)> {
        self.current_facet("magnetic field", SensorReading::magnetic_field)
    }

    /// Drop every subscription of `kind` and stop its source
    pub fn cancel_all(&self, kind: SensorKind) -> usize {
        self.channel(kind).map_or(0, |c| c.cancel_all())
    }

    pub fn stop_all(&self) -> usize {
        self.inner.channels.values().map(|c| c.cancel_all()).sum()
    }

    pub fn is_available(&self, kind: SensorKind) -> bool {
        self.channel(kind).map_or(false, |c| c.is_available())
    }

    pub fn is_running(&self, kind: SensorKind) -> bool {
        self.channel(kind).map_or(false, |c| c.is_running())
    }

    pub fn subscriber_count(&self, kind: SensorKind) -> usize {
        self.channel(kind).map_or(0, |c| c.subscriber_count())
    }

    /// Interval the hardware is configured at, `None` while stopped
    pub fn update_interval(&self, kind: SensorKind) -> Option<Duration> {
        self.channel(kind).ok().and_then(|c| c.interval())
    }
}

struct UnsubscribeGuard<'a> {
    hub: &'a MotionHub,
    id: SubscriptionId,
}

impl Drop for UnsubscribeGuard<'_> {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
