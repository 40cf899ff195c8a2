//! One sensor stream bound to its host backend
//!
//! `SensorSource` turns the bare backend contract into one with the
//! guarantees the hub relies on:
//!   - `start` on a running source only reconfigures the interval
//!   - `stop` is always safe and, once it returns outside a delivery, no
//!     handler runs again
//!
//! Every delivery runs under a per-source gate. `stop` flips the source to a
//! new generation (so stale callbacks are ignored) and then waits on the gate
//! for an in-flight delivery to drain. Called from inside any delivery, of
//! this source or another, it does not wait: two delivery threads stopping
//! each other's source would otherwise hold one gate each and wait forever.

use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{validate_interval, MotionError, MotionResult};
use crate::platform::{PlatformCallback, PlatformResult, SensorBackend};
use crate::types::{RawSample, SensorKind};

pub type SampleHandler = Arc<dyn Fn(RawSample) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(MotionError) + Send + Sync>;

/// Lock that survives a panicking subscriber
pub(crate) fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct SourceState {
    running: bool,
    generation: u64,
    interval: Option<Duration>,
}

#[derive(Default)]
struct SourceShared {
    state: Mutex<SourceState>,
    gate: Mutex<()>,
}

impl SourceShared {
    fn is_live(&self, generation: u64) -> bool {
        let state = relock(&self.state);
        state.running && state.generation == generation
    }
}

thread_local! {
    // Deliveries, of any source, the current thread is inside of
    static DELIVERY_DEPTH: Cell<usize> = Cell::new(0);
}

fn in_delivery() -> bool {
    DELIVERY_DEPTH.with(|depth| depth.get() > 0)
}

/// Counts the current thread as delivering until dropped
struct DeliveryMark;

impl DeliveryMark {
    fn enter() -> Self {
        DELIVERY_DEPTH.with(|depth| depth.set(depth.get() + 1));
        DeliveryMark
    }
}

impl Drop for DeliveryMark {
    fn drop(&mut self) {
        DELIVERY_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

pub struct SensorSource {
    kind: SensorKind,
    backend: Option<Arc<dyn SensorBackend>>,
    lifecycle: Mutex<()>,
    shared: Arc<SourceShared>,
}

impl SensorSource {
    /// `None` models a device that lacks this sensor entirely
    pub fn new(kind: SensorKind, backend: Option<Arc<dyn SensorBackend>>) -> Self {
        Self {
            kind,
            backend,
            lifecycle: Mutex::new(()),
            shared: Arc::new(SourceShared::default()),
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn is_available(&self) -> bool {
        self.backend.as_ref().map_or(false, |b| b.is_available())
    }

    pub fn is_running(&self) -> bool {
        relock(&self.shared.state).running
    }

    /// Interval the hardware is currently configured at
    pub fn interval(&self) -> Option<Duration> {
        relock(&self.shared.state).interval
    }

    /// Begin delivery, or retune the interval of the stream already running.
    ///
    /// Handlers are only installed by the call that actually starts the
    /// stream; a restart keeps the ones already in place.
    pub fn start(
        &self,
        interval: Duration,
        on_sample: SampleHandler,
        on_error: ErrorHandler,
    ) -> MotionResult<()> {
        validate_interval(interval)?;
        let backend = match &self.backend {
            Some(backend) if backend.is_available() => Arc::clone(backend),
            _ => return Err(MotionError::Unavailable(self.kind)),
        };

        let _lifecycle = relock(&self.lifecycle);

        let generation = {
            let mut state = relock(&self.shared.state);
            if state.running {
                None
            } else {
                state.running = true;
                state.generation += 1;
                state.interval = Some(interval);
                Some(state.generation)
            }
        };
        let Some(generation) = generation else {
            self.retune(backend.as_ref(), interval);
            return Ok(());
        };

        backend.set_update_interval(interval);
        let callback = self.delivery_callback(generation, on_sample, on_error);
        if let Err(err) = backend.start(callback) {
            let mut state = relock(&self.shared.state);
            if state.generation == generation {
                state.running = false;
                state.interval = None;
            }
            log::warn!("{} failed to start: {}", self.kind, err);
            return Err(err);
        }

        log::info!("{} updates started at {:?}", self.kind, interval);
        Ok(())
    }

    /// Retune a running stream; `Ok(false)` when it is not running
    pub fn set_interval(&self, interval: Duration) -> MotionResult<bool> {
        validate_interval(interval)?;
        let Some(backend) = &self.backend else {
            return Ok(false);
        };
        let _lifecycle = relock(&self.lifecycle);
        if !self.is_running() {
            return Ok(false);
        }
        self.retune(backend.as_ref(), interval);
        Ok(true)
    }

    // Caller holds the lifecycle lock and the source is running
    fn retune(&self, backend: &dyn SensorBackend, interval: Duration) {
        let previous = relock(&self.shared.state).interval.replace(interval);
        if previous != Some(interval) {
            backend.set_update_interval(interval);
            log::info!("{} updates reconfigured to {:?}", self.kind, interval);
        }
    }

    /// Stop delivery. No-op when not started.
    pub fn stop(&self) {
        self.halt();
        self.drain();
    }

    /// Flip to stopped and tell the backend; returns whether it was running
    pub(crate) fn halt(&self) -> bool {
        let _lifecycle = relock(&self.lifecycle);
        {
            let mut state = relock(&self.shared.state);
            if !state.running {
                return false;
            }
            state.running = false;
            state.interval = None;
            state.generation += 1;
        }
        if let Some(backend) = &self.backend {
            backend.stop();
        }
        log::info!("{} updates stopped", self.kind);
        true
    }

    /// Wait out a delivery still in flight on another thread.
    ///
    /// Skipped inside any delivery; the generation bump in `halt` already
    /// keeps every later delivery out.
    pub(crate) fn drain(&self) {
        if !in_delivery() {
            drop(relock(&self.shared.gate));
        }
    }

    fn delivery_callback(
        &self,
        generation: u64,
        on_sample: SampleHandler,
        on_error: ErrorHandler,
    ) -> PlatformCallback {
        let shared = Arc::clone(&self.shared);
        Arc::new(move |result: PlatformResult| {
            let _gate = relock(&shared.gate);
            if !shared.is_live(generation) {
                return;
            }
            let _mark = DeliveryMark::enter();
            match result {
                Ok(sample) => on_sample(sample),
                Err(err) => on_error(err),
            }
        })
    }
}

impl Drop for SensorSource {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockBackend;
    use crate::types::Vector3;
    use crossbeam::channel;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    fn accel(x: f64) -> RawSample {
        RawSample::Accelerometer {
            timestamp: 0.0,
            acceleration: Vector3::new(x, 0.0, -1.0),
        }
    }

    fn counting() -> (SampleHandler, ErrorHandler, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let samples = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let s = samples.clone();
        let e = errors.clone();
        (
            Arc::new(move |_: RawSample| {
                s.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(move |_: MotionError| {
                e.fetch_add(1, Ordering::SeqCst);
            }),
            samples,
            errors,
        )
    }

    /// Keeps calling the old callback after stop, like a sloppy platform queue
    #[derive(Default)]
    struct LeakyBackend {
        callback: Mutex<Option<PlatformCallback>>,
        stops: AtomicUsize,
    }

    impl LeakyBackend {
        fn deliver(&self, result: PlatformResult) {
            let callback = relock(&self.callback).clone();
            if let Some(callback) = callback {
                callback(result);
            }
        }
    }

    impl SensorBackend for LeakyBackend {
        fn is_available(&self) -> bool {
            true
        }
        fn set_update_interval(&self, _interval: Duration) {}
        fn start(&self, callback: PlatformCallback) -> MotionResult<()> {
            *relock(&self.callback) = Some(callback);
            Ok(())
        }
        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_unavailable_source() {
        let (on_sample, on_error, _, _) = counting();
        let missing = SensorSource::new(SensorKind::Magnetometer, None);
        assert!(!missing.is_available());
        assert_eq!(
            missing.start(Duration::from_millis(100), on_sample.clone(), on_error.clone()),
            Err(MotionError::Unavailable(SensorKind::Magnetometer))
        );

        let mock = Arc::new(MockBackend::unavailable());
        let absent = SensorSource::new(SensorKind::Gyroscope, Some(mock.clone()));
        assert_eq!(
            absent.start(Duration::from_millis(100), on_sample, on_error),
            Err(MotionError::Unavailable(SensorKind::Gyroscope))
        );
        assert_eq!(mock.start_count(), 0);
        assert!(!absent.is_running());
    }

    #[test]
    fn test_restart_reconfigures_instead_of_duplicating() {
        let mock = MockBackend::shared();
        let source = SensorSource::new(SensorKind::Accelerometer, Some(mock.clone()));
        let (on_sample, on_error, samples, _) = counting();

        source
            .start(Duration::from_millis(100), on_sample.clone(), on_error.clone())
            .unwrap();
        source
            .start(Duration::from_millis(50), on_sample.clone(), on_error.clone())
            .unwrap();
        source
            .start(Duration::from_millis(50), on_sample, on_error)
            .unwrap();

        assert_eq!(mock.start_count(), 1);
        assert_eq!(
            mock.configured_intervals(),
            vec![Duration::from_millis(100), Duration::from_millis(50)]
        );
        assert_eq!(source.interval(), Some(Duration::from_millis(50)));

        mock.emit(accel(0.1));
        assert_eq!(samples.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_interval_only_while_running() {
        let mock = MockBackend::shared();
        let source = SensorSource::new(SensorKind::Gyroscope, Some(mock.clone()));
        assert_eq!(source.set_interval(Duration::from_millis(20)), Ok(false));
        assert!(source.set_interval(Duration::ZERO).is_err());

        let (on_sample, on_error, _, _) = counting();
        source
            .start(Duration::from_millis(100), on_sample, on_error)
            .unwrap();
        assert_eq!(source.set_interval(Duration::from_millis(20)), Ok(true));
        assert_eq!(source.set_interval(Duration::from_millis(20)), Ok(true));
        assert_eq!(
            mock.configured_intervals(),
            vec![Duration::from_millis(100), Duration::from_millis(20)]
        );
        assert_eq!(source.interval(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mock = MockBackend::shared();
        let source = SensorSource::new(SensorKind::Accelerometer, Some(mock.clone()));
        source.stop();
        assert_eq!(mock.stop_count(), 0);

        let (on_sample, on_error, _, errors) = counting();
        source
            .start(Duration::from_millis(100), on_sample, on_error)
            .unwrap();
        mock.emit_error("read failed");
        assert_eq!(errors.load(Ordering::SeqCst), 1);

        source.stop();
        source.stop();
        assert_eq!(mock.stop_count(), 1);
        assert!(!source.is_running());
        assert_eq!(source.interval(), None);
    }

    #[test]
    fn test_stale_callbacks_ignored_after_stop() {
        let leaky = Arc::new(LeakyBackend::default());
        let source = SensorSource::new(SensorKind::Accelerometer, Some(leaky.clone()));
        let (on_sample, on_error, samples, errors) = counting();

        source
            .start(Duration::from_millis(10), on_sample, on_error)
            .unwrap();
        leaky.deliver(Ok(accel(0.0)));
        source.stop();
        leaky.deliver(Ok(accel(0.0)));
        leaky.deliver(Err(MotionError::SampleError("late".to_string())));

        assert_eq!(samples.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
        assert_eq!(leaky.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_waits_for_in_flight_delivery() {
        let leaky = Arc::new(LeakyBackend::default());
        let source = Arc::new(SensorSource::new(
            SensorKind::Gyroscope,
            Some(leaky.clone()),
        ));

        let (entered_tx, entered_rx) = channel::bounded::<()>(1);
        let (release_tx, release_rx) = channel::bounded::<()>(1);
        let finished = Arc::new(AtomicBool::new(false));
        let finished_cb = finished.clone();

        let on_sample: SampleHandler = Arc::new(move |_: RawSample| {
            let _ = entered_tx.send(());
            let _ = release_rx.recv();
            finished_cb.store(true, Ordering::SeqCst);
        });
        source
            .start(Duration::from_millis(10), on_sample, Arc::new(|_: MotionError| {}))
            .unwrap();

        let deliverer = {
            let leaky = leaky.clone();
            thread::spawn(move || leaky.deliver(Ok(accel(1.0))))
        };
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let (stopped_tx, stopped_rx) = channel::bounded::<()>(1);
        let stopper = {
            let source = source.clone();
            thread::spawn(move || {
                source.stop();
                let _ = stopped_tx.send(());
            })
        };

        assert!(stopped_rx.recv_timeout(Duration::from_millis(100)).is_err());
        release_tx.send(()).unwrap();
        stopped_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(finished.load(Ordering::SeqCst));

        deliverer.join().unwrap();
        stopper.join().unwrap();
    }

    #[test]
    fn test_stop_from_inside_delivery() {
        let mock = MockBackend::shared();
        let source = Arc::new(SensorSource::new(
            SensorKind::Accelerometer,
            Some(mock.clone()),
        ));
        let (on_sample_count, on_error, samples, _) = counting();

        let inner = Arc::downgrade(&source);
        let on_sample: SampleHandler = Arc::new(move |sample: RawSample| {
            on_sample_count(sample);
            if let Some(source) = inner.upgrade() {
                source.stop();
            }
        });
        source
            .start(Duration::from_millis(10), on_sample, on_error)
            .unwrap();

        assert!(mock.emit(accel(0.0)));
        assert!(!source.is_running());
        assert!(!mock.emit(accel(0.0)));
        assert_eq!(samples.load(Ordering::SeqCst), 1);
        assert_eq!(mock.stop_count(), 1);
    }
}
