//! Background sensor sampling.
//!
//! Each `Sampler` owns one thread that polls a `Sensor` at a fixed rate and
//! hands readings either to a bounded channel (latest-value consumers such
//! as height feedback) or straight into a `ForceHandle`. The thread records
//! the last successful read for watchdog checks and is shut down and joined
//! when the `Sampler` is dropped.

use crossbeam_channel as xch;
use guard_traits::{Clock, HeightSource, Sensor};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::force::{ForceHandle, ForceSample};

/// Readings buffered for a latest-value consumer before the oldest is dropped.
const CHANNEL_DEPTH: usize = 8;

pub struct Sampler<R> {
    rx: Option<xch::Receiver<R>>,
    last_ok: Arc<AtomicU64>,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl<R: Send + 'static> Sampler<R> {
    /// Poll `sensor` at `hz`; read the newest value with [`Sampler::latest`].
    pub fn spawn<S, C>(sensor: S, hz: u32, timeout: Duration, clock: C) -> Self
    where
        S: Sensor<Reading = R> + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (tx, rx) = xch::bounded(CHANNEL_DEPTH);
        // Producer-side receiver used to evict the oldest reading when full.
        let evict = rx.clone();
        let mut sampler = Self::spawn_with(sensor, hz, timeout, clock, move |v| {
            let mut v = v;
            loop {
                match tx.try_send(v) {
                    Ok(()) => return true,
                    Err(xch::TrySendError::Full(back)) => {
                        let _ = evict.try_recv();
                        v = back;
                    }
                    Err(xch::TrySendError::Disconnected(_)) => return false,
                }
            }
        });
        sampler.rx = Some(rx);
        sampler
    }

    /// Poll `sensor` at `hz` and hand every reading to `deliver`. The thread
    /// exits when `deliver` returns `false` or the sampler is dropped.
    pub fn spawn_with<S, C, F>(
        mut sensor: S,
        hz: u32,
        timeout: Duration,
        clock: C,
        mut deliver: F,
    ) -> Self
    where
        S: Sensor<Reading = R> + Send + 'static,
        C: Clock + Send + Sync + 'static,
        F: FnMut(R) -> bool + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let period = Duration::from_micros(crate::util::period_us(hz));
        let clock: Arc<dyn Clock + Send + Sync> = Arc::new(clock);
        let thread_clock = clock.clone();
        let epoch = clock.now();

        let join_handle = std::thread::spawn(move || {
            let mut errors: u64 = 0;
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sampler thread received shutdown signal");
                    break;
                }

                match sensor.read(timeout) {
                    Ok(v) => {
                        if !deliver(v) {
                            tracing::debug!("sampler consumer disconnected, exiting thread");
                            break;
                        }
                        last_ok_clone.store(thread_clock.ms_since(epoch), Ordering::Relaxed);
                    }
                    Err(e) => {
                        errors += 1;
                        // Consumers watchdog on staleness; only log the first few.
                        if errors <= 3 {
                            tracing::warn!(error = %e, "sensor read failed");
                        }
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                thread_clock.sleep(period);
            }
            tracing::trace!("sampler thread exiting cleanly");
        });

        Self {
            rx: None,
            last_ok,
            clock,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Newest reading since the last call, if any. Always `None` for samplers
    /// that deliver to a callback.
    pub fn latest(&self) -> Option<R> {
        self.rx.as_ref().and_then(|rx| rx.try_iter().last())
    }

    pub fn stalled_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }

    /// Milliseconds since the last successful read, on the sampler's clock.
    pub fn stalled_for_now(&self) -> u64 {
        self.stalled_for(self.clock.ms_since(self.epoch))
    }
}

impl Sampler<[f64; 3]> {
    /// Feed every force reading into `force`.
    pub fn spawn_force<S, C>(
        sensor: S,
        force: ForceHandle,
        hz: u32,
        timeout: Duration,
        clock: C,
    ) -> Self
    where
        S: Sensor<Reading = [f64; 3]> + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        Self::spawn_with(sensor, hz, timeout, clock, move |v| {
            force.push_sample(ForceSample(v));
            true
        })
    }
}

impl<R> Drop for Sampler<R> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread exits after its current read returns (bounded by the
        // read timeout) or right away if it is sleeping between reads.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("sampler thread joined"),
                Err(e) => tracing::warn!(?e, "sampler thread panicked during shutdown"),
            }
        }
    }
}

/// `HeightSource` over a height sampler. Holds the last reading between
/// samples and reports a gap once the sampler has been silent for `max_age`.
pub struct LatestHeight {
    sampler: Sampler<f64>,
    last: Option<f64>,
    max_age: Option<Duration>,
}

impl LatestHeight {
    pub fn new(sampler: Sampler<f64>, max_age: Option<Duration>) -> Self {
        Self {
            sampler,
            last: None,
            max_age,
        }
    }
}

impl HeightSource for LatestHeight {
    fn height(&mut self) -> Option<f64> {
        if let Some(h) = self.sampler.latest() {
            self.last = Some(h);
        }
        if let Some(max) = self.max_age {
            let age = u128::from(self.sampler.stalled_for_now());
            if age > max.as_millis() {
                return None;
            }
        }
        self.last
    }
}

/// Velocity sink that samples a force sensor right after every publish.
///
/// Stands in for the background force sampler in virtual-time runs, where a
/// real-time thread would not keep pace with the control loop.
pub struct LockstepSink<S, F> {
    inner: S,
    sensor: F,
    force: ForceHandle,
    per_tick: usize,
    timeout: Duration,
}

impl<S, F> LockstepSink<S, F>
where
    S: guard_traits::VelocitySink,
    F: Sensor<Reading = [f64; 3]>,
{
    /// `per_tick` is clamped to at least 1.
    pub fn new(inner: S, sensor: F, force: ForceHandle, per_tick: usize, timeout: Duration) -> Self {
        Self {
            inner,
            sensor,
            force,
            per_tick: per_tick.max(1),
            timeout,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, F> guard_traits::VelocitySink for LockstepSink<S, F>
where
    S: guard_traits::VelocitySink,
    F: Sensor<Reading = [f64; 3]>,
{
    fn publish(&mut self, cmd: &guard_traits::VelocityCommand) -> Result<(), guard_traits::BoxError> {
        self.inner.publish(cmd)?;
        for _ in 0..self.per_tick {
            match self.sensor.read(self.timeout) {
                Ok(v) => self.force.push_sample(ForceSample(v)),
                Err(e) => tracing::warn!(error = %e, "lockstep force read failed"),
            }
        }
        Ok(())
    }
}
