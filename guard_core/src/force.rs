//! Rolling force window and contact detection.
//!
//! The monitor keeps the last N force/torque samples and flags contact when
//! the newest sample departs from the window mean by more than a per-axis
//! threshold. The flag latches until explicitly reset, so a control loop
//! polling at a lower rate than the sensor still sees every trip.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::GuardError;

/// One force (or torque) reading across x/y/z.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ForceSample(pub [f64; 3]);

impl ForceSample {
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl From<[f64; 3]> for ForceSample {
    fn from(v: [f64; 3]) -> Self {
        Self(v)
    }
}

/// A scalar reading applies to every axis.
impl From<f64> for ForceSample {
    fn from(v: f64) -> Self {
        Self([v; 3])
    }
}

/// Fixed-capacity FIFO of force samples. Oldest sample is evicted on overflow.
#[derive(Debug, Clone)]
pub struct ForceWindow {
    buf: VecDeque<[f64; 3]>,
    cap: usize,
}

impl ForceWindow {
    /// Capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let cap = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append a sample, returning the evicted one when full.
    pub fn push(&mut self, sample: ForceSample) -> Option<[f64; 3]> {
        let evicted = if self.buf.len() == self.cap {
            self.buf.pop_front()
        } else {
            None
        };
        self.buf.push_back(sample.0);
        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn last(&self) -> Option<[f64; 3]> {
        self.buf.back().copied()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &[f64; 3]> {
        self.buf.iter()
    }

    pub fn mean(&self) -> Option<[f64; 3]> {
        if self.buf.is_empty() {
            return None;
        }
        let mut sum = [0.0; 3];
        for s in &self.buf {
            for (acc, v) in sum.iter_mut().zip(s) {
                *acc += v;
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.buf.len() as f64;
        Some(sum.map(|v| v / n))
    }

    /// Per-axis `|mean - last|`.
    pub fn deviation(&self) -> Option<[f64; 3]> {
        let mean = self.mean()?;
        let last = self.last()?;
        Some([
            (mean[0] - last[0]).abs(),
            (mean[1] - last[1]).abs(),
            (mean[2] - last[2]).abs(),
        ])
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Per-axis deviation limits, all strictly positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceThreshold([f64; 3]);

impl ForceThreshold {
    pub fn new(axes: [f64; 3]) -> Result<Self, GuardError> {
        if axes.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(GuardError::InvalidConfig(format!(
                "force threshold axes must all be > 0, got {axes:?}"
            )));
        }
        Ok(Self(axes))
    }

    #[inline]
    pub fn axes(&self) -> [f64; 3] {
        self.0
    }
}

/// Details of the sample that set the contact flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trip {
    /// 0 = x, 1 = y, 2 = z.
    pub axis: usize,
    pub deviation: f64,
    pub threshold: f64,
}

impl Trip {
    pub fn axis_name(&self) -> &'static str {
        ["x", "y", "z"].get(self.axis).copied().unwrap_or("?")
    }
}

#[derive(Debug, Clone)]
pub struct ForceMonitor {
    window: ForceWindow,
    warmup: usize,
    threshold: Option<ForceThreshold>,
    enabled: bool,
    flag: bool,
    last_trip: Option<Trip>,
}

impl ForceMonitor {
    /// `warmup` samples must be buffered before any deviation is evaluated.
    pub fn new(capacity: usize, warmup: usize) -> Result<Self, GuardError> {
        if capacity == 0 {
            return Err(GuardError::InvalidConfig(
                "force window capacity must be >= 1".into(),
            ));
        }
        if warmup == 0 || warmup > capacity {
            return Err(GuardError::InvalidConfig(format!(
                "force warmup must be in 1..={capacity}, got {warmup}"
            )));
        }
        Ok(Self {
            window: ForceWindow::new(capacity),
            warmup,
            threshold: None,
            enabled: false,
            flag: false,
            last_trip: None,
        })
    }

    pub fn set_threshold(&mut self, axes: [f64; 3]) -> Result<(), GuardError> {
        self.threshold = Some(ForceThreshold::new(axes)?);
        Ok(())
    }

    pub fn threshold(&self) -> Option<ForceThreshold> {
        self.threshold
    }

    /// Start accepting samples. Going from disabled to enabled empties the
    /// window, so a new motion earns its own warm-up instead of comparing
    /// fresh samples against a mean from the last one.
    pub fn enable(&mut self) {
        if !self.enabled {
            self.window.clear();
        }
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record one sample. Ignored while disabled; non-finite samples are dropped.
    pub fn push_sample(&mut self, sample: impl Into<ForceSample>) {
        if !self.enabled {
            return;
        }
        let sample = sample.into();
        if !sample.is_finite() {
            tracing::trace!(?sample, "dropping non-finite force sample");
            return;
        }
        self.window.push(sample);
        if self.flag || self.window.len() < self.warmup {
            return;
        }
        let (Some(threshold), Some(dev)) = (self.threshold, self.window.deviation()) else {
            return;
        };
        // Report the axis furthest over its own limit.
        let limits = threshold.axes();
        let worst = (0..3)
            .filter(|&i| dev[i] > limits[i])
            .max_by(|&a, &b| (dev[a] / limits[a]).total_cmp(&(dev[b] / limits[b])));
        if let Some(axis) = worst {
            let trip = Trip {
                axis,
                deviation: dev[axis],
                threshold: limits[axis],
            };
            tracing::info!(
                axis = trip.axis_name(),
                deviation = trip.deviation,
                threshold = trip.threshold,
                "force deviation over threshold"
            );
            self.flag = true;
            self.last_trip = Some(trip);
        }
    }

    #[inline]
    pub fn flag_exceeded(&self) -> bool {
        self.flag
    }

    pub fn reset_flag(&mut self) {
        self.flag = false;
        self.last_trip = None;
    }

    pub fn last_trip(&self) -> Option<Trip> {
        self.last_trip
    }

    #[inline]
    pub fn is_warm(&self) -> bool {
        self.window.len() >= self.warmup
    }

    pub fn warmup(&self) -> usize {
        self.warmup
    }

    pub fn window(&self) -> &ForceWindow {
        &self.window
    }
}

/// Shared handle: sampler threads push, control loops poll.
#[derive(Debug, Clone)]
pub struct ForceHandle {
    inner: Arc<Mutex<ForceMonitor>>,
}

impl ForceHandle {
    pub fn new(monitor: ForceMonitor) -> Self {
        Self {
            inner: Arc::new(Mutex::new(monitor)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ForceMonitor> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with the monitor locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut ForceMonitor) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn push_sample(&self, sample: impl Into<ForceSample>) {
        self.lock().push_sample(sample);
    }

    pub fn set_threshold(&self, axes: [f64; 3]) -> Result<(), GuardError> {
        self.lock().set_threshold(axes)
    }

    pub fn enable(&self) {
        self.lock().enable();
    }

    pub fn disable(&self) {
        self.lock().disable();
    }

    pub fn flag_exceeded(&self) -> bool {
        self.lock().flag_exceeded()
    }

    pub fn reset_flag(&self) {
        self.lock().reset_flag();
    }

    pub fn last_trip(&self) -> Option<Trip> {
        self.lock().last_trip()
    }

    pub fn is_warm(&self) -> bool {
        self.lock().is_warm()
    }

    /// Copy of the current window.
    pub fn snapshot(&self) -> ForceWindow {
        self.lock().window().clone()
    }
}
