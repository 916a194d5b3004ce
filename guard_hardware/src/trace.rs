//! Playback of a recorded (or hand-written) sensor trace.
//!
//! The height source advances one row per poll; the force sensor reports the
//! force of the row most recently handed out as height. Past the last row both
//! keep returning the final row.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use guard_traits::{BoxError, HeightSource, Sensor};

use crate::error::HwError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSample {
    pub height: f64,
    pub force: [f64; 3],
}

#[derive(Debug, Clone)]
pub struct TracePlayback {
    samples: Arc<Vec<TraceSample>>,
    cursor: Arc<AtomicUsize>,
}

impl TracePlayback {
    pub fn new(samples: Vec<TraceSample>) -> Self {
        Self {
            samples: Arc::new(samples),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Index of the row most recently handed out as height.
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::Acquire).saturating_sub(1)
    }

    pub fn heights(&self) -> TraceHeight {
        TraceHeight {
            playback: self.clone(),
        }
    }

    pub fn forces(&self) -> TraceForce {
        TraceForce {
            playback: self.clone(),
        }
    }

    fn current(&self) -> Option<TraceSample> {
        let last = self.samples.len().checked_sub(1)?;
        let i = self.position().min(last);
        self.samples.get(i).copied()
    }
}

#[derive(Debug, Clone)]
pub struct TraceHeight {
    playback: TracePlayback,
}

impl HeightSource for TraceHeight {
    fn height(&mut self) -> Option<f64> {
        let samples = &self.playback.samples;
        let last = samples.len().checked_sub(1)?;
        let i = self.playback.cursor.fetch_add(1, Ordering::AcqRel).min(last);
        samples.get(i).map(|s| s.height)
    }
}

#[derive(Debug, Clone)]
pub struct TraceForce {
    playback: TracePlayback,
}

impl Sensor for TraceForce {
    type Reading = [f64; 3];

    fn read(&mut self, _timeout: Duration) -> Result<[f64; 3], BoxError> {
        self.playback
            .current()
            .map(|s| s.force)
            .ok_or_else(|| Box::new(HwError::Timeout) as BoxError)
    }
}
