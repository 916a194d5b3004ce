//! Scripted fakes for driving the controllers without hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use guard_traits::{
    BoxError, HeightSource, Sensor, TargetError, TargetErrorEstimator, VelocityCommand,
    VelocitySink,
};

type Hook = Box<dyn FnMut(usize, &VelocityCommand) + Send>;

/// Velocity sink that records every published command.
///
/// Clones share the record. An optional hook runs after each accepted
/// publish with the zero-based command index, which lets tests feed force
/// samples or cancel at a chosen tick.
#[derive(Clone, Default)]
pub struct RecordingSink {
    commands: Arc<Mutex<Vec<VelocityCommand>>>,
    fail_after: Option<usize>,
    hook: Option<Arc<Mutex<Hook>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every publish once `n` commands have been accepted.
    #[must_use]
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    #[must_use]
    pub fn on_publish(mut self, hook: impl FnMut(usize, &VelocityCommand) + Send + 'static) -> Self {
        self.hook = Some(Arc::new(Mutex::new(Box::new(hook))));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<VelocityCommand>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn commands(&self) -> Vec<VelocityCommand> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<VelocityCommand> {
        self.lock().last().copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl VelocitySink for RecordingSink {
    fn publish(&mut self, cmd: &VelocityCommand) -> Result<(), BoxError> {
        let idx = {
            let mut cmds = self.lock();
            if self.fail_after.is_some_and(|n| cmds.len() >= n) {
                return Err(Box::new(std::io::Error::other("sink rejected command")));
            }
            cmds.push(*cmd);
            cmds.len() - 1
        };
        if let Some(hook) = &self.hook {
            let mut h = hook.lock().unwrap_or_else(PoisonError::into_inner);
            (*h)(idx, cmd);
        }
        Ok(())
    }
}

/// Height source replaying a script; the last entry repeats forever.
#[derive(Debug, Clone)]
pub struct ScriptedHeight {
    script: VecDeque<Option<f64>>,
    last: Option<f64>,
    polls: usize,
}

impl ScriptedHeight {
    pub fn new(heights: impl IntoIterator<Item = f64>) -> Self {
        Self::with_gaps(heights.into_iter().map(Some))
    }

    /// `None` entries simulate ticks without feedback.
    pub fn with_gaps(heights: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self {
            script: heights.into_iter().collect(),
            last: None,
            polls: 0,
        }
    }

    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl HeightSource for ScriptedHeight {
    fn height(&mut self) -> Option<f64> {
        self.polls += 1;
        match self.script.pop_front() {
            Some(h) => {
                self.last = h;
                h
            }
            None => self.last,
        }
    }
}

/// Target-error estimator replaying a script; the last entry repeats forever.
#[derive(Debug, Clone)]
pub struct ScriptedEstimator {
    script: VecDeque<Option<TargetError>>,
    last: Option<TargetError>,
    calls: usize,
}

impl ScriptedEstimator {
    pub fn new(errors: impl IntoIterator<Item = Option<TargetError>>) -> Self {
        Self {
            script: errors.into_iter().collect(),
            last: None,
            calls: 0,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl TargetErrorEstimator for ScriptedEstimator {
    fn estimate(&mut self) -> Option<TargetError> {
        self.calls += 1;
        match self.script.pop_front() {
            Some(e) => {
                self.last = e;
                e
            }
            None => self.last,
        }
    }
}

/// A sensor that always errors on read.
pub struct NoopSensor;

impl Sensor for NoopSensor {
    type Reading = f64;

    fn read(&mut self, _timeout: Duration) -> Result<f64, BoxError> {
        Err(Box::new(std::io::Error::other("noop sensor")))
    }
}

/// A sensor returning a constant reading.
#[derive(Debug, Clone, Copy)]
pub struct ConstSensor<R>(pub R);

impl<R: Copy> Sensor for ConstSensor<R> {
    type Reading = R;

    fn read(&mut self, _timeout: Duration) -> Result<R, BoxError> {
        Ok(self.0)
    }
}
