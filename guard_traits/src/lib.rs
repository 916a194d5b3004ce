//! Boundary traits for the guarded-motion stack.
//!
//! The core never talks to a robot driver, camera pipeline or sensor bus
//! directly; it only sees the traits below. Errors crossing these boundaries
//! are boxed so that drivers can keep their own error types.

pub mod clock;
pub mod twist;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use twist::{Axis, ReferenceFrame, TargetError, Twist, VelocityCommand};

use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A polled sensor, typically owned by a background sampling thread.
pub trait Sensor {
    type Reading;

    fn read(&mut self, timeout: Duration) -> Result<Self::Reading, BoxError>;
}

/// Cartesian velocity command channel. Last write wins on the actuator side.
pub trait VelocitySink {
    fn publish(&mut self, cmd: &VelocityCommand) -> Result<(), BoxError>;
}

/// Latest position along the approach axis, `None` while no reading is available.
pub trait HeightSource {
    fn height(&mut self) -> Option<f64>;
}

/// Vision stage producing a fresh error each tick, `None` when no target is found.
pub trait TargetErrorEstimator {
    fn estimate(&mut self) -> Option<TargetError>;
}

impl<T: VelocitySink + ?Sized> VelocitySink for Box<T> {
    fn publish(&mut self, cmd: &VelocityCommand) -> Result<(), BoxError> {
        (**self).publish(cmd)
    }
}

impl<T: VelocitySink + ?Sized> VelocitySink for &mut T {
    fn publish(&mut self, cmd: &VelocityCommand) -> Result<(), BoxError> {
        (**self).publish(cmd)
    }
}

impl<T: HeightSource + ?Sized> HeightSource for Box<T> {
    fn height(&mut self) -> Option<f64> {
        (**self).height()
    }
}

impl<T: HeightSource + ?Sized> HeightSource for &mut T {
    fn height(&mut self) -> Option<f64> {
        (**self).height()
    }
}

impl<T: TargetErrorEstimator + ?Sized> TargetErrorEstimator for Box<T> {
    fn estimate(&mut self) -> Option<TargetError> {
        (**self).estimate()
    }
}

impl<T: TargetErrorEstimator + ?Sized> TargetErrorEstimator for &mut T {
    fn estimate(&mut self) -> Option<TargetError> {
        (**self).estimate()
    }
}
