//! Arm backends for the guarded-motion stack.
//!
//! Only simulated backends live here: a kinematic arm with a contact model
//! and a trace playback. Real drivers implement the same `guard_traits`
//! interfaces out of tree.
pub mod error;
pub mod sim;
pub mod trace;

pub use sim::{SimCamera, SimForce, SimHeight, SimParams, SimSink, SimulatedArm};
pub use trace::{TraceForce, TraceHeight, TracePlayback, TraceSample};
