#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Force-guarded motion control (hardware-agnostic).
//!
//! All hardware interaction goes through the `guard_traits` boundary traits:
//! `VelocitySink` for commands, `HeightSource` and `Sensor` for feedback,
//! `TargetErrorEstimator` for vision.
//!
//! ## Architecture
//!
//! - **Force**: rolling window, per-axis deviation threshold, latched contact flag (`force`)
//! - **Sampling**: background sensor threads feeding the monitor or a latest-value cell (`sampler`)
//! - **Motions**: visual servo (`servo`), guarded descent (`descent`), cautionary approach (`approach`)
//! - **Retry**: align-then-descend attempts (`orchestrator`)
//! - **Plumbing**: loop pacing, cancellation, stop and timed moves (`tick`, `cancel`, `motion`)
//!
//! Every loop runs at a fixed rate on an injected `Clock`, so tests drive
//! them in virtual time with `ManualClock`.

pub mod approach;
pub mod cancel;
pub mod config;
pub mod conversions;
pub mod descent;
pub mod error;
pub mod force;
pub mod hw_error;
pub mod mocks;
pub mod motion;
pub mod orchestrator;
pub mod sampler;
pub mod servo;
pub mod tick;
pub mod util;

pub use approach::{ApproachReport, ApproachStop, CautionaryApproach};
pub use cancel::CancelToken;
pub use descent::{DescentReport, GuardedDescentController, PhaseStop};
pub use error::{GuardError, Result};
pub use force::{ForceHandle, ForceMonitor, ForceSample, ForceThreshold, ForceWindow, Trip};
pub use motion::LoopCtx;
pub use orchestrator::{InsertionOrchestrator, InsertionSteps, Rig, RigSteps};
pub use sampler::{LatestHeight, LockstepSink, Sampler};
pub use servo::{ServoOutcome, VisualServoLoop};

/// Build a monitor sized from config, wrapped for sharing.
pub fn force_handle(cfg: &config::ForceCfg) -> std::result::Result<ForceHandle, GuardError> {
    Ok(ForceHandle::new(ForceMonitor::new(cfg.window, cfg.warmup)?))
}
