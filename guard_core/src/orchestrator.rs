//! Retry loop around align-then-descend.

use std::sync::Arc;

use guard_traits::{Clock, HeightSource, TargetErrorEstimator, VelocitySink};

use crate::cancel::CancelToken;
use crate::config::LoopCfg;
use crate::descent::{DescentReport, GuardedDescentController};
use crate::error::{GuardError, Result};
use crate::force::ForceHandle;
use crate::motion::LoopCtx;
use crate::servo::{ServoOutcome, VisualServoLoop};

/// The two steps of one insertion attempt.
pub trait InsertionSteps {
    fn align(&mut self) -> Result<ServoOutcome>;
    fn descend(&mut self) -> Result<DescentReport>;
}

/// Everything a physical (or simulated) insertion needs. Owns the sink, so
/// only one motion can command the arm at a time.
pub struct Rig<S, H, E> {
    pub sink: S,
    pub height: H,
    pub estimator: E,
    pub force: ForceHandle,
    pub clock: Arc<dyn Clock + Send + Sync>,
    pub cancel: CancelToken,
    pub loop_cfg: LoopCfg,
}

impl<S, H, E> Rig<S, H, E> {
    pub fn ctx(&self) -> LoopCtx<'_> {
        LoopCtx::new(&*self.clock, &self.cancel, self.loop_cfg)
    }
}

/// `InsertionSteps` over a `Rig` with the visual servo and the guarded descent.
pub struct RigSteps<S, H, E> {
    pub rig: Rig<S, H, E>,
    servo: VisualServoLoop,
    descent: GuardedDescentController,
}

impl<S, H, E> RigSteps<S, H, E> {
    pub fn new(rig: Rig<S, H, E>, servo: VisualServoLoop, descent: GuardedDescentController) -> Self {
        Self {
            rig,
            servo,
            descent,
        }
    }
}

impl<S, H, E> InsertionSteps for RigSteps<S, H, E>
where
    S: VelocitySink,
    H: HeightSource,
    E: TargetErrorEstimator,
{
    fn align(&mut self) -> Result<ServoOutcome> {
        let Rig {
            sink,
            estimator,
            clock,
            cancel,
            loop_cfg,
            ..
        } = &mut self.rig;
        let ctx = LoopCtx::new(&**clock, cancel, *loop_cfg);
        self.servo.run(&ctx, estimator, sink)
    }

    fn descend(&mut self) -> Result<DescentReport> {
        let Rig {
            sink,
            height,
            force,
            clock,
            cancel,
            loop_cfg,
            ..
        } = &mut self.rig;
        let ctx = LoopCtx::new(&**clock, cancel, *loop_cfg);
        self.descent.run(&ctx, sink, height, force)
    }
}

pub struct InsertionOrchestrator<P> {
    steps: P,
}

impl<P: InsertionSteps> InsertionOrchestrator<P> {
    pub fn new(steps: P) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &P {
        &self.steps
    }

    pub fn into_steps(self) -> P {
        self.steps
    }

    /// Align and descend up to `max_retries` times.
    ///
    /// Returns `Ok(true)` on the first successful descent and `Ok(false)`
    /// once every attempt has failed. Sensor starvation inside an attempt
    /// (warm-up, height, align budget) fails that attempt only; cancellation
    /// and actuation errors abort immediately.
    pub fn attempt_insertion(&mut self, max_retries: u32) -> Result<bool> {
        for attempt in 1..=max_retries {
            let _span = tracing::info_span!("insertion_attempt", attempt).entered();

            match self.steps.align()? {
                ServoOutcome::Cancelled => return Err(eyre::Report::new(GuardError::Cancelled)),
                ServoOutcome::TargetLost => {
                    tracing::warn!("target lost during alignment, descending anyway");
                }
                ServoOutcome::Converged => {}
            }

            match self.steps.descend() {
                Ok(report) if report.success => {
                    tracing::info!(attempt, final_height = report.final_height, "inserted");
                    return Ok(true);
                }
                Ok(report) => {
                    tracing::warn!(attempt, final_height = report.final_height, "attempt failed");
                }
                Err(e) => match e.downcast_ref::<GuardError>() {
                    Some(g) if !g.is_fatal() => {
                        tracing::warn!(attempt, error = %g, "attempt aborted");
                    }
                    _ => return Err(e),
                },
            }
        }
        tracing::warn!(max_retries, "insertion retries exhausted");
        Ok(false)
    }
}
