//! Force-guarded straight-line approach with optional retract.
//!
//! The tool moves along one axis at `distance / duration` until the force
//! monitor trips or the time budget runs out, then stops. After contact it
//! can back off a short distance in the opposite direction.

use std::time::Duration;

use guard_traits::{ReferenceFrame, VelocityCommand, VelocitySink};

use crate::config::ApproachCfg;
use crate::error::{GuardError, Result};
use crate::force::{ForceHandle, ForceThreshold, Trip};
use crate::motion::{self, LoopCtx};
use crate::util::ticks_for;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproachStop {
    Contact,
    BudgetExpired,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproachReport {
    pub stop: ApproachStop,
    pub trip: Option<Trip>,
    pub retracted: bool,
    /// Ticks spent moving forward.
    pub ticks: u32,
}

#[derive(Debug, Clone)]
pub struct CautionaryApproach {
    cfg: ApproachCfg,
    threshold: ForceThreshold,
}

impl CautionaryApproach {
    pub fn new(cfg: ApproachCfg) -> std::result::Result<Self, GuardError> {
        let invalid = |m: &str| Err(GuardError::InvalidConfig(m.to_owned()));
        if !(cfg.distance.is_finite() && cfg.distance != 0.0) {
            return invalid("approach distance must be non-zero");
        }
        if cfg.duration.is_zero() {
            return invalid("approach time must be > 0");
        }
        if cfg.retract
            && (!(cfg.retract_distance.is_finite() && cfg.retract_distance > 0.0)
                || cfg.retract_duration.is_zero())
        {
            return invalid("approach retract distance and time must be > 0");
        }
        if cfg.frame == ReferenceFrame::Mixed {
            return invalid("approach frame must be tool or base");
        }
        let threshold = ForceThreshold::new(cfg.threshold)?;
        Ok(Self { cfg, threshold })
    }

    pub fn cfg(&self) -> &ApproachCfg {
        &self.cfg
    }

    /// Signed approach speed.
    pub fn velocity(&self) -> f64 {
        self.cfg.distance / self.cfg.duration.as_secs_f64()
    }

    /// Signed retract speed, opposite to the approach.
    pub fn retract_velocity(&self) -> f64 {
        -self.cfg.distance.signum() * self.cfg.retract_distance
            / self.cfg.retract_duration.as_secs_f64()
    }

    pub fn run(
        &self,
        ctx: &LoopCtx<'_>,
        sink: &mut dyn VelocitySink,
        force: &ForceHandle,
    ) -> Result<ApproachReport> {
        force.set_threshold(self.threshold.axes())?;
        force.reset_flag();
        force.enable();
        let res = self.advance(ctx, sink, force);
        force.disable();
        let (stop, ticks) = res?;

        let trip = force.last_trip();
        let mut retracted = false;
        if stop == ApproachStop::Contact && self.cfg.retract {
            let back = VelocityCommand::along(self.cfg.axis, self.retract_velocity(), self.cfg.frame);
            let n = ticks_for(self.cfg.retract_duration.as_secs_f64(), ctx.cfg.rate_hz);
            motion::timed_move(ctx, sink, &back, n)?;
            retracted = true;
        }
        tracing::info!(?stop, ticks, retracted, "approach finished");
        Ok(ApproachReport {
            stop,
            trip,
            retracted,
            ticks,
        })
    }

    fn advance(
        &self,
        ctx: &LoopCtx<'_>,
        sink: &mut dyn VelocitySink,
        force: &ForceHandle,
    ) -> Result<(ApproachStop, u32)> {
        motion::await_warm(ctx, sink, force)?;

        let cmd = VelocityCommand::along(self.cfg.axis, self.velocity(), self.cfg.frame);
        tracing::debug!(axis = self.cfg.axis.name(), velocity = self.velocity(), "approach started");
        let budget: Duration = self.cfg.duration;
        let start = ctx.clock.now();
        let mut ticker = ctx.ticker();
        let mut ticks = 0u32;
        let stop = loop {
            if ctx.is_cancelled() {
                return Err(motion::cancelled(sink));
            }
            if force.flag_exceeded() {
                break ApproachStop::Contact;
            }
            if ctx.clock.now().saturating_duration_since(start) >= budget {
                break ApproachStop::BudgetExpired;
            }
            motion::publish(sink, &cmd)?;
            ticker.wait();
            ticks += 1;
        };
        motion::stop(sink)?;
        Ok((stop, ticks))
    }
}
