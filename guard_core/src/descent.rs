//! Guarded multi-phase descent into a hole.
//!
//! Phases run once each, in order:
//!
//! 1. **Align**: move along z until the height is within tolerance of the
//!    approach height.
//! 2. **Fast**: descend at the fast speed with a tight force threshold until
//!    contact or the near-hole cutoff.
//! 3. **Slow**: descend at the slow speed with a looser threshold until
//!    contact or the inside-hole cutoff. The height here is the final height.
//! 4. **Verdict and retract**: success is decided from the final height, then
//!    the tool backs out for a fixed number of ticks and stops.
//!
//! Each phase waits for the force window to warm up before moving.

use guard_traits::{Axis, HeightSource, ReferenceFrame, VelocityCommand, VelocitySink};

use crate::config::DescentCfg;
use crate::error::{GuardError, Result};
use crate::force::{ForceHandle, ForceThreshold};
use crate::motion::{self, LoopCtx};

/// Why a descent phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStop {
    ForceLimit,
    HeightCutoff,
    /// The phase ran out of ticks without reaching either condition.
    TickBudget,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescentReport {
    pub success: bool,
    pub fast_stop: PhaseStop,
    pub fast_height: f64,
    pub slow_stop: PhaseStop,
    /// Height when the slow phase stopped; the success band is applied to it.
    pub final_height: f64,
}

#[derive(Debug, Clone)]
pub struct GuardedDescentController {
    cfg: DescentCfg,
    fast_threshold: ForceThreshold,
    slow_threshold: ForceThreshold,
}

struct Phase {
    name: &'static str,
    speed: f64,
    cutoff: f64,
    threshold: ForceThreshold,
}

impl GuardedDescentController {
    pub fn new(cfg: DescentCfg) -> std::result::Result<Self, GuardError> {
        let invalid = |m: &str| Err(GuardError::InvalidConfig(m.to_owned()));
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if cfg.frame == ReferenceFrame::Mixed {
            return invalid("descent frame must be tool or base");
        }
        if !(positive(cfg.align_speed)
            && positive(cfg.fast_speed)
            && positive(cfg.slow_speed)
            && positive(cfg.retract_speed))
        {
            return invalid("descent speeds must be > 0");
        }
        if !positive(cfg.align_tolerance) {
            return invalid("descent align tolerance must be > 0");
        }
        if cfg.align_max_ticks == 0 || cfg.phase_max_ticks == 0 {
            return invalid("descent tick budgets must be >= 1");
        }
        if !(cfg.slow_cutoff < cfg.fast_cutoff && cfg.fast_cutoff < cfg.approach_height) {
            return invalid("descent heights must satisfy slow cutoff < fast cutoff < approach height");
        }
        let fast_threshold = ForceThreshold::new(cfg.fast_threshold)?;
        let slow_threshold = ForceThreshold::new(cfg.slow_threshold)?;
        Ok(Self {
            cfg,
            fast_threshold,
            slow_threshold,
        })
    }

    pub fn cfg(&self) -> &DescentCfg {
        &self.cfg
    }

    /// Sign of a downward z velocity in the configured frame.
    fn down(&self) -> f64 {
        match self.cfg.frame {
            ReferenceFrame::Tool => 1.0,
            _ => -1.0,
        }
    }

    fn z(&self, v: f64) -> VelocityCommand {
        VelocityCommand::along(Axis::LinearZ, v, self.cfg.frame)
    }

    /// Run all phases. Monitoring is enabled for the duration of the call.
    pub fn run(
        &self,
        ctx: &LoopCtx<'_>,
        sink: &mut dyn VelocitySink,
        height: &mut dyn HeightSource,
        force: &ForceHandle,
    ) -> Result<DescentReport> {
        force.enable();
        let res = self.run_phases(ctx, sink, height, force);
        force.disable();
        res
    }

    fn run_phases(
        &self,
        ctx: &LoopCtx<'_>,
        sink: &mut dyn VelocitySink,
        height: &mut dyn HeightSource,
        force: &ForceHandle,
    ) -> Result<DescentReport> {
        motion::await_warm(ctx, sink, force)?;
        self.align(ctx, sink, height)?;

        let fast = Phase {
            name: "fast",
            speed: self.cfg.fast_speed,
            cutoff: self.cfg.fast_cutoff,
            threshold: self.fast_threshold,
        };
        let (fast_stop, fast_height) = self.descend(ctx, sink, height, force, &fast)?;

        let slow = Phase {
            name: "slow",
            speed: self.cfg.slow_speed,
            cutoff: self.cfg.slow_cutoff,
            threshold: self.slow_threshold,
        };
        let (slow_stop, final_height) = self.descend(ctx, sink, height, force, &slow)?;

        let success = self.cfg.success.contains(final_height);
        if success {
            tracing::info!(final_height, "insertion succeeded");
        } else {
            tracing::warn!(final_height, ?slow_stop, "insertion failed");
        }

        let up = self.z(-self.down() * self.cfg.retract_speed);
        motion::timed_move(ctx, sink, &up, self.cfg.retract_ticks)?;

        Ok(DescentReport {
            success,
            fast_stop,
            fast_height,
            slow_stop,
            final_height,
        })
    }

    /// Poll height, publishing stop through short gaps. Errors once the gap
    /// exceeds the configured patience.
    fn read_height(
        ctx: &LoopCtx<'_>,
        sink: &mut dyn VelocitySink,
        height: &mut dyn HeightSource,
        gap: &mut u32,
    ) -> Result<Option<f64>> {
        match height.height().filter(|h| h.is_finite()) {
            Some(h) => {
                *gap = 0;
                Ok(Some(h))
            }
            None => {
                *gap += 1;
                motion::stop(sink)?;
                if *gap > ctx.cfg.height_patience_ticks {
                    return Err(eyre::Report::new(GuardError::HeightUnavailable { ticks: *gap }));
                }
                Ok(None)
            }
        }
    }

    fn align(
        &self,
        ctx: &LoopCtx<'_>,
        sink: &mut dyn VelocitySink,
        height: &mut dyn HeightSource,
    ) -> Result<()> {
        let target = self.cfg.approach_height;
        let mut ticker = ctx.ticker();
        let mut gap = 0;
        for tick in 0..self.cfg.align_max_ticks {
            if ctx.is_cancelled() {
                return Err(motion::cancelled(sink));
            }
            if let Some(h) = Self::read_height(ctx, sink, height, &mut gap)? {
                let err = h - target;
                if err.abs() <= self.cfg.align_tolerance {
                    motion::stop(sink)?;
                    tracing::debug!(height = h, ticks = tick, "aligned to approach height");
                    return Ok(());
                }
                // Above target moves down, below moves up.
                let dir = if err > 0.0 { self.down() } else { -self.down() };
                motion::publish(sink, &self.z(dir * self.cfg.align_speed))?;
            }
            ticker.wait();
        }
        motion::stop(sink)?;
        Err(eyre::Report::new(GuardError::AlignExpired {
            ticks: self.cfg.align_max_ticks,
        }))
    }

    fn descend(
        &self,
        ctx: &LoopCtx<'_>,
        sink: &mut dyn VelocitySink,
        height: &mut dyn HeightSource,
        force: &ForceHandle,
        phase: &Phase,
    ) -> Result<(PhaseStop, f64)> {
        force.set_threshold(phase.threshold.axes())?;
        force.reset_flag();
        motion::await_warm(ctx, sink, force)?;

        let cmd = self.z(self.down() * phase.speed);
        let mut ticker = ctx.ticker();
        let mut gap = 0;
        let mut last_height = f64::NAN;
        let mut stop = PhaseStop::TickBudget;
        for _ in 0..self.cfg.phase_max_ticks {
            if ctx.is_cancelled() {
                return Err(motion::cancelled(sink));
            }
            if force.flag_exceeded() {
                stop = PhaseStop::ForceLimit;
                break;
            }
            if let Some(h) = Self::read_height(ctx, sink, height, &mut gap)? {
                last_height = h;
                if h <= phase.cutoff {
                    stop = PhaseStop::HeightCutoff;
                    break;
                }
                motion::publish(sink, &cmd)?;
            }
            ticker.wait();
        }
        motion::stop(sink)?;

        if !last_height.is_finite() {
            // Contact before any reading this phase; take one now.
            last_height = Self::read_height(ctx, sink, height, &mut gap)?.unwrap_or(f64::NAN);
        }
        let trip = force.last_trip();
        tracing::info!(
            phase = phase.name,
            ?stop,
            height = last_height,
            trip_axis = trip.map(|t| t.axis_name()),
            "descent phase finished"
        );
        Ok((stop, last_height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_cutoffs() {
        let cfg = DescentCfg {
            slow_cutoff: 0.25,
            ..DescentCfg::default()
        };
        assert!(matches!(
            GuardedDescentController::new(cfg),
            Err(GuardError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_non_positive_threshold() {
        let cfg = DescentCfg {
            slow_threshold: [6.0, -1.0, 8.0],
            ..DescentCfg::default()
        };
        assert!(GuardedDescentController::new(cfg).is_err());
    }

    #[test]
    fn tool_frame_descends_with_positive_z() {
        let c = GuardedDescentController::new(DescentCfg {
            frame: ReferenceFrame::Tool,
            ..DescentCfg::default()
        })
        .unwrap();
        assert_eq!(c.down(), 1.0);
        let base = GuardedDescentController::new(DescentCfg::default()).unwrap();
        assert_eq!(base.down(), -1.0);
    }
}
