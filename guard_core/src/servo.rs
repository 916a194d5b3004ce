//! Image-based alignment over a target.
//!
//! A relay controller: each tick turns the latest target error into a
//! velocity command with three speed levels per axis (stop, reduced, full),
//! chosen by the error magnitude against a deadband and a slow band.

use guard_traits::{ReferenceFrame, TargetError, TargetErrorEstimator, Twist, VelocityCommand, VelocitySink};

use crate::config::ServoCfg;
use crate::error::{GuardError, Result};
use crate::motion::{self, LoopCtx};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoOutcome {
    /// Every mapped error component is inside the deadband.
    Converged,
    /// No target for `lost_patience` consecutive ticks.
    TargetLost,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct VisualServoLoop {
    cfg: ServoCfg,
}

impl VisualServoLoop {
    pub fn new(cfg: ServoCfg) -> std::result::Result<Self, GuardError> {
        let invalid = |m: &str| Err(GuardError::InvalidConfig(m.to_owned()));
        if !(cfg.deadband.is_finite() && cfg.deadband > 0.0) {
            return invalid("servo deadband must be > 0");
        }
        if !(cfg.slow_band.is_finite() && cfg.slow_band >= cfg.deadband) {
            return invalid("servo slow band must be >= deadband");
        }
        if !(cfg.step_speed.is_finite() && cfg.step_speed > 0.0) {
            return invalid("servo step speed must be > 0");
        }
        if !(cfg.reduced_ratio > 0.0 && cfg.reduced_ratio <= 1.0) {
            return invalid("servo reduced ratio must be in (0, 1]");
        }
        if cfg.axes.is_empty() {
            return invalid("servo needs at least one axis");
        }
        if cfg.frame == ReferenceFrame::Mixed {
            return invalid("servo frame must be tool or base");
        }
        if cfg.lost_patience == Some(0) {
            return invalid("servo lost patience must be >= 1 when set");
        }
        Ok(Self { cfg })
    }

    pub fn cfg(&self) -> &ServoCfg {
        &self.cfg
    }

    /// Unsigned speed for an error magnitude.
    pub fn speed_for(&self, error: f64) -> f64 {
        let e = error.abs();
        if !e.is_finite() || e < self.cfg.deadband {
            0.0
        } else if e <= self.cfg.slow_band {
            self.cfg.step_speed * self.cfg.reduced_ratio
        } else {
            self.cfg.step_speed
        }
    }

    /// Command for one error estimate, and whether it counts as converged.
    ///
    /// Components missing from the estimate count as aligned, and so do
    /// non-finite ones; `run` filters those out before they get here.
    pub fn command_for(&self, err: &TargetError) -> (VelocityCommand, bool) {
        let mut twist = Twist::zero();
        let mut converged = true;
        for a in &self.cfg.axes {
            let e = err.component(a.error_index).unwrap_or(0.0);
            let speed = self.speed_for(e);
            let mut v = if speed == 0.0 { 0.0 } else { a.sign * e.signum() * speed };
            if v != 0.0 {
                converged = false;
            }
            if let Some(max) = a.max_speed {
                v = v.clamp(-max, max);
            }
            twist.set(a.axis, v);
        }
        (VelocityCommand::new(twist, self.cfg.frame), converged)
    }

    /// Drive the arm until converged, target lost or cancelled.
    ///
    /// Always publishes the stop command before returning. Sink failures
    /// abort with `GuardError::Actuation`.
    pub fn run(
        &self,
        ctx: &LoopCtx<'_>,
        estimator: &mut dyn TargetErrorEstimator,
        sink: &mut dyn VelocitySink,
    ) -> Result<ServoOutcome> {
        let mut ticker = ctx.ticker();
        let mut lost = 0u32;
        let mut ticks = 0u64;
        loop {
            if ctx.is_cancelled() {
                // Cancellation is an outcome here, not an error.
                motion::stop(sink)?;
                tracing::info!(ticks, "servo cancelled");
                return Ok(ServoOutcome::Cancelled);
            }

            // A non-finite error is as good as no target.
            let estimate = estimator
                .estimate()
                .filter(|e| e.components().iter().all(|c| c.is_finite()));
            match estimate {
                Some(err) => {
                    lost = 0;
                    let (cmd, converged) = self.command_for(&err);
                    if converged {
                        motion::stop(sink)?;
                        tracing::info!(ticks, error = ?err.components(), "servo converged");
                        return Ok(ServoOutcome::Converged);
                    }
                    tracing::trace!(error = ?err.components(), twist = ?cmd.twist.linear, "servo step");
                    motion::publish(sink, &cmd)?;
                }
                None => {
                    lost = lost.saturating_add(1);
                    if lost == 1 {
                        tracing::debug!("servo target not visible");
                    }
                    if self.cfg.lost_patience.is_some_and(|p| lost >= p) {
                        motion::stop(sink)?;
                        tracing::warn!(ticks = lost, "servo target lost");
                        return Ok(ServoOutcome::TargetLost);
                    }
                    motion::stop(sink)?;
                }
            }
            ticker.wait();
            ticks += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServoAxis;
    use guard_traits::Axis;

    fn servo() -> VisualServoLoop {
        VisualServoLoop::new(ServoCfg::default()).unwrap()
    }

    #[test]
    fn speed_bands() {
        let s = servo();
        assert_eq!(s.speed_for(3.9), 0.0);
        assert_eq!(s.speed_for(-4.0), 0.005);
        assert_eq!(s.speed_for(40.0), 0.005);
        assert_eq!(s.speed_for(40.1), 0.01);
        assert_eq!(s.speed_for(f64::NAN), 0.0);
    }

    #[test]
    fn command_follows_error_sign_and_mapping() {
        let s = VisualServoLoop::new(ServoCfg {
            axes: vec![
                ServoAxis {
                    error_index: 0,
                    axis: Axis::LinearY,
                    sign: -1.0,
                    max_speed: Some(0.002),
                },
                ServoAxis {
                    error_index: 1,
                    axis: Axis::LinearX,
                    sign: 1.0,
                    max_speed: None,
                },
            ],
            ..ServoCfg::default()
        })
        .unwrap();
        let (cmd, converged) = s.command_for(&TargetError::Planar([100.0, -10.0]));
        assert!(!converged);
        assert_eq!(cmd.twist.get(Axis::LinearY), -0.002);
        assert_eq!(cmd.twist.get(Axis::LinearX), -0.005);
        assert_eq!(cmd.frame, ReferenceFrame::Base);
    }

    #[test]
    fn inside_deadband_converges() {
        let (cmd, converged) = servo().command_for(&TargetError::Planar([3.0, -3.0]));
        assert!(converged);
        assert!(cmd.twist.is_zero());
    }

    #[test]
    fn rejects_bad_config() {
        let bad = ServoCfg {
            slow_band: 1.0,
            ..ServoCfg::default()
        };
        assert!(matches!(
            VisualServoLoop::new(bad),
            Err(GuardError::InvalidConfig(_))
        ));
        let mixed = ServoCfg {
            frame: ReferenceFrame::Mixed,
            ..ServoCfg::default()
        };
        assert!(VisualServoLoop::new(mixed).is_err());
    }
}
