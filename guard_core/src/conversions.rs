//! `From` implementations bridging `guard_config` sections to `guard_core` configs.

use std::time::Duration;

use guard_traits::{Axis, ReferenceFrame};

use crate::config::{
    ApproachCfg, DescentCfg, ForceCfg, InsertionCfg, LoopCfg, ServoAxis, ServoCfg, SuccessBand,
};

fn secs(s: f64) -> Duration {
    // Rejected values become zero and fail controller validation.
    Duration::try_from_secs_f64(s).unwrap_or(Duration::ZERO)
}

// ── Names ────────────────────────────────────────────────────────────────────

// Both sides are foreign to this crate, so these are plain functions.
fn axis_of(a: guard_config::AxisName) -> Axis {
    use guard_config::AxisName as A;
    match a {
        A::X => Axis::LinearX,
        A::Y => Axis::LinearY,
        A::Z => Axis::LinearZ,
        A::Rx => Axis::AngularX,
        A::Ry => Axis::AngularY,
        A::Rz => Axis::AngularZ,
    }
}

fn frame_of(f: guard_config::FrameName) -> ReferenceFrame {
    use guard_config::FrameName as F;
    match f {
        F::Tool => ReferenceFrame::Tool,
        F::Base => ReferenceFrame::Base,
        F::Mixed => ReferenceFrame::Mixed,
    }
}

// ── LoopCfg / ForceCfg ───────────────────────────────────────────────────────

impl From<&guard_config::ControlCfg> for LoopCfg {
    fn from(c: &guard_config::ControlCfg) -> Self {
        Self {
            rate_hz: c.rate_hz,
            warmup_patience_ticks: c.warmup_patience_ticks,
            height_patience_ticks: c.height_patience_ticks,
        }
    }
}

impl From<&guard_config::ForceCfg> for ForceCfg {
    fn from(c: &guard_config::ForceCfg) -> Self {
        Self {
            window: c.window,
            warmup: c.warmup,
            sample_rate_hz: c.sample_rate_hz,
            read_timeout: Duration::from_millis(c.read_timeout_ms),
        }
    }
}

// ── ServoCfg ─────────────────────────────────────────────────────────────────

impl From<&guard_config::ServoAxisCfg> for ServoAxis {
    fn from(c: &guard_config::ServoAxisCfg) -> Self {
        Self {
            error_index: c.error,
            axis: axis_of(c.axis),
            sign: c.sign,
            max_speed: c.max_speed,
        }
    }
}

impl From<&guard_config::ServoCfg> for ServoCfg {
    fn from(c: &guard_config::ServoCfg) -> Self {
        Self {
            deadband: c.deadband,
            slow_band: c.slow_band,
            step_speed: c.step_speed,
            reduced_ratio: c.reduced_ratio,
            frame: frame_of(c.frame),
            lost_patience: (c.lost_patience > 0).then_some(c.lost_patience),
            axes: c.axes.iter().map(ServoAxis::from).collect(),
        }
    }
}

// ── DescentCfg ───────────────────────────────────────────────────────────────

impl From<&guard_config::DescentCfg> for DescentCfg {
    fn from(c: &guard_config::DescentCfg) -> Self {
        Self {
            approach_height: c.approach_height,
            align_speed: c.align_speed,
            align_tolerance: c.align_tolerance,
            align_max_ticks: c.align_max_ticks,
            fast_speed: c.fast_speed,
            fast_cutoff: c.fast_cutoff,
            fast_threshold: c.fast_threshold,
            slow_speed: c.slow_speed,
            slow_cutoff: c.slow_cutoff,
            slow_threshold: c.slow_threshold,
            phase_max_ticks: c.phase_max_ticks,
            success: SuccessBand {
                below: c.success_below,
                above: c.success_above,
                inclusive: c.success_inclusive,
            },
            retract_speed: c.retract_speed,
            retract_ticks: c.retract_ticks,
            frame: frame_of(c.frame),
        }
    }
}

// ── ApproachCfg / InsertionCfg ───────────────────────────────────────────────

impl From<&guard_config::ApproachCfg> for ApproachCfg {
    fn from(c: &guard_config::ApproachCfg) -> Self {
        Self {
            axis: axis_of(c.axis),
            distance: c.distance,
            duration: secs(c.time_s),
            threshold: c.threshold,
            retract: c.retract,
            retract_distance: c.retract_distance,
            retract_duration: secs(c.retract_time_s),
            frame: frame_of(c.frame),
        }
    }
}

impl From<&guard_config::InsertionCfg> for InsertionCfg {
    fn from(c: &guard_config::InsertionCfg) -> Self {
        Self {
            max_retries: c.max_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_line_up() {
        let cfg = guard_config::Config::default();
        assert_eq!(LoopCfg::from(&cfg.control), LoopCfg::default());
        assert_eq!(ForceCfg::from(&cfg.force), ForceCfg::default());
        assert_eq!(ServoCfg::from(&cfg.servo), ServoCfg::default());
        assert_eq!(DescentCfg::from(&cfg.descent), DescentCfg::default());
        assert_eq!(ApproachCfg::from(&cfg.approach), ApproachCfg::default());
        assert_eq!(InsertionCfg::from(&cfg.insertion), InsertionCfg::default());
    }

    #[test]
    fn zero_patience_waits_forever() {
        let mut c = guard_config::ServoCfg::default();
        c.lost_patience = 0;
        assert_eq!(ServoCfg::from(&c).lost_patience, None);
        c.lost_patience = 7;
        assert_eq!(ServoCfg::from(&c).lost_patience, Some(7));
    }

    #[test]
    fn names_map_to_axes_and_frames() {
        use guard_config::{AxisName, FrameName};
        assert_eq!(axis_of(AxisName::Y), Axis::LinearY);
        assert_eq!(axis_of(AxisName::Rz), Axis::AngularZ);
        assert_eq!(frame_of(FrameName::Tool), ReferenceFrame::Tool);
        let c = guard_config::ApproachCfg {
            axis: AxisName::X,
            frame: FrameName::Base,
            ..Default::default()
        };
        let a = ApproachCfg::from(&c);
        assert_eq!(a.axis, Axis::LinearX);
        assert_eq!(a.frame, ReferenceFrame::Base);
    }

    #[test]
    fn negative_time_maps_to_zero() {
        let c = guard_config::ApproachCfg {
            time_s: -1.0,
            ..Default::default()
        };
        assert_eq!(ApproachCfg::from(&c).duration, Duration::ZERO);
    }
}
