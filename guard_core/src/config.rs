//! Runtime configuration for the controllers.
//!
//! These are the validated, typed forms of the `guard_config` TOML sections;
//! see `conversions` for the mapping. Constructors on the controllers check
//! the invariants again so that programmatic callers get the same guarantees.

use std::time::Duration;

use guard_traits::{Axis, ReferenceFrame};

/// Shared loop settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopCfg {
    pub rate_hz: u32,
    /// Ticks to wait for the force window to warm up.
    pub warmup_patience_ticks: u32,
    /// Consecutive ticks without height feedback tolerated inside a phase.
    pub height_patience_ticks: u32,
}

impl Default for LoopCfg {
    fn default() -> Self {
        Self {
            rate_hz: 10,
            warmup_patience_ticks: 50,
            height_patience_ticks: 20,
        }
    }
}

/// Force window sizing and sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceCfg {
    pub window: usize,
    pub warmup: usize,
    pub sample_rate_hz: u32,
    pub read_timeout: Duration,
}

impl Default for ForceCfg {
    fn default() -> Self {
        Self {
            window: 25,
            warmup: 20,
            sample_rate_hz: 40,
            read_timeout: Duration::from_millis(50),
        }
    }
}

/// Maps one component of the target error onto one velocity axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoAxis {
    pub error_index: usize,
    pub axis: Axis,
    /// +1.0 or -1.0.
    pub sign: f64,
    pub max_speed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServoCfg {
    pub deadband: f64,
    pub slow_band: f64,
    pub step_speed: f64,
    pub reduced_ratio: f64,
    pub frame: ReferenceFrame,
    /// Give up after this many consecutive ticks without a target.
    /// `None` keeps waiting until cancelled.
    pub lost_patience: Option<u32>,
    pub axes: Vec<ServoAxis>,
}

impl Default for ServoCfg {
    fn default() -> Self {
        Self {
            deadband: 4.0,
            slow_band: 40.0,
            step_speed: 0.01,
            reduced_ratio: 0.5,
            frame: ReferenceFrame::Base,
            lost_patience: None,
            axes: vec![
                ServoAxis {
                    error_index: 0,
                    axis: Axis::LinearX,
                    sign: 1.0,
                    max_speed: None,
                },
                ServoAxis {
                    error_index: 1,
                    axis: Axis::LinearY,
                    sign: 1.0,
                    max_speed: None,
                },
            ],
        }
    }
}

/// Final heights counted as a successful insertion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuccessBand {
    pub below: f64,
    pub above: Option<f64>,
    /// Whether the edges themselves count.
    pub inclusive: bool,
}

impl SuccessBand {
    pub fn contains(&self, h: f64) -> bool {
        if !h.is_finite() {
            return false;
        }
        let under = if self.inclusive {
            h <= self.below
        } else {
            h < self.below
        };
        let over = match self.above {
            None => true,
            Some(a) if self.inclusive => h >= a,
            Some(a) => h > a,
        };
        under && over
    }
}

impl Default for SuccessBand {
    fn default() -> Self {
        Self {
            below: 0.195,
            above: None,
            inclusive: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescentCfg {
    pub approach_height: f64,
    pub align_speed: f64,
    pub align_tolerance: f64,
    pub align_max_ticks: u32,
    pub fast_speed: f64,
    pub fast_cutoff: f64,
    pub fast_threshold: [f64; 3],
    pub slow_speed: f64,
    pub slow_cutoff: f64,
    pub slow_threshold: [f64; 3],
    /// Ticks a single descent phase may run before it is stopped.
    pub phase_max_ticks: u32,
    pub success: SuccessBand,
    pub retract_speed: f64,
    pub retract_ticks: u32,
    /// Tool (z down) or Base (z up).
    pub frame: ReferenceFrame,
}

impl Default for DescentCfg {
    fn default() -> Self {
        Self {
            approach_height: 0.30,
            align_speed: 0.01,
            align_tolerance: 0.001,
            align_max_ticks: 300,
            fast_speed: 0.02,
            fast_cutoff: 0.235,
            fast_threshold: [4.0, 4.0, 3.0],
            slow_speed: 0.005,
            slow_cutoff: 0.185,
            slow_threshold: [6.0, 6.0, 8.0],
            phase_max_ticks: 600,
            success: SuccessBand::default(),
            retract_speed: 0.01,
            retract_ticks: 50,
            frame: ReferenceFrame::Base,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApproachCfg {
    pub axis: Axis,
    /// Signed travel along `axis`; the sign picks the direction.
    pub distance: f64,
    pub duration: Duration,
    pub threshold: [f64; 3],
    pub retract: bool,
    pub retract_distance: f64,
    pub retract_duration: Duration,
    pub frame: ReferenceFrame,
}

impl Default for ApproachCfg {
    fn default() -> Self {
        Self {
            axis: Axis::LinearZ,
            distance: 0.05,
            duration: Duration::from_secs(3),
            threshold: [4.0, 4.0, 2.0],
            retract: true,
            retract_distance: 0.01,
            retract_duration: Duration::from_secs(1),
            frame: ReferenceFrame::Tool,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertionCfg {
    pub max_retries: u32,
}

impl Default for InsertionCfg {
    fn default() -> Self {
        Self { max_retries: 5 }
    }
}
