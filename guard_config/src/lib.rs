#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and sensor-trace parsing for guarded motions.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//!   Every numeric constant the controllers use is tunable here per task.
//! - The trace CSV loader enforces headers and row shape; traces drive
//!   dry runs without an arm attached.
use serde::Deserialize;

/// Trace CSV schema.
///
/// Expected headers:
/// height,fx,fy,fz
///
/// Example:
/// height,fx,fy,fz
/// 0.300,0.0,0.0,0.1
/// 0.290,0.0,0.0,0.1
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TraceRow {
    pub height: f64,
    pub fx: f64,
    pub fy: f64,
    pub fz: f64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrameName {
    #[default]
    Tool,
    Base,
    Mixed,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AxisName {
    X,
    Y,
    Z,
    Rx,
    Ry,
    Rz,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    /// Control loop rate for every guarded motion.
    pub rate_hz: u32,
    /// Ticks to wait for the force window to fill before giving up.
    pub warmup_patience_ticks: u32,
    /// Consecutive ticks without height feedback tolerated inside a phase.
    pub height_patience_ticks: u32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            rate_hz: 10,
            warmup_patience_ticks: 50,
            height_patience_ticks: 20,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ForceCfg {
    /// Rolling window capacity (samples).
    pub window: usize,
    /// Samples required before deviation is evaluated.
    pub warmup: usize,
    /// Force sensor sampling rate.
    pub sample_rate_hz: u32,
    /// Max wait per force read (ms).
    pub read_timeout_ms: u64,
}

impl Default for ForceCfg {
    fn default() -> Self {
        Self {
            window: 25,
            warmup: 20,
            sample_rate_hz: 40,
            read_timeout_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ServoAxisCfg {
    /// Index into the estimator's error vector.
    pub error: usize,
    /// Velocity axis driven by that error component.
    pub axis: AxisName,
    /// +1.0 or -1.0; maps error sign to motion direction.
    #[serde(default = "default_sign")]
    pub sign: f64,
    /// Optional per-axis speed cap (m/s or rad/s).
    #[serde(default)]
    pub max_speed: Option<f64>,
}

fn default_sign() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServoCfg {
    /// Errors with |e| below this are treated as aligned.
    pub deadband: f64,
    /// Errors with |e| up to this use the reduced speed.
    pub slow_band: f64,
    /// Full step speed.
    pub step_speed: f64,
    /// Reduced speed as a fraction of `step_speed`.
    pub reduced_ratio: f64,
    pub frame: FrameName,
    /// Consecutive no-target ticks before giving up; 0 waits for cancellation.
    pub lost_patience: u32,
    pub axes: Vec<ServoAxisCfg>,
}

impl Default for ServoCfg {
    fn default() -> Self {
        Self {
            deadband: 4.0,
            slow_band: 40.0,
            step_speed: 0.01,
            reduced_ratio: 0.5,
            frame: FrameName::Base,
            lost_patience: 0,
            axes: vec![
                ServoAxisCfg {
                    error: 0,
                    axis: AxisName::X,
                    sign: 1.0,
                    max_speed: None,
                },
                ServoAxisCfg {
                    error: 1,
                    axis: AxisName::Y,
                    sign: 1.0,
                    max_speed: None,
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DescentCfg {
    /// Height the align phase settles at before descending.
    pub approach_height: f64,
    pub align_speed: f64,
    pub align_tolerance: f64,
    pub align_max_ticks: u32,
    pub fast_speed: f64,
    /// Fast descent stops at or below this height ("near hole").
    pub fast_cutoff: f64,
    pub fast_threshold: [f64; 3],
    pub slow_speed: f64,
    /// Slow descent stops at or below this height ("already inside").
    pub slow_cutoff: f64,
    pub slow_threshold: [f64; 3],
    /// Ticks a single descent phase may run before it is stopped.
    pub phase_max_ticks: u32,
    /// Success when the final height is below this.
    pub success_below: f64,
    /// Optional lower bound of the success band.
    pub success_above: Option<f64>,
    /// Whether band edges count as success.
    pub success_inclusive: bool,
    pub retract_speed: f64,
    pub retract_ticks: u32,
    pub frame: FrameName,
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
            success_below: 0.195,
            success_above: None,
            success_inclusive: false,
            retract_speed: 0.01,
            retract_ticks: 50,
            frame: FrameName::Base,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApproachCfg {
    pub axis: AxisName,
    /// Signed travel budget along `axis` (m).
    pub distance: f64,
    /// Time budget for `distance` (s).
    pub time_s: f64,
    pub threshold: [f64; 3],
    pub retract: bool,
    pub retract_distance: f64,
    pub retract_time_s: f64,
    pub frame: FrameName,
}

impl Default for ApproachCfg {
    fn default() -> Self {
        Self {
            axis: AxisName::Z,
            distance: 0.05,
            time_s: 3.0,
            threshold: [4.0, 4.0, 2.0],
            retract: true,
            retract_distance: 0.01,
            retract_time_s: 1.0,
            frame: FrameName::Tool,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InsertionCfg {
    pub max_retries: u32,
}

impl Default for InsertionCfg {
    fn default() -> Self {
        Self { max_retries: 5 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Simulated arm used by dry runs.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimCfg {
    pub start: [f64; 3],
    pub surface_height: f64,
    pub hole_center: [f64; 2],
    pub hole_radius: f64,
    pub hole_bottom: f64,
    pub stiffness: f64,
    pub max_penetration: f64,
    pub noise: f64,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            start: [0.0, 0.0, 0.30],
            surface_height: 0.22,
            hole_center: [0.0, 0.0],
            hole_radius: 0.004,
            hole_bottom: 0.17,
            stiffness: 20_000.0,
            max_penetration: 0.005,
            noise: 0.05,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub force: ForceCfg,
    #[serde(default)]
    pub servo: ServoCfg,
    #[serde(default)]
    pub descent: DescentCfg,
    #[serde(default)]
    pub approach: ApproachCfg,
    #[serde(default)]
    pub insertion: InsertionCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub sim: SimCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_trace_csv(path: &std::path::Path) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open trace CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["height", "fx", "fy", "fz"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "trace CSV must have headers 'height,fx,fy,fz', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        match rec {
            Ok(row) => {
                if ![row.height, row.fx, row.fy, row.fz].iter().all(|v| v.is_finite()) {
                    eyre::bail!("trace CSV row {} has non-finite values", idx + 2);
                }
                rows.push(row);
            }
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.is_empty() {
        eyre::bail!("trace CSV {:?} has no rows", path);
    }
    Ok(rows)
}

fn check_threshold(name: &str, t: &[f64; 3]) -> eyre::Result<()> {
    if t.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
        eyre::bail!("{name} axes must all be > 0");
    }
    Ok(())
}

fn check_positive(name: &str, v: f64) -> eyre::Result<()> {
    if !(v.is_finite() && v > 0.0) {
        eyre::bail!("{name} must be > 0");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Control
        if self.control.rate_hz == 0 {
            eyre::bail!("control.rate_hz must be > 0");
        }
        if self.control.rate_hz > 1_000 {
            eyre::bail!("control.rate_hz is unreasonably large (>1kHz)");
        }
        if self.control.warmup_patience_ticks == 0 {
            eyre::bail!("control.warmup_patience_ticks must be >= 1");
        }
        if self.control.height_patience_ticks == 0 {
            eyre::bail!("control.height_patience_ticks must be >= 1");
        }

        // Force
        if self.force.window == 0 {
            eyre::bail!("force.window must be >= 1");
        }
        if self.force.warmup == 0 {
            eyre::bail!("force.warmup must be >= 1");
        }
        if self.force.warmup > self.force.window {
            eyre::bail!("force.warmup must be <= force.window");
        }
        if self.force.sample_rate_hz == 0 {
            eyre::bail!("force.sample_rate_hz must be > 0");
        }
        if self.force.read_timeout_ms == 0 {
            eyre::bail!("force.read_timeout_ms must be >= 1");
        }

        // Servo
        check_positive("servo.deadband", self.servo.deadband)?;
        if !(self.servo.slow_band.is_finite() && self.servo.slow_band >= self.servo.deadband) {
            eyre::bail!("servo.slow_band must be >= servo.deadband");
        }
        check_positive("servo.step_speed", self.servo.step_speed)?;
        if !(self.servo.reduced_ratio > 0.0 && self.servo.reduced_ratio <= 1.0) {
            eyre::bail!("servo.reduced_ratio must be in (0.0, 1.0]");
        }
        if self.servo.axes.is_empty() {
            eyre::bail!("servo.axes must list at least one axis");
        }
        for a in &self.servo.axes {
            if a.error > 2 {
                eyre::bail!("servo.axes error index must be 0, 1 or 2");
            }
            if a.sign != 1.0 && a.sign != -1.0 {
                eyre::bail!("servo.axes sign must be 1.0 or -1.0");
            }
            if let Some(m) = a.max_speed {
                check_positive("servo.axes max_speed", m)?;
            }
        }

        // Descent
        let d = &self.descent;
        check_positive("descent.align_speed", d.align_speed)?;
        check_positive("descent.align_tolerance", d.align_tolerance)?;
        if d.align_max_ticks == 0 {
            eyre::bail!("descent.align_max_ticks must be >= 1");
        }
        if d.phase_max_ticks == 0 {
            eyre::bail!("descent.phase_max_ticks must be >= 1");
        }
        check_positive("descent.fast_speed", d.fast_speed)?;
        check_positive("descent.slow_speed", d.slow_speed)?;
        check_positive("descent.retract_speed", d.retract_speed)?;
        check_threshold("descent.fast_threshold", &d.fast_threshold)?;
        check_threshold("descent.slow_threshold", &d.slow_threshold)?;
        if d.slow_cutoff >= d.fast_cutoff {
            eyre::bail!("descent.slow_cutoff must be < descent.fast_cutoff");
        }
        if d.fast_cutoff >= d.approach_height {
            eyre::bail!("descent.fast_cutoff must be < descent.approach_height");
        }
        if let Some(above) = d.success_above
            && above >= d.success_below
        {
            eyre::bail!("descent.success_above must be < descent.success_below");
        }

        // Approach
        let a = &self.approach;
        if !(a.distance.is_finite() && a.distance != 0.0) {
            eyre::bail!("approach.distance must be non-zero");
        }
        check_positive("approach.time_s", a.time_s)?;
        check_threshold("approach.threshold", &a.threshold)?;
        if a.retract {
            check_positive("approach.retract_distance", a.retract_distance)?;
            check_positive("approach.retract_time_s", a.retract_time_s)?;
        }

        // Frames: the neutral frame is reserved for the stop command.
        for (name, f) in [
            ("servo.frame", self.servo.frame),
            ("descent.frame", self.descent.frame),
            ("approach.frame", self.approach.frame),
        ] {
            if f == FrameName::Mixed {
                eyre::bail!("{name} must be tool or base");
            }
        }

        // Insertion
        if self.insertion.max_retries == 0 {
            eyre::bail!("insertion.max_retries must be >= 1");
        }
        if self.insertion.max_retries > 100 {
            eyre::bail!("insertion.max_retries is unreasonably large (>100)");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
