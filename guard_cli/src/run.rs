//! Command runners: wire the simulated arm (or a trace) to the controllers.
//!
//! Virtual runs use a `ManualClock` and sample force in lockstep with every
//! published command, so a full insertion finishes in milliseconds. Realtime
//! runs pace on the wall clock and sample force and height on background
//! threads.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eyre::WrapErr;
use guard_config::Config;
use guard_core::config::{self as core_cfg, LoopCfg};
use guard_core::util::period_us;
use guard_core::{
    CancelToken, CautionaryApproach, ForceHandle, GuardError, GuardedDescentController,
    InsertionOrchestrator, LatestHeight, LockstepSink, LoopCtx, Rig, RigSteps, Sampler,
    VisualServoLoop, force_handle,
};
use guard_hardware::{SimParams, SimulatedArm, TracePlayback, TraceSample};
use guard_traits::{
    BoxError, Clock, HeightSource, ManualClock, MonotonicClock, TargetErrorEstimator,
    VelocityCommand, VelocitySink,
};
use serde_json::json;

/// How long a realtime height reading stays usable.
const HEIGHT_MAX_AGE: Duration = Duration::from_millis(500);

/// Result of one command, printed to stdout.
pub struct Outcome {
    pub success: bool,
    pub summary: String,
    pub json: serde_json::Value,
}

fn invalid(msg: impl Into<String>) -> eyre::Report {
    eyre::Report::new(GuardError::InvalidConfig(msg.into()))
}

fn sim_params(cfg: &Config) -> SimParams {
    let s = &cfg.sim;
    SimParams {
        start: s.start,
        surface_height: s.surface_height,
        hole_center: s.hole_center,
        hole_radius: s.hole_radius,
        hole_bottom: s.hole_bottom,
        stiffness: s.stiffness,
        max_penetration: s.max_penetration,
        noise: s.noise,
        dt: Duration::from_micros(period_us(cfg.control.rate_hz)),
        ..SimParams::default()
    }
}

/// Force samples taken per control tick in lockstep mode.
fn samples_per_tick(cfg: &Config) -> usize {
    let rate = cfg.control.rate_hz.max(1);
    usize::try_from(cfg.force.sample_rate_hz.div_ceil(rate)).unwrap_or(1)
}

fn load_trace(path: &Path) -> eyre::Result<TracePlayback> {
    let rows = guard_config::load_trace_csv(path)?;
    Ok(TracePlayback::new(
        rows.into_iter()
            .map(|r| TraceSample {
                height: r.height,
                force: [r.fx, r.fy, r.fz],
            })
            .collect(),
    ))
}

/// Everything a controller needs, behind trait objects so virtual and
/// realtime wiring share one code path.
struct Wiring {
    sink: Box<dyn VelocitySink + Send>,
    height: Box<dyn HeightSource + Send>,
    estimator: Box<dyn TargetErrorEstimator + Send>,
    force: ForceHandle,
    clock: Arc<dyn Clock + Send + Sync>,
    // Joined on drop, after the sink has stopped commanding the arm.
    _force_sampler: Option<Sampler<[f64; 3]>>,
}

impl Wiring {
    fn sim(cfg: &Config, arm: &SimulatedArm, realtime: bool) -> eyre::Result<Self> {
        let force_cfg = core_cfg::ForceCfg::from(&cfg.force);
        let force = force_handle(&force_cfg)?;
        if realtime {
            let sampler = Sampler::spawn_force(
                arm.force_sensor(),
                force.clone(),
                force_cfg.sample_rate_hz,
                force_cfg.read_timeout,
                MonotonicClock::new(),
            );
            let heights = Sampler::spawn(
                arm.height_sensor(),
                force_cfg.sample_rate_hz,
                force_cfg.read_timeout,
                MonotonicClock::new(),
            );
            Ok(Self {
                sink: Box::new(arm.sink()),
                height: Box::new(LatestHeight::new(heights, Some(HEIGHT_MAX_AGE))),
                estimator: Box::new(arm.camera()),
                force,
                clock: Arc::new(MonotonicClock::new()),
                _force_sampler: Some(sampler),
            })
        } else {
            Ok(Self {
                sink: Box::new(LockstepSink::new(
                    arm.sink(),
                    arm.force_sensor(),
                    force.clone(),
                    samples_per_tick(cfg),
                    force_cfg.read_timeout,
                )),
                height: Box::new(arm.height_sensor()),
                estimator: Box::new(arm.camera()),
                force,
                clock: Arc::new(ManualClock::new()),
                _force_sampler: None,
            })
        }
    }

    /// Replay a trace against a dry-run sink. Always virtual time.
    fn trace(cfg: &Config, playback: &TracePlayback) -> eyre::Result<Self> {
        let force_cfg = core_cfg::ForceCfg::from(&cfg.force);
        let force = force_handle(&force_cfg)?;
        Ok(Self {
            sink: Box::new(LockstepSink::new(
                DryRunSink,
                playback.forces(),
                force.clone(),
                samples_per_tick(cfg),
                force_cfg.read_timeout,
            )),
            height: Box::new(playback.heights()),
            estimator: Box::new(NoCamera),
            force,
            clock: Arc::new(ManualClock::new()),
            _force_sampler: None,
        })
    }
}

/// Commands go nowhere during trace replay.
struct DryRunSink;

impl VelocitySink for DryRunSink {
    fn publish(&mut self, cmd: &VelocityCommand) -> Result<(), BoxError> {
        tracing::trace!(linear = ?cmd.twist.linear, "dry-run command");
        Ok(())
    }
}

/// Traces carry no images.
struct NoCamera;

impl TargetErrorEstimator for NoCamera {
    fn estimate(&mut self) -> Option<guard_traits::TargetError> {
        None
    }
}

fn position_json(arm: &SimulatedArm) -> serde_json::Value {
    let [x, y, z] = arm.position();
    json!({ "x": x, "y": y, "z": z })
}

pub fn run_insert(
    cfg: &Config,
    cancel: &CancelToken,
    max_retries: Option<u32>,
    realtime: bool,
    trace: Option<&Path>,
) -> eyre::Result<Outcome> {
    if trace.is_some() {
        return Err(invalid("--trace has no camera data; use it with descend or approach"));
    }
    let retries = max_retries.unwrap_or(cfg.insertion.max_retries);
    if retries == 0 {
        return Err(invalid("--max-retries must be >= 1"));
    }
    let servo = VisualServoLoop::new((&cfg.servo).into())?;
    let descent = GuardedDescentController::new((&cfg.descent).into())?;

    let arm = SimulatedArm::new(sim_params(cfg));
    let w = Wiring::sim(cfg, &arm, realtime)?;
    let rig = Rig {
        sink: w.sink,
        height: w.height,
        estimator: w.estimator,
        force: w.force,
        clock: w.clock,
        cancel: cancel.clone(),
        loop_cfg: LoopCfg::from(&cfg.control),
    };
    let mut orchestrator = InsertionOrchestrator::new(RigSteps::new(rig, servo, descent));
    let inserted = orchestrator
        .attempt_insertion(retries)
        .wrap_err("insertion")?;
    drop(orchestrator);

    let summary = if inserted {
        "Inserted".to_string()
    } else {
        format!("Insertion failed after {retries} attempts")
    };
    Ok(Outcome {
        success: inserted,
        summary,
        json: json!({
            "command": "insert",
            "success": inserted,
            "max_retries": retries,
            "commands": arm.commands(),
            "position": position_json(&arm),
        }),
    })
}

pub fn run_descend(
    cfg: &Config,
    cancel: &CancelToken,
    realtime: bool,
    trace: Option<&Path>,
) -> eyre::Result<Outcome> {
    let controller = GuardedDescentController::new((&cfg.descent).into())?;
    let arm = SimulatedArm::new(sim_params(cfg));
    let mut w = match trace {
        Some(p) => {
            if realtime {
                return Err(invalid("--trace replays in virtual time; drop --realtime"));
            }
            Wiring::trace(cfg, &load_trace(p)?)?
        }
        None => Wiring::sim(cfg, &arm, realtime)?,
    };
    let loop_cfg = LoopCfg::from(&cfg.control);
    let ctx = LoopCtx::new(&*w.clock, cancel, loop_cfg);
    let report = controller
        .run(&ctx, &mut w.sink, &mut w.height, &w.force)
        .wrap_err("guarded descent")?;

    let verdict = if report.success { "Inserted" } else { "Not inserted" };
    Ok(Outcome {
        success: report.success,
        summary: format!(
            "{verdict}: fast phase {:?} at {:.4} m, slow phase {:?} at {:.4} m",
            report.fast_stop, report.fast_height, report.slow_stop, report.final_height
        ),
        json: json!({
            "command": "descend",
            "success": report.success,
            "fast_stop": format!("{:?}", report.fast_stop),
            "fast_height": report.fast_height,
            "slow_stop": format!("{:?}", report.slow_stop),
            "final_height": report.final_height,
        }),
    })
}

pub struct ApproachOverrides {
    pub distance: Option<f64>,
    pub time: Option<f64>,
    pub no_retract: bool,
}

pub fn run_approach(
    cfg: &Config,
    cancel: &CancelToken,
    overrides: &ApproachOverrides,
    realtime: bool,
    trace: Option<&Path>,
) -> eyre::Result<Outcome> {
    let mut acfg = core_cfg::ApproachCfg::from(&cfg.approach);
    if let Some(d) = overrides.distance {
        acfg.distance = d;
    }
    if let Some(t) = overrides.time {
        acfg.duration =
            Duration::try_from_secs_f64(t).map_err(|_| invalid("--time must be a positive number of seconds"))?;
    }
    if overrides.no_retract {
        acfg.retract = false;
    }
    let approach = CautionaryApproach::new(acfg)?;

    let arm = SimulatedArm::new(sim_params(cfg));
    let mut w = match trace {
        Some(p) => {
            if realtime {
                return Err(invalid("--trace replays in virtual time; drop --realtime"));
            }
            Wiring::trace(cfg, &load_trace(p)?)?
        }
        None => Wiring::sim(cfg, &arm, realtime)?,
    };
    let ctx = LoopCtx::new(&*w.clock, cancel, LoopCfg::from(&cfg.control));
    let report = approach
        .run(&ctx, &mut w.sink, &w.force)
        .wrap_err("cautionary approach")?;

    let trip = report.trip.map(|t| {
        json!({ "axis": t.axis_name(), "deviation": t.deviation, "threshold": t.threshold })
    });
    Ok(Outcome {
        success: true,
        summary: format!(
            "Approach stopped on {:?} after {} ticks{}",
            report.stop,
            report.ticks,
            if report.retracted { ", retracted" } else { "" }
        ),
        json: json!({
            "command": "approach",
            "stop": format!("{:?}", report.stop),
            "ticks": report.ticks,
            "retracted": report.retracted,
            "trip": trip,
        }),
    })
}

/// Build every controller from the config and parse the trace, moving nothing.
pub fn self_check(cfg: &Config, trace: Option<&Path>) -> eyre::Result<Outcome> {
    VisualServoLoop::new((&cfg.servo).into())?;
    GuardedDescentController::new((&cfg.descent).into())?;
    CautionaryApproach::new((&cfg.approach).into())?;
    force_handle(&(&cfg.force).into())?;
    let rows = match trace {
        Some(p) => Some(load_trace(p)?.len()),
        None => None,
    };
    tracing::info!(trace_rows = rows, "self-check passed");
    Ok(Outcome {
        success: true,
        summary: match rows {
            Some(n) => format!("OK ({n} trace rows)"),
            None => "OK".to_string(),
        },
        json: json!({ "command": "self-check", "ok": true, "trace_rows": rows }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockstep_rate_rounds_up() {
        let mut cfg = Config::default();
        assert_eq!(samples_per_tick(&cfg), 4);
        cfg.force.sample_rate_hz = 25;
        assert_eq!(samples_per_tick(&cfg), 3);
        cfg.force.sample_rate_hz = 5;
        assert_eq!(samples_per_tick(&cfg), 1);
    }

    #[test]
    fn sim_step_matches_control_period() {
        let cfg = Config::default();
        assert_eq!(sim_params(&cfg).dt, Duration::from_millis(100));
    }

    #[test]
    fn virtual_descent_over_hole_succeeds() {
        let cfg = Config::default();
        let out = run_descend(&cfg, &CancelToken::new(), false, None).unwrap();
        assert!(out.success, "{}", out.summary);
        assert_eq!(out.json["slow_stop"], "HeightCutoff");
    }

    #[test]
    fn insert_rejects_trace() {
        let cfg = Config::default();
        let err = run_insert(&cfg, &CancelToken::new(), None, false, Some(Path::new("t.csv")))
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<GuardError>(),
            Some(GuardError::InvalidConfig(_))
        ));
    }

    #[test]
    fn cancelled_token_aborts_descent() {
        let cfg = Config::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_descend(&cfg, &cancel, false, None).err().unwrap();
        assert!(matches!(err.downcast_ref::<GuardError>(), Some(GuardError::Cancelled)));
    }
}
