use guard_core::config::{DescentCfg, ForceCfg, LoopCfg, ServoCfg};
use guard_core::mocks::{RecordingSink, ScriptedEstimator, ScriptedHeight};
use guard_core::{
    DescentReport, GuardError, GuardedDescentController, InsertionOrchestrator, InsertionSteps,
    PhaseStop, Result, Rig, RigSteps, ServoOutcome, VisualServoLoop, force_handle,
};
use guard_traits::{ManualClock, TargetError};
use rstest::rstest;
use std::sync::Arc;

/// Counts invocations; descents succeed on `succeed_on` and may fail with
/// a scripted error instead.
struct Counting {
    succeed_on: Option<u32>,
    error_on: Option<(u32, GuardError)>,
    servo: ServoOutcome,
    aligns: u32,
    descents: u32,
}

impl Counting {
    fn new(succeed_on: Option<u32>) -> Self {
        Self {
            succeed_on,
            error_on: None,
            servo: ServoOutcome::Converged,
            aligns: 0,
            descents: 0,
        }
    }
}

impl InsertionSteps for Counting {
    fn align(&mut self) -> Result<ServoOutcome> {
        self.aligns += 1;
        Ok(self.servo)
    }

    fn descend(&mut self) -> Result<DescentReport> {
        self.descents += 1;
        if let Some((n, e)) = &self.error_on
            && *n == self.descents
        {
            return Err(eyre::Report::new(e.clone()));
        }
        Ok(DescentReport {
            success: self.succeed_on == Some(self.descents),
            fast_stop: PhaseStop::HeightCutoff,
            fast_height: 0.23,
            slow_stop: PhaseStop::ForceLimit,
            final_height: 0.21,
        })
    }
}

#[rstest]
#[case::first(Some(1), 5, true, 1)]
#[case::third(Some(3), 5, true, 3)]
#[case::never(None, 5, false, 5)]
#[case::too_late(Some(4), 3, false, 3)]
fn retries_until_success_or_exhaustion(
    #[case] succeed_on: Option<u32>,
    #[case] max_retries: u32,
    #[case] expected: bool,
    #[case] invocations: u32,
) {
    let mut o = InsertionOrchestrator::new(Counting::new(succeed_on));
    assert_eq!(o.attempt_insertion(max_retries).unwrap(), expected);
    let steps = o.into_steps();
    assert_eq!(steps.descents, invocations);
    assert_eq!(steps.aligns, invocations);
}

#[test]
fn cancelled_alignment_aborts() {
    let mut steps = Counting::new(Some(1));
    steps.servo = ServoOutcome::Cancelled;
    let mut o = InsertionOrchestrator::new(steps);
    let err = o.attempt_insertion(5).unwrap_err();
    assert_eq!(err.downcast_ref::<GuardError>(), Some(&GuardError::Cancelled));
    assert_eq!(o.steps().descents, 0);
}

#[test]
fn lost_target_still_descends() {
    let mut steps = Counting::new(Some(1));
    steps.servo = ServoOutcome::TargetLost;
    let mut o = InsertionOrchestrator::new(steps);
    assert!(o.attempt_insertion(5).unwrap());
}

#[test]
fn starved_attempt_is_retried() {
    let mut steps = Counting::new(Some(2));
    steps.error_on = Some((1, GuardError::WarmupExpired { ticks: 50 }));
    let mut o = InsertionOrchestrator::new(steps);
    assert!(o.attempt_insertion(5).unwrap());
    assert_eq!(o.steps().descents, 2);
}

#[test]
fn actuation_failure_is_fatal() {
    let mut steps = Counting::new(Some(3));
    steps.error_on = Some((1, GuardError::Actuation("fault".into())));
    let mut o = InsertionOrchestrator::new(steps);
    assert!(o.attempt_insertion(5).is_err());
    assert_eq!(o.steps().descents, 1);
}

#[test]
fn rig_steps_run_servo_then_descent() {
    let force = force_handle(&ForceCfg::default()).unwrap();
    force.enable();
    for _ in 0..25 {
        force.push_sample(0.0);
    }
    let sink = RecordingSink::new();
    let rig = Rig {
        sink: sink.clone(),
        height: ScriptedHeight::new((0..=13).map(|k| f64::from(30 - k) / 100.0)),
        estimator: ScriptedEstimator::new([
            Some(TargetError::Planar([20.0, 0.0])),
            Some(TargetError::Planar([0.0, 0.0])),
        ]),
        force,
        clock: Arc::new(ManualClock::new()),
        cancel: guard_core::CancelToken::new(),
        loop_cfg: LoopCfg::default(),
    };
    let steps = RigSteps::new(
        rig,
        VisualServoLoop::new(ServoCfg::default()).unwrap(),
        GuardedDescentController::new(DescentCfg::default()).unwrap(),
    );
    let mut o = InsertionOrchestrator::new(steps);
    assert!(o.attempt_insertion(3).unwrap());

    let cmds = sink.commands();
    // First command is the servo step, then its stop.
    assert!(cmds[0].twist.linear[0] > 0.0);
    assert!(cmds[1].is_stop());
    assert!(cmds.last().unwrap().is_stop());
}
