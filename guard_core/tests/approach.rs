use guard_core::config::{ApproachCfg, ForceCfg, LoopCfg};
use guard_core::mocks::RecordingSink;
use guard_core::{
    ApproachStop, CancelToken, CautionaryApproach, ForceHandle, GuardError, LoopCtx, force_handle,
};
use guard_traits::{Axis, ManualClock, ReferenceFrame};
use std::time::Duration;

fn warm_force() -> ForceHandle {
    let h = force_handle(&ForceCfg::default()).unwrap();
    h.enable();
    for _ in 0..25 {
        h.push_sample(0.0);
    }
    h
}

fn approach(retract: bool) -> CautionaryApproach {
    CautionaryApproach::new(ApproachCfg {
        distance: 0.06,
        duration: Duration::from_secs(3),
        retract,
        retract_distance: 0.01,
        retract_duration: Duration::from_millis(500),
        ..ApproachCfg::default()
    })
    .unwrap()
}

#[test]
fn contact_stops_then_retracts() {
    let clock = ManualClock::new();
    let cancel = CancelToken::new();
    let ctx = LoopCtx::new(&clock, &cancel, LoopCfg::default());
    let force = warm_force();
    let f = force.clone();
    let mut sink = RecordingSink::new().on_publish(move |i, _| {
        if i == 7 {
            f.push_sample([0.0, 0.0, 20.0]);
        }
    });

    let report = approach(true).run(&ctx, &mut sink, &force).unwrap();
    assert_eq!(report.stop, ApproachStop::Contact);
    assert_eq!(report.ticks, 8);
    assert!(report.retracted);
    assert_eq!(report.trip.map(|t| t.axis), Some(2));

    let cmds = sink.commands();
    let forward = vz(&cmds[0]);
    assert!((forward - 0.02).abs() < 1e-12);
    assert_eq!(cmds[0].frame, ReferenceFrame::Tool);
    assert!(cmds[8].is_stop());
    // 0.5 s at 10 Hz backing off at 2 cm/s.
    let back: Vec<_> = cmds[9..14].iter().map(vz).collect();
    assert!(back.iter().all(|v| (*v + 0.02).abs() < 1e-12));
    assert!(cmds[14].is_stop());
    assert_eq!(cmds.len(), 15);
    // Monitoring is off again, the flag is left for the caller.
    assert!(!force.with(|m| m.is_enabled()));
    assert!(force.flag_exceeded());
}

fn vz(c: &guard_traits::VelocityCommand) -> f64 {
    c.twist.get(Axis::LinearZ)
}

#[test]
fn budget_expiry_stops_without_retract() {
    let clock = ManualClock::new();
    let cancel = CancelToken::new();
    let ctx = LoopCtx::new(&clock, &cancel, LoopCfg::default());
    let force = warm_force();
    let mut sink = RecordingSink::new();

    let report = approach(true).run(&ctx, &mut sink, &force).unwrap();
    assert_eq!(report.stop, ApproachStop::BudgetExpired);
    assert_eq!(report.ticks, 30);
    assert!(!report.retracted);
    assert_eq!(sink.len(), 31);
    assert!(sink.last().unwrap().is_stop());
    assert_eq!(clock.elapsed(), Duration::from_secs(3));
}

#[test]
fn contact_without_retract_only_stops() {
    let clock = ManualClock::new();
    let cancel = CancelToken::new();
    let ctx = LoopCtx::new(&clock, &cancel, LoopCfg::default());
    let force = warm_force();
    let f = force.clone();
    let mut sink = RecordingSink::new().on_publish(move |i, _| {
        if i == 0 {
            f.push_sample([0.0, 0.0, 20.0]);
        }
    });

    let report = approach(false).run(&ctx, &mut sink, &force).unwrap();
    assert_eq!(report.stop, ApproachStop::Contact);
    assert!(!report.retracted);
    assert_eq!(sink.len(), 2);
}

#[test]
fn stale_flag_is_cleared_on_start() {
    let clock = ManualClock::new();
    let cancel = CancelToken::new();
    let ctx = LoopCtx::new(&clock, &cancel, LoopCfg::default());
    let force = warm_force();
    force.set_threshold([1.0; 3]).unwrap();
    force.push_sample(50.0);
    assert!(force.flag_exceeded());
    let mut sink = RecordingSink::new();

    let report = approach(false).run(&ctx, &mut sink, &force).unwrap();
    assert_eq!(report.stop, ApproachStop::BudgetExpired);
}

#[test]
fn cancellation_stops_immediately() {
    let clock = ManualClock::new();
    let cancel = CancelToken::new();
    let ctx = LoopCtx::new(&clock, &cancel, LoopCfg::default());
    let force = warm_force();
    let trigger = cancel.clone();
    let mut sink = RecordingSink::new().on_publish(move |i, _| {
        if i == 2 {
            trigger.cancel();
        }
    });

    let err = approach(true).run(&ctx, &mut sink, &force).unwrap_err();
    assert_eq!(err.downcast_ref::<GuardError>(), Some(&GuardError::Cancelled));
    assert_eq!(sink.len(), 4);
    assert!(sink.last().unwrap().is_stop());
}
