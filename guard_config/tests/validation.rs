use guard_config::{AxisName, FrameName, load_toml};
use rstest::rstest;

const FULL: &str = r#"
[control]
rate_hz = 10
warmup_patience_ticks = 50
height_patience_ticks = 20

[force]
window = 25
warmup = 20
sample_rate_hz = 40

[servo]
deadband = 4.0
slow_band = 40.0
step_speed = 0.01
reduced_ratio = 0.5
frame = "tool"
lost_patience = 30
axes = [
    { error = 0, axis = "x", sign = 1.0 },
    { error = 1, axis = "y", sign = -1.0, max_speed = 0.004 },
]

[descent]
approach_height = 0.30
fast_cutoff = 0.235
slow_cutoff = 0.185
success_below = 0.195
success_above = 0.185
success_inclusive = true
retract_ticks = 50

[approach]
axis = "x"
distance = -0.0255
time_s = 3.0
threshold = [5.0, 5.0, 3.0]
retract = false

[insertion]
max_retries = 5
"#;

#[test]
fn parses_full_config() {
    let cfg = load_toml(FULL).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.servo.frame, FrameName::Tool);
    assert_eq!(cfg.servo.axes.len(), 2);
    assert_eq!(cfg.servo.axes[1].axis, AxisName::Y);
    assert_eq!(cfg.servo.axes[1].max_speed, Some(0.004));
    assert_eq!(cfg.approach.axis, AxisName::X);
    assert!(!cfg.approach.retract);
    assert_eq!(cfg.descent.success_above, Some(0.185));
    // untouched keys keep defaults
    assert_eq!(cfg.descent.fast_threshold, [4.0, 4.0, 3.0]);
}

#[test]
fn empty_config_uses_defaults_and_validates() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults must validate");
    assert_eq!(cfg.control.rate_hz, 10);
    assert_eq!(cfg.force.window, 25);
    assert_eq!(cfg.force.warmup, 20);
    assert_eq!(cfg.insertion.max_retries, 5);
    assert_eq!(cfg.descent.retract_ticks, 50);
    assert_eq!(cfg.approach.threshold, [4.0, 4.0, 2.0]);
}

#[rstest]
#[case("[control]\nrate_hz = 0", "control.rate_hz must be > 0")]
#[case("[force]\nwindow = 10\nwarmup = 20", "force.warmup must be <= force.window")]
#[case("[descent]\nfast_threshold = [4.0, 0.0, 2.0]", "descent.fast_threshold axes must all be > 0")]
#[case("[approach]\nthreshold = [4.0, 4.0, -2.0]", "approach.threshold axes must all be > 0")]
#[case("[descent]\nslow_cutoff = 0.24", "descent.slow_cutoff must be < descent.fast_cutoff")]
#[case("[descent]\nsuccess_above = 0.2", "descent.success_above must be < descent.success_below")]
#[case("[servo]\ndeadband = 10.0\nslow_band = 5.0", "servo.slow_band must be >= servo.deadband")]
#[case("[servo]\naxes = []", "servo.axes must list at least one axis")]
#[case("[approach]\ndistance = 0.0", "approach.distance must be non-zero")]
#[case("[descent]\nframe = \"mixed\"", "descent.frame must be tool or base")]
#[case("[descent]\nphase_max_ticks = 0", "descent.phase_max_ticks must be >= 1")]
#[case("[insertion]\nmax_retries = 0", "insertion.max_retries must be >= 1")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be one of")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[test]
fn unknown_axis_name_is_a_parse_error() {
    let err = load_toml("[approach]\naxis = \"w\"").expect_err("should not parse");
    assert!(format!("{err}").contains("unknown variant"));
}
