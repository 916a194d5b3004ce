#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing and validation must reject bad input with errors, never panics.
    let Ok(cfg) = toml::from_str::<guard_config::Config>(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // Building controllers from a validated config must not panic either.
    let servo: guard_core::config::ServoCfg = (&cfg.servo).into();
    let descent: guard_core::config::DescentCfg = (&cfg.descent).into();
    let approach: guard_core::config::ApproachCfg = (&cfg.approach).into();
    let force: guard_core::config::ForceCfg = (&cfg.force).into();
    let _ = guard_core::VisualServoLoop::new(servo);
    let _ = guard_core::GuardedDescentController::new(descent);
    let _ = guard_core::CautionaryApproach::new(approach);
    let _ = guard_core::force_handle(&force);
});
