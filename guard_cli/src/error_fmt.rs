//! Human-readable error descriptions and structured JSON error formatting.

use guard_core::GuardError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ge) = err.downcast_ref::<GuardError>() {
        return match ge {
            GuardError::Cancelled => {
                "What happened: The motion was cancelled.\nLikely causes: Ctrl-C or another shutdown request.\nHow to fix: Nothing to fix; the arm was sent a stop command before exiting.".to_string()
            }
            GuardError::WarmupExpired { ticks } => format!(
                "What happened: The force window did not fill within {ticks} ticks.\nLikely causes: Force/torque sensor not publishing, or force.warmup too large for force.sample_rate_hz.\nHow to fix: Check the sensor stream, lower force.warmup, or raise control.warmup_patience_ticks."
            ),
            GuardError::HeightUnavailable { ticks } => format!(
                "What happened: No height feedback for {ticks} consecutive ticks.\nLikely causes: Arm state stream stalled or disconnected.\nHow to fix: Check the arm connection; raise control.height_patience_ticks only if gaps are expected."
            ),
            GuardError::AlignExpired { ticks } => format!(
                "What happened: The tool did not settle at the approach height within {ticks} ticks.\nLikely causes: Obstruction, or descent.align_speed too low for the distance.\nHow to fix: Start closer to descent.approach_height or raise descent.align_max_ticks."
            ),
            GuardError::Actuation(msg) => format!(
                "What happened: The arm rejected a velocity command ({msg}).\nLikely causes: Driver fault, protective stop, or lost connection.\nHow to fix: Clear the fault on the arm and rerun."
            ),
            GuardError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
            GuardError::SensorTimeout => "What happened: A sensor read timed out.\nLikely causes: Sensor disconnected or force.read_timeout_ms too low.\nHow to fix: Check the sensor and consider raising force.read_timeout_ms.".to_string(),
            GuardError::TargetLost => "What happened: The target left the camera view.\nLikely causes: Start pose too far from the hole, or lighting changes.\nHow to fix: Move the arm so the hole is visible and rerun.".to_string(),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("trace csv must have headers") {
        return "Invalid headers in trace CSV. Expected 'height,fx,fy,fz'.".to_string();
    }
    if lower.contains("read config") {
        return format!(
            "What happened: Could not read the config file.\nLikely causes: Wrong path or missing permissions.\nHow to fix: Pass an existing file with --config. Original: {msg}"
        );
    }
    if lower.contains("parse config") {
        let cause = err.root_cause();
        return format!(
            "What happened: The config file is not valid TOML for this schema.\nLikely causes: Typo in a key or section, or a wrong value type.\nHow to fix: Fix the file and rerun. Cause: {cause}"
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes for typed failures; anything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<GuardError>() {
        Some(GuardError::Cancelled) => 2,
        Some(GuardError::WarmupExpired { .. }) => 3,
        Some(GuardError::Actuation(_)) => 4,
        Some(GuardError::InvalidConfig(_)) => 5,
        _ => 1,
    }
}

pub fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<GuardError>() {
        Some(GuardError::Cancelled) => "Cancelled",
        Some(GuardError::WarmupExpired { .. }) => "WarmupExpired",
        Some(GuardError::HeightUnavailable { .. }) => "HeightUnavailable",
        Some(GuardError::AlignExpired { .. }) => "AlignExpired",
        Some(GuardError::Actuation(_)) => "Actuation",
        Some(GuardError::InvalidConfig(_)) => "InvalidConfig",
        Some(GuardError::SensorTimeout) => "SensorTimeout",
        Some(GuardError::TargetLost) => "TargetLost",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let details = match err.downcast_ref::<GuardError>() {
        Some(
            GuardError::WarmupExpired { ticks }
            | GuardError::HeightUnavailable { ticks }
            | GuardError::AlignExpired { ticks },
        ) => Some(json!({ "ticks": ticks })),
        _ => None,
    };
    let obj = match details {
        Some(d) => json!({ "reason": reason_name(err), "details": d, "message": humanize(err) }),
        None => json!({ "reason": reason_name(err), "message": humanize(err) }),
    };
    obj.to_string()
}
