//! Maps `Box<dyn Error>` from trait boundaries to typed `GuardError`.
//!
//! The traits in `guard_traits` use `Box<dyn Error + Send + Sync>` so that
//! drivers keep their own error types; this module converts those to our typed
//! enum, with an optional feature-gated path for `guard_hardware::HwError`.

use crate::error::GuardError;

/// Map an actuator-side error to a typed `GuardError`.
///
/// Known hardware error types are downcast first; anything else is treated
/// as an actuation failure unless it mentions a timeout.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> GuardError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<guard_hardware::error::HwError>() {
            return match hw {
                guard_hardware::error::HwError::Timeout => GuardError::SensorTimeout,
                other => GuardError::Actuation(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        GuardError::SensorTimeout
    } else {
        GuardError::Actuation(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_io_error_is_actuation() {
        let e = std::io::Error::other("bus off");
        assert_eq!(map_hw_error(&e), GuardError::Actuation("bus off".into()));
    }

    #[test]
    fn timeout_text_maps_to_sensor_timeout() {
        let e = std::io::Error::other("read Timeout after 50ms");
        assert_eq!(map_hw_error(&e), GuardError::SensorTimeout);
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_rejection_is_actuation() {
        let e = guard_hardware::error::HwError::Rejected("fault".into());
        assert!(matches!(map_hw_error(&e), GuardError::Actuation(m) if m.contains("fault")));
    }
}
