//! Maps `Box<dyn Error>` from trait boundaries to typed `GrinderError`.
//!
//! The traits in `grinder_traits` return boxed errors; this converts them,
//! downcasting `grinder_hardware::HwError` when the `hardware-errors`
//! feature is on.

use crate::error::GrinderError;

/// Map a trait-boundary error to a typed `GrinderError`.
///
/// Known hardware error types are matched first, then string heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> GrinderError {
    #[cfg(feature = "hardware-errors")]
    {
        use grinder_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::DataReadyTimeout => GrinderError::Timeout,
                other => GrinderError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        GrinderError::Timeout
    } else {
        GrinderError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_timeout_maps_to_timeout() {
        let e = std::io::Error::other("read Timeout on DT line");
        assert!(matches!(map_hw_error(&e), GrinderError::Timeout));
    }

    #[test]
    fn other_errors_keep_their_message() {
        let e = std::io::Error::other("bus glitch");
        match map_hw_error(&e) {
            GrinderError::Hardware(msg) => assert_eq!(msg, "bus glitch"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_error_is_downcast() {
        let e = grinder_hardware::error::HwError::DataReadyTimeout;
        assert!(matches!(map_hw_error(&e), GrinderError::Timeout));
        let g = grinder_hardware::error::HwError::Gpio("pin 5 busy".into());
        assert!(matches!(map_hw_error(&g), GrinderError::HardwareFault(_)));
    }
}
