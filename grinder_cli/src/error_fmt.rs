//! Human-readable error descriptions and structured JSON error formatting.

use grinder_core::error::{BuildError, FailReason, GrinderError, ProcedureError};

/// Stable machine name for a failed shot.
pub fn fail_reason_name(r: FailReason) -> &'static str {
    match r {
        FailReason::NonPositiveWeight => "NonPositiveWeight",
        FailReason::SensorNotReady => "SensorNotReady",
        FailReason::Timeout => "Timeout",
        FailReason::Stall => "Stall",
        FailReason::CupRemoved => "CupRemoved",
        FailReason::Cancelled => "Cancelled",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSensor => {
                "What happened: No load cell was provided to the controller.\nLikely causes: The HX711 failed to initialize or was not wired into the builder.\nHow to fix: Ensure the load cell is created successfully and passed via with_sensor(...).".to_string()
            }
            BuildError::MissingActuator => {
                "What happened: No grinder relay was provided to the controller.\nLikely causes: The relay pin failed to initialize or was not wired into the builder.\nHow to fix: Ensure the relay is created successfully and passed via with_actuator(...).".to_string()
            }
            BuildError::MissingInput => {
                "What happened: No rotary encoder was provided to the controller.\nLikely causes: Encoder pins failed to initialize or were not wired into the builder.\nHow to fix: Ensure the encoder is created successfully and passed via with_input(...).".to_string()
            }
            BuildError::MissingStore => {
                "What happened: No settings store was provided to the controller.\nLikely causes: The settings file could not be opened.\nHow to fix: Check [store].path in the config and its directory permissions.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(reason) = err.downcast_ref::<FailReason>() {
        return match reason {
            FailReason::NonPositiveWeight => "What happened: The weight dropped to zero while grinding.\nLikely causes: Cup lifted early or the scale was re-zeroed.\nHow to fix: Leave the cup in place until the shot finishes.".to_string(),
            FailReason::SensorNotReady => "What happened: The load cell stopped reporting while grinding.\nLikely causes: HX711 wiring, power or pin configuration.\nHow to fix: Verify DT/SCK pins and power, then start a new shot.".to_string(),
            FailReason::Timeout => "What happened: The shot exceeded the maximum grinding time.\nLikely causes: Empty hopper, clogged burrs or a target far above the usual dose.\nHow to fix: Refill beans and check the burrs; raise grind.max_grinding_ms if shots are legitimately long.".to_string(),
            FailReason::Stall => "What happened: The weight stopped increasing while grinding.\nLikely causes: Empty hopper, a jam, or the grinder not responding to the relay.\nHow to fix: Refill beans and check the relay wiring; tune grind.stall_* in the config if needed.".to_string(),
            FailReason::CupRemoved => "What happened: The cup was removed while grinding.\nLikely causes: Cup lifted before the shot finished.\nHow to fix: Place the cup back and start a new shot.".to_string(),
            FailReason::Cancelled => "What happened: The shot was cancelled.\nLikely causes: The encoder button was pressed while grinding.\nHow to fix: Nothing to fix; place the cup again to start a new shot.".to_string(),
        };
    }

    if let Some(ge) = err.downcast_ref::<GrinderError>() {
        return match ge {
            GrinderError::Timeout => "What happened: Scale read timed out.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing timeouts.sensor_ms in the config.".to_string(),
            GrinderError::Persistence(msg) => format!(
                "What happened: Settings could not be saved ({msg}).\nLikely causes: Read-only filesystem or a missing directory.\nHow to fix: Check [store].path in the config and its permissions."
            ),
            GrinderError::Procedure(pe) => humanize_procedure(pe),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<ProcedureError>() {
        return humanize_procedure(pe);
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    let root = err.root_cause().to_string();

    if (lower.contains("hx711") && lower.contains("timeout")) || lower.contains("datareadytimeout")
    {
        return "What happened: HX711 did not produce data within the configured timeout.\nLikely causes: Wrong DT/SCK pins, wiring/power issues, or timeout configured too low.\nHow to fix: Check [pins] in the config, verify 5V/GND, and raise timeouts.sensor_ms.".to_string();
    }

    if lower.contains("open hx711") || lower.contains("open relay") || lower.contains("open encoder") {
        return format!(
            "What happened: Failed to initialize hardware pins ({root}).\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO."
        );
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({root}).\nLikely causes: Missing [pins] (hx711_dt, hx711_sck, grinder_relay, encoder_a, ...), or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("reading config") {
        return format!(
            "What happened: The config file could not be read ({root}).\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config with the path to a readable TOML file."
        );
    }

    if lower.contains("hardware") && lower.contains("feature") {
        return "What happened: This build has no GPIO support.\nLikely causes: The binary was compiled without the `hardware` feature.\nHow to fix: Rebuild with `--features hardware`, or use `grinder simulate`.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn humanize_procedure(pe: &ProcedureError) -> String {
    match pe {
        ProcedureError::TimedOut { step, .. } => format!(
            "What happened: A guided procedure timed out ({pe}).\nLikely causes: Nothing was placed on the scale during \"{step}\", or the reading never settled.\nHow to fix: Keep the scale still and follow the prompts; raise menu.procedure_timeout_ms if needed."
        ),
        ProcedureError::InvalidFactor(_) => format!(
            "What happened: Calibration produced an unusable factor ({pe}).\nLikely causes: Reference weight missing from the scale, or a wrong menu.calibration_reference_g.\nHow to fix: Place the reference weight when prompted and check its configured mass."
        ),
        ProcedureError::ImplausibleCup(_) => format!(
            "What happened: The cup weight was rejected ({pe}).\nLikely causes: The scale was empty when the cup was measured.\nHow to fix: Place the empty cup when prompted."
        ),
        other => format!(
            "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug for more detail."
        ),
    }
}

/// Map a failed shot (if present) to stable exit codes; other errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(reason) = err.downcast_ref::<FailReason>() {
        return match reason {
            FailReason::NonPositiveWeight => 2,
            FailReason::SensorNotReady => 3,
            FailReason::Timeout => 4,
            FailReason::Stall => 5,
            FailReason::CupRemoved => 6,
            FailReason::Cancelled => 7,
        };
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(reason) = err.downcast_ref::<FailReason>() {
        return json!({ "reason": fail_reason_name(*reason), "message": humanize(err) })
            .to_string();
    }
    let reason = if err.downcast_ref::<BuildError>().is_some() {
        "BuildError"
    } else if err.downcast_ref::<GrinderError>().is_some()
        || err.downcast_ref::<ProcedureError>().is_some()
    {
        "GrinderError"
    } else {
        "Error"
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FailReason::NonPositiveWeight, 2)]
    #[case(FailReason::Stall, 5)]
    #[case(FailReason::Cancelled, 7)]
    fn fail_reasons_have_stable_exit_codes(#[case] reason: FailReason, #[case] code: i32) {
        assert_eq!(exit_code_for_error(&eyre::Report::new(reason)), code);
    }

    #[test]
    fn config_errors_name_the_offending_key() {
        let err = eyre::eyre!("filter.quantum_g must be > 0").wrap_err("invalid configuration");
        let text = humanize(&err);
        assert!(text.starts_with("What happened: Configuration is invalid"));
        assert!(text.contains("filter.quantum_g"));
        assert_eq!(exit_code_for_error(&err), 1);
    }

    #[test]
    fn json_error_carries_reason_and_message() {
        let err = eyre::Report::new(FailReason::CupRemoved);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "CupRemoved");
        assert!(v["message"].as_str().unwrap().contains("cup was removed"));
    }

    #[test]
    fn build_errors_point_at_the_builder() {
        let err = eyre::Report::new(BuildError::MissingStore);
        assert!(humanize(&err).contains("[store].path"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "BuildError");
    }

    #[test]
    fn unknown_errors_fall_back_to_generic_text() {
        let err = eyre::eyre!("boom");
        let text = humanize(&err);
        assert!(text.starts_with("Something went wrong."));
        assert!(text.contains("Original: boom"));
    }
}
