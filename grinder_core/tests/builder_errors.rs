use grinder_core::config::ControllerCfg;
use grinder_core::mocks::{MemoryStore, RecordingActuator, ScriptedInput, ScriptedLoadCell};
use grinder_core::{BuildError, Controller};
use rstest::rstest;

type TestController = Controller<ScriptedLoadCell, RecordingActuator, ScriptedInput, MemoryStore>;

fn build_error(res: grinder_core::Result<TestController>) -> BuildError {
    match res {
        Ok(_) => panic!("expected a build error"),
        Err(e) => e.downcast::<BuildError>().expect("BuildError"),
    }
}

#[test]
fn missing_sensor_is_reported_first() {
    let err = build_error(TestController::builder().try_build());
    assert!(matches!(err, BuildError::MissingSensor));
}

#[test]
fn missing_store_is_reported() {
    let err = build_error(
        TestController::builder()
            .with_sensor(ScriptedLoadCell::new([Some(0.0)]))
            .with_actuator(RecordingActuator::default())
            .with_input(ScriptedInput::default())
            .try_build(),
    );
    assert!(matches!(err, BuildError::MissingStore));
}

#[rstest]
#[case::alpha(|c: &mut ControllerCfg| c.filter.smoothing_alpha = 0.0, "smoothing_alpha")]
#[case::history(|c: &mut ControllerCfg| c.filter.history_capacity = 1, "history_capacity")]
#[case::tick(|c: &mut ControllerCfg| c.timeouts.tick_ms = 0, "tick_ms")]
#[case::tolerance(|c: &mut ControllerCfg| c.grind.cup_tolerance_g = 0.0, "cup_tolerance_g")]
fn invalid_config_is_rejected(#[case] tweak: fn(&mut ControllerCfg), #[case] needle: &str) {
    let mut cfg = ControllerCfg::default();
    tweak(&mut cfg);
    let err = build_error(
        TestController::builder()
            .with_sensor(ScriptedLoadCell::new([Some(0.0)]))
            .with_actuator(RecordingActuator::default())
            .with_input(ScriptedInput::default())
            .with_store(MemoryStore::default())
            .with_config(cfg)
            .try_build(),
    );
    match err {
        BuildError::InvalidConfig(msg) => assert!(msg.contains(needle), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn complete_builder_starts_up() {
    let actuator = RecordingActuator::default();
    let mut controller = TestController::builder()
        .with_sensor(ScriptedLoadCell::new([Some(0.0)]))
        .with_actuator(actuator.clone())
        .with_input(ScriptedInput::default())
        .with_store(MemoryStore::default())
        .try_build()
        .expect("build");
    controller.startup().expect("startup");
    controller.tick();
    assert_eq!(controller.snapshot().state, grinder_core::ProcessState::Empty);
    assert_eq!(actuator.levels(), vec![false]);
}
