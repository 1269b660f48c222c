//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "integration-tests"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "End-to-end twin sessions under default and faulted controls."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use std::collections::HashMap;

use anyhow::Result;
use vt_common::AppConfig;
use vt_sim::{
    AlarmKind, AlarmSeverity, AlarmThresholds, FaultClass, ScenarioControls, ScenarioEngine,
    ScenarioPreset, ScenarioRunner, ScenarioScript, SeverityLevel, SignalValue, Snapshot,
};

const DT_S: f64 = 0.2;

fn engine() -> ScenarioEngine {
    ScenarioEngine::new(DT_S, AlarmThresholds::default())
}

fn ticks(seconds: f64) -> usize {
    (seconds / DT_S).round() as usize
}

fn latest(engine: &ScenarioEngine) -> Snapshot {
    engine.get_latest().expect("engine has ticked")
}

/// Fault-class counts over every tick of the next `seconds`.
fn classify_for(engine: &mut ScenarioEngine, seconds: f64) -> HashMap<FaultClass, usize> {
    let mut counts = HashMap::new();
    for _ in 0..ticks(seconds) {
        engine.step_n(1);
        *counts.entry(latest(engine).fault_class).or_insert(0) += 1;
    }
    counts
}

fn dominant(counts: &HashMap<FaultClass, usize>) -> FaultClass {
    counts
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(class, _)| *class)
        .expect("at least one tick")
}

#[test]
fn default_session_settles_without_circuit_fault() {
    vt_logging::init();
    let mut engine = engine();
    engine.step_n(ticks(60.0));

    let snapshot = latest(&engine);
    assert_eq!(snapshot.fault_class, FaultClass::Normal);
    assert!(matches!(
        snapshot.severity_level,
        SeverityLevel::Normal | SeverityLevel::Warning
    ));

    // Pressure, plateau, ventilation, leak and battery all stay in range.
    // Only the oxygenation ceiling of the ARDS lung shows up.
    let alarms = snapshot.alarms();
    for kind in [
        AlarmKind::PipHigh,
        AlarmKind::PlateauHigh,
        AlarmKind::Etco2Low,
        AlarmKind::Etco2High,
        AlarmKind::LeakHigh,
        AlarmKind::BatteryLow,
    ] {
        assert!(!alarms.get(kind), "{kind} unexpectedly active");
    }
    assert_eq!(AlarmKind::Spo2Low.severity(), AlarmSeverity::Critical);
    assert!(snapshot.telemetry().spo2_pct > 80.0);

    let telemetry = snapshot.telemetry();
    assert!(telemetry.pip_cmh2o > telemetry.peep_cmh2o);
    assert!(telemetry.pip_cmh2o < 40.0);
    assert!(telemetry.plateau_cmh2o < 30.0);
    assert_eq!(engine.get_history().len(), ticks(60.0));
}

#[test]
fn default_session_never_diagnoses_a_fault() {
    let mut engine = engine();
    let counts = classify_for(&mut engine, 60.0);
    assert_eq!(counts.len(), 1);
    assert_eq!(counts.get(&FaultClass::Normal), Some(&ticks(60.0)));
}

#[test]
fn leak_with_oxygen_failure_is_diagnosed_once_persistent() {
    let mut engine = engine();
    engine.step_n(ticks(30.0));
    let baseline = latest(&engine);

    let controls = ScenarioControls {
        leak_pct: 40.0,
        ..ScenarioControls::default()
    };
    engine.set_controls(controls, false);
    engine.step_n(ticks(10.0));

    let snapshot = latest(&engine);
    assert!(matches!(
        snapshot.fault_class,
        FaultClass::Disconnect | FaultClass::OxygenSupplyFailure
    ));
    assert!(snapshot.severity_score > baseline.severity_score);
    assert!(snapshot.severity_level >= SeverityLevel::Warning);
    assert!(snapshot.alarms().get(AlarmKind::LeakHigh));
    assert_eq!(snapshot.telemetry().fio2, 0.21);
    assert_eq!(snapshot.telemetry().fio2_set, 0.5);
    assert!((snapshot.sensor_health - 0.6).abs() < 1e-12);
    assert!(snapshot.explanation.recommended_action.len() > 10);
    assert_eq!(snapshot.explanation.urgency.as_str(), "Prompt");
}

#[test]
fn obstruction_preset_reads_as_obstruction() {
    let engine = engine();
    let mut runner = ScenarioRunner::new(
        engine,
        ScenarioScript::preset(ScenarioPreset::Obstruction),
        5,
    );
    runner.run_for(16.0);
    let mut engine = runner.into_engine();
    let counts = classify_for(&mut engine, 24.0);
    assert_eq!(dominant(&counts), FaultClass::Obstruction);

    let snapshot = latest(&engine);
    assert!(snapshot.alarms().get(AlarmKind::PipHigh));
    assert!(snapshot.alarms().get(AlarmKind::PlateauHigh));
}

#[test]
fn sensor_drift_preset_reads_as_sensor_fault() {
    let mut runner = ScenarioRunner::new(
        engine(),
        ScenarioScript::preset(ScenarioPreset::SensorDrift),
        5,
    );
    runner.run_for(16.0);
    let mut engine = runner.into_engine();
    let counts = classify_for(&mut engine, 24.0);
    assert_eq!(dominant(&counts), FaultClass::SensorFault);
    assert_eq!(latest(&engine).telemetry().sensor_drift_pct, 20.0);
}

#[test]
fn configured_session_runs_scripted_events() -> Result<()> {
    let config: AppConfig = r#"
        [simulation]
        dt_s = 0.2
        persist_seconds = 5.0

        [patient]
        ards_severity = 0.6

        [controls]
        fio2 = 0.6

        [[events]]
        at_s = 4.0
        label = "leak develops"
        leak_pct = 30.0
    "#
    .parse()?;

    let engine = ScenarioEngine::from_config(&config)?;
    assert_eq!(engine.controls().fio2, 0.6);
    let script = ScenarioScript::from_config("configured", &config.events)?;
    let mut runner = ScenarioRunner::new(engine, script, config.simulation.steps_per_refresh);
    let snapshot = runner.run_for(12.0).expect("ran");

    assert!(runner.pending_events().is_empty());
    assert_eq!(snapshot.telemetry().leak_pct, 30.0);
    assert_eq!(snapshot.telemetry().fio2_set, 0.6);
    assert!(snapshot.alarms().get(AlarmKind::LeakHigh));
    Ok(())
}

#[test]
fn snapshot_flattens_for_display_hosts() -> Result<()> {
    let mut engine = engine();
    engine.step_n(ticks(5.0));
    let snapshot = latest(&engine);
    let flat = snapshot.to_flat_map();

    for key in [
        "time_s",
        "phase",
        "pip_cmh2o",
        "plateau_cmh2o",
        "tidal_volume_l",
        "spo2_pct",
        "etco2_mmhg",
        "battery_pct",
        "alarm_pip_high",
        "display_pip_cmh2o",
        "control_commanded_flow_lps",
        "sensor_health",
        "severity_score",
        "severity_level",
        "fault_class",
        "fault_root_cause",
        "explanation_fault_classification",
        "explanation_root_cause",
        "explanation_severity",
        "explanation_recommended_action",
        "explanation_urgency",
        "explanation_active_alarms",
    ] {
        assert!(flat.contains_key(key), "missing {key}");
    }
    assert_eq!(flat["fault_class"], SignalValue::Text("normal".into()));
    assert_eq!(flat["explanation_active_alarms"].as_str(), Some("SpO2 Low"));

    let json = serde_json::to_value(&flat)?;
    assert_eq!(json["fault_root_cause"], "none");
    let full = serde_json::to_value(&snapshot)?;
    assert_eq!(full["severity_level"], snapshot.severity_level.as_str());
    assert_eq!(full["record"]["telemetry"]["phase"], snapshot.telemetry().phase.as_str());
    Ok(())
}

#[test]
fn returned_history_is_a_copy() {
    let mut engine = engine();
    engine.step_n(10);
    let mut copy = engine.get_history();
    copy.clear();
    assert_eq!(engine.get_history().len(), 10);
    assert_eq!(engine.history_len(), 10);
}
