//! ---
//! vt_section: "01-core-functionality"
//! vt_subsection: "binary"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Binary entrypoint for the headless twin host."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser};
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use vt_common::config::{AppConfig, SimulationConfig};
use vt_common::logging::{init_tracing, LogFormat};
use vt_common::metrics::{JitterSummary, LoopTimingReporter};
use vt_logging::{vt_info, LogContext};
use vt_sim::{ScenarioEngine, ScenarioPreset, ScenarioRunner, ScenarioScript, Snapshot};

const DEFAULT_CONFIG_CANDIDATES: [&str; 2] = ["configs/example.toml", "configs/venttwin.toml"];

const TIME_EPSILON_S: f64 = 1e-9;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Headless ventilator and ARDS lung digital twin",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    /// Built-in scenario to run on top of the configured events
    #[arg(long, value_name = "NAME")]
    preset: Option<String>,

    /// Simulated session length in seconds
    #[arg(long)]
    duration_secs: Option<f64>,

    /// Simulation timestep in seconds
    #[arg(long)]
    dt: Option<f64>,

    /// Pace the session against the wall clock
    #[arg(long)]
    realtime: bool,

    /// Ticks advanced between monitor refreshes
    #[arg(long)]
    steps_per_refresh: Option<usize>,

    /// Stdout log format (structured-json or pretty)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Print the final snapshot as JSON on stdout
    #[arg(long)]
    print_final: bool,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,
}

#[derive(Debug)]
struct SessionOutcome {
    final_snapshot: Option<Snapshot>,
    interrupted: bool,
    jitter: Option<JitterSummary>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("vt-twin {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let (mut config, config_path) = load_config(&cli)?;
    apply_overrides(&mut config, &cli)?;
    init_tracing("vt-twin", &config.logging)?;
    match &config_path {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => warn!("no configuration file found; using built-in defaults"),
    }

    let script = build_script(&config, cli.preset.as_deref())?;
    let engine = ScenarioEngine::from_config(&config)?;
    info!(
        session = %engine.session_id(),
        scenario = %script.name,
        events = script.events().len(),
        duration_s = config.simulation.duration_s,
        realtime = config.simulation.realtime,
        "starting twin session"
    );
    let runner = ScenarioRunner::new(engine, script, config.simulation.steps_per_refresh);
    let outcome = run_session(runner, &config.simulation).await?;

    if outcome.interrupted {
        warn!("session interrupted before reaching its configured duration");
    }
    if let Some(jitter) = &outcome.jitter {
        info!(
            mean_us = jitter.mean_us,
            std_dev_us = jitter.std_dev_us,
            max_us = jitter.max_us,
            samples = jitter.samples,
            "loop pacing summary"
        );
    }
    if let Some(snapshot) = &outcome.final_snapshot {
        info!(
            time_s = snapshot.time_s(),
            fault = %snapshot.fault_class,
            severity = %snapshot.severity_level.as_str(),
            score = snapshot.severity_score,
            "session finished"
        );
        if cli.print_final {
            println!("{}", serde_json::to_string_pretty(snapshot)?);
        }
    }
    Ok(())
}

fn config_candidates(cli: &Cli) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.extend(DEFAULT_CONFIG_CANDIDATES.iter().map(PathBuf::from));
    candidates
}

/// Load the first available configuration, falling back to defaults only when
/// nothing was requested explicitly and no default candidate exists.
fn load_config(cli: &Cli) -> Result<(AppConfig, Option<PathBuf>)> {
    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(anyhow!("configuration file {} does not exist", path.display()));
        }
    }
    let env_override = std::env::var(AppConfig::ENV_CONFIG_PATH)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false);
    let candidates = config_candidates(cli);
    if !env_override && !candidates.iter().any(|path| path.exists()) {
        return Ok((AppConfig::default(), None));
    }
    let loaded = AppConfig::load_with_source(&candidates)?;
    Ok((loaded.config, Some(loaded.source)))
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) -> Result<()> {
    if let Some(duration) = cli.duration_secs {
        config.simulation.duration_s = duration;
    }
    if let Some(dt) = cli.dt {
        config.simulation.dt_s = dt;
    }
    if let Some(steps) = cli.steps_per_refresh {
        config.simulation.steps_per_refresh = steps;
    }
    if cli.realtime {
        config.simulation.realtime = true;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    config
        .validate()
        .context("invalid configuration after command-line overrides")
}

fn build_script(config: &AppConfig, preset: Option<&str>) -> Result<ScenarioScript> {
    let configured = ScenarioScript::from_config("configured", &config.events)
        .context("invalid scripted events in configuration")?;
    let Some(name) = preset else {
        return Ok(configured);
    };
    let preset = ScenarioPreset::parse(name).with_context(|| {
        format!(
            "unknown preset '{}'; available: {}",
            name,
            ScenarioPreset::names().join(", ")
        )
    })?;
    Ok(ScenarioScript::preset(preset).merged(configured))
}

fn chunk_interval(dt_s: f64, steps_per_refresh: usize) -> Duration {
    Duration::from_secs_f64((dt_s * steps_per_refresh as f64).max(0.001))
}

fn log_monitor_line(runner: &ScenarioRunner, snapshot: &Snapshot) {
    let session = runner.engine().session_id().to_string();
    let telemetry = snapshot.telemetry();
    vt_info!(
        context = LogContext::new()
            .with_session(&session)
            .with_tick(snapshot.tick, snapshot.time_s())
            .with_phase(telemetry.phase.as_str()),
        "paw={:.1} pip={:.1} vt={:.3} spo2={:.1} etco2={:.1} alarms={} fault={} severity={} ({:.2})",
        telemetry.paw_cmh2o,
        telemetry.pip_cmh2o,
        telemetry.tidal_volume_l,
        telemetry.spo2_pct,
        telemetry.etco2_mmhg,
        snapshot.alarms().active_count(),
        snapshot.fault_class,
        snapshot.severity_level.as_str(),
        snapshot.severity_score
    );
}

async fn run_session(
    mut runner: ScenarioRunner,
    simulation: &SimulationConfig,
) -> Result<SessionOutcome> {
    let interval = chunk_interval(runner.engine().dt_s(), runner.steps_per_refresh());
    let reporter = LoopTimingReporter::new(interval);
    let mut pacer = simulation.realtime.then(|| {
        let mut pacer = tokio::time::interval(interval);
        pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        pacer
    });
    let report_every_s = simulation
        .report_interval
        .as_secs_f64()
        .max(runner.engine().dt_s());
    let mut next_report_s = 0.0;
    let mut final_snapshot = runner.engine().get_latest();
    let mut interrupted = false;

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    while runner.engine().now_s() + TIME_EPSILON_S < simulation.duration_s {
        let paced = async {
            match pacer.as_mut() {
                Some(pacer) => {
                    pacer.tick().await;
                }
                None => tokio::task::yield_now().await,
            }
        };
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                interrupted = true;
                break;
            }
            _ = paced => {}
        }
        if simulation.realtime {
            reporter.record_tick();
        }
        let Some(snapshot) = runner.advance() else {
            continue;
        };
        if snapshot.time_s() + TIME_EPSILON_S >= next_report_s {
            log_monitor_line(&runner, &snapshot);
            next_report_s = snapshot.time_s() + report_every_s;
        }
        final_snapshot = Some(snapshot);
    }

    Ok(SessionOutcome {
        final_snapshot,
        interrupted,
        jitter: reporter.histogram().summary(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn base_cli() -> Cli {
        Cli {
            config: None,
            preset: None,
            duration_secs: None,
            dt: None,
            realtime: false,
            steps_per_refresh: None,
            log_format: None,
            print_final: false,
            version: false,
        }
    }

    #[test]
    fn cli_parses_session_flags() {
        let cli = Cli::try_parse_from([
            "vt-twin",
            "--preset",
            "obstruction",
            "--duration-secs",
            "30",
            "--dt",
            "0.1",
            "--log-format",
            "pretty",
            "--print-final",
        ])
        .unwrap();
        assert_eq!(cli.preset.as_deref(), Some("obstruction"));
        assert_eq!(cli.duration_secs, Some(30.0));
        assert_eq!(cli.dt, Some(0.1));
        assert_eq!(cli.log_format, Some(LogFormat::Pretty));
        assert!(cli.print_final);
        assert!(!cli.realtime);
    }

    #[test]
    fn cli_rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["vt-twin", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn explicit_candidate_comes_first() {
        let mut cli = base_cli();
        cli.config = Some(PathBuf::from("session.toml"));
        let candidates = config_candidates(&cli);
        assert_eq!(candidates[0], PathBuf::from("session.toml"));
        assert_eq!(candidates.len(), DEFAULT_CONFIG_CANDIDATES.len() + 1);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempdir().unwrap();
        let mut cli = base_cli();
        cli.config = Some(dir.path().join("absent.toml"));
        let err = load_config(&cli).unwrap_err().to_string();
        assert!(err.contains("absent.toml"));
    }

    #[test]
    fn explicit_config_is_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.toml");
        fs::write(&path, "[simulation]\nduration_s = 12.0\n").unwrap();
        let mut cli = base_cli();
        cli.config = Some(path.clone());
        let (config, source) = load_config(&cli).unwrap();
        assert_eq!(config.simulation.duration_s, 12.0);
        if std::env::var(AppConfig::ENV_CONFIG_PATH).is_err() {
            assert_eq!(source, Some(path));
        }
    }

    #[test]
    fn overrides_replace_configured_values() {
        let mut config = AppConfig::default();
        let mut cli = base_cli();
        cli.duration_secs = Some(90.0);
        cli.dt = Some(0.1);
        cli.steps_per_refresh = Some(10);
        cli.realtime = true;
        cli.log_format = Some(LogFormat::Pretty);
        apply_overrides(&mut config, &cli).unwrap();
        assert_eq!(config.simulation.duration_s, 90.0);
        assert_eq!(config.simulation.dt_s, 0.1);
        assert_eq!(config.simulation.steps_per_refresh, 10);
        assert!(config.simulation.realtime);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_validated() {
        let mut config = AppConfig::default();
        let mut cli = base_cli();
        cli.steps_per_refresh = Some(0);
        assert!(apply_overrides(&mut config, &cli).is_err());

        let mut cli = base_cli();
        cli.dt = Some(-0.2);
        assert!(apply_overrides(&mut AppConfig::default(), &cli).is_err());
    }

    #[test]
    fn preset_merges_with_configured_events() {
        let config: AppConfig = r#"
            [[events]]
            at_s = 2.0
            fio2 = 0.8
        "#
        .parse()
        .unwrap();
        let script = build_script(&config, Some("leak-oxygen-failure")).unwrap();
        assert_eq!(script.name, "leak-oxygen-failure");
        assert!(script.events().len() >= 2);
        assert_eq!(script.events()[0].at_s, 2.0);
    }

    #[test]
    fn configured_events_run_without_preset() {
        let script = build_script(&AppConfig::default(), None).unwrap();
        assert_eq!(script.name, "configured");
        assert!(script.is_empty());
    }

    #[test]
    fn unknown_preset_lists_alternatives() {
        let err = build_script(&AppConfig::default(), Some("tension-pneumo"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("tension-pneumo"));
        assert!(err.contains("baseline"));
    }

    #[test]
    fn chunk_interval_spans_one_refresh() {
        assert_eq!(chunk_interval(0.2, 5), Duration::from_secs(1));
        assert_eq!(chunk_interval(0.0, 5), Duration::from_millis(1));
    }
}
