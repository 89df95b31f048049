// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0

//! In-process simulation
//!
//! Runs one monitor and N sensors over the in-memory broker for a fixed
//! duration, optionally crashing some sensors halfway through, then logs a
//! per-sector summary.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use std::time::Duration;
use stormnet_core::application::{
    MeasurementSource, RandomWeatherSource, RuntimeClock, ScriptedSource, SensorAgent, SensorReport, SensorRuntime,
};
use stormnet_core::config::{NetworkConfig, NetworkSpec};
use stormnet_core::infrastructure::InMemoryBroker;
use stormnet_core::sensor::{AgentId, Measurement, SectorId};
use stormnet_swarm::application::{MonitorReport, MonitorRuntime, MonitorService};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Time left to sensors to act on the monitor's shutdown broadcast.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Weather {
    /// Uniform random readings
    Random,
    /// Falling pressure, heat and humidity
    Storm,
    /// Stable readings
    Calm,
}

#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Number of sensors to start
    #[arg(long, default_value_t = 6)]
    pub sensors: usize,

    /// How long to run (e.g. "90s", "5m")
    #[arg(long, default_value = "2m", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// Crash this many sensors halfway through
    #[arg(long, default_value_t = 0)]
    pub crash: usize,

    /// Weather fed to every sensor
    #[arg(long, value_enum, default_value_t = Weather::Random)]
    pub weather: Weather,

    /// Seed for random weather (sensor n uses seed + n)
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,
}

enum SimulatedWeather {
    Random(RandomWeatherSource),
    Scripted(ScriptedSource),
}

impl SimulatedWeather {
    fn new(weather: Weather, seed: Option<u64>, stream: u64) -> Self {
        match weather {
            Weather::Random => Self::Random(RandomWeatherSource::new(seed.map(|s| s.wrapping_add(stream)))),
            Weather::Storm => Self::Scripted(ScriptedSource::storm()),
            Weather::Calm => Self::Scripted(ScriptedSource::calm()),
        }
    }
}

impl MeasurementSource for SimulatedWeather {
    fn sample(&mut self, at: DateTime<Utc>) -> Measurement {
        match self {
            Self::Random(source) => source.sample(at),
            Self::Scripted(source) => source.sample(at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub monitor: MonitorReport,
    /// Sensors that were stopped, not crashed.
    pub sensors: Vec<SensorReport>,
    pub crashed: Vec<AgentId>,
}

pub async fn handle_command(args: SimulateArgs, config_override: Option<std::path::PathBuf>) -> Result<()> {
    let config = NetworkConfig::load_or_default(config_override).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C signal");
            signal_token.cancel();
        }
    });

    let summary = run_simulation(&config.spec, &args, shutdown).await?;
    log_summary(&summary);
    Ok(())
}

pub async fn run_simulation(
    spec: &NetworkSpec,
    args: &SimulateArgs,
    shutdown: CancellationToken,
) -> Result<SimulationSummary> {
    if args.crash > args.sensors {
        anyhow::bail!("cannot crash {} of {} sensors", args.crash, args.sensors);
    }

    let broker = InMemoryBroker::new(spec.broker.capacity);
    let monitor = MonitorRuntime::new(
        MonitorService::new(spec),
        broker.connect("monitor", None),
        RuntimeClock::start(),
    );
    let monitor_token = monitor.shutdown_token();
    let monitor_handle = monitor.start();

    let sensor_token = CancellationToken::new();
    let mut sensors: Vec<(AgentId, JoinHandle<SensorReport>)> = Vec::with_capacity(args.sensors);
    for n in 1..=args.sensors {
        let id = AgentId::new(format!("meteo-{n}"));
        let clock = RuntimeClock::start();
        let agent = SensorAgent::new(id.clone(), None, spec, clock.now());
        let session = broker.connect(id.as_str(), Some(agent.last_will(clock.now())));
        let source = SimulatedWeather::new(args.weather, args.seed, n as u64);
        let runtime = SensorRuntime::new(agent, session, source, clock).with_shutdown_token(sensor_token.clone());
        sensors.push((id, runtime.start()));
    }
    metrics::gauge!("stormnet_simulated_sensors").set(args.sensors as f64);
    info!(
        sensors = args.sensors,
        duration = %humantime::format_duration(args.duration),
        "Simulation started"
    );

    let started = Instant::now();
    let mut crashed = Vec::new();
    if args.crash > 0 {
        tokio::select! {
            _ = sleep_until(started + args.duration / 2) => {
                for (id, handle) in sensors.drain(..args.crash) {
                    warn!("Crashing sensor {}", id);
                    handle.abort();
                    // A cancelled join error is the expected outcome here.
                    let _ = handle.await;
                    crashed.push(id);
                }
            }
            _ = shutdown.cancelled() => {}
        }
    }

    tokio::select! {
        _ = sleep_until(started + args.duration) => {}
        _ = shutdown.cancelled() => {
            info!("Simulation interrupted");
        }
    }

    monitor_token.cancel();
    let monitor = monitor_handle.await.context("monitor task failed")?;

    sleep(SHUTDOWN_GRACE).await;
    sensor_token.cancel();
    let mut reports = Vec::with_capacity(sensors.len());
    for (id, handle) in sensors {
        reports.push(
            handle
                .await
                .with_context(|| format!("sensor task {} failed", id))?,
        );
    }

    Ok(SimulationSummary {
        monitor,
        sensors: reports,
        crashed,
    })
}

fn log_summary(summary: &SimulationSummary) {
    let stats = &summary.monitor.stats;
    info!(
        admissions = stats.admissions,
        rejections = stats.rejections,
        graceful = stats.graceful_disconnects,
        abnormal = stats.abnormal_disconnects,
        alerts = stats.alerts_received,
        feedback = stats.feedback_issued,
        suppressed = stats.feedback_suppressed,
        "Simulation finished"
    );

    for sector in &summary.monitor.sectors {
        match &sector.agent_id {
            Some(agent) => info!(
                "{}: {} risk={} level={} sensitivity={} failures={} recent_alerts={}",
                sector.sector,
                agent,
                sector.risk_value.map_or("-".to_string(), |r| format!("{r:.2}")),
                sector.risk_level.map_or("-".to_string(), |l| l.to_string()),
                sector.sensitivity.map_or("-".to_string(), |s| format!("{s:.2}")),
                sector.failure_count,
                sector.recent_alerts
            ),
            None => info!("{}: free", sector.sector),
        }
    }

    let network = &summary.monitor.network;
    if network.disagreement {
        warn!(
            "Sensors disagree: risk ranges from {:.2} to {:.2}",
            network.min_risk.unwrap_or_default(),
            network.max_risk.unwrap_or_default()
        );
    }

    for report in &summary.sensors {
        info!(
            "{} ({}) stopped: {} after {} ticks, {} alerts, sensitivity {}",
            report.agent_id,
            report.sector.map_or("unassigned".to_string(), |s: SectorId| s.to_string()),
            report.stop_reason,
            report.ticks,
            report.alerts_emitted,
            report.sensitivity
        );
    }
    if !summary.crashed.is_empty() {
        warn!("Crashed sensors: {:?}", summary.crashed);
    }
}
