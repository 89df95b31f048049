// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0

//! Monitor and sensors running together over the in-memory broker.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use stormnet_core::application::{RuntimeClock, ScriptedSource, SensorAgent, SensorReport, SensorRuntime, StopReason};
use stormnet_core::config::NetworkSpec;
use stormnet_core::infrastructure::InMemoryBroker;
use stormnet_core::learning::FeedbackKind;
use stormnet_core::payload::{FeedbackPayload, StatusPayload};
use stormnet_core::sensor::AgentId;
use stormnet_core::topic::{Topic, TopicFilter};
use stormnet_core::transport::Inbox;
use stormnet_swarm::application::{MonitorReport, MonitorRuntime, MonitorService};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;

fn start_monitor(broker: &InMemoryBroker, spec: &NetworkSpec) -> (CancellationToken, JoinHandle<MonitorReport>) {
    let runtime = MonitorRuntime::new(
        MonitorService::new(spec),
        broker.connect("monitor", None),
        RuntimeClock::start(),
    );
    (runtime.shutdown_token(), runtime.start())
}

fn start_sensor(
    broker: &InMemoryBroker,
    spec: &NetworkSpec,
    id: &str,
    source: ScriptedSource,
) -> (CancellationToken, JoinHandle<SensorReport>) {
    let clock = RuntimeClock::start();
    let agent = SensorAgent::new(AgentId::new(id), None, spec, clock.now());
    let session = broker.connect(id, Some(agent.last_will(clock.now())));
    let runtime = SensorRuntime::new(agent, session, source, clock);
    (runtime.shutdown_token(), runtime.start())
}

fn agent_of(topic: &str) -> String {
    let parsed: Topic = topic.parse().unwrap();
    parsed.agent().unwrap().to_string()
}

#[tokio::test(start_paused = true)]
async fn test_seventh_sensor_waits_for_a_free_sector() {
    let broker = InMemoryBroker::new(1024);
    let spec = NetworkSpec::default();
    let mut assigns = broker.subscribe(vec![TopicFilter::new("control/assign/+")]);
    let mut rejects = broker.subscribe(vec![TopicFilter::new("control/reject/+")]);
    let (monitor_token, monitor) = start_monitor(&broker, &spec);

    let mut sensors = HashMap::new();
    for n in 1..=7 {
        let id = format!("meteo-{n}");
        sensors.insert(id.clone(), start_sensor(&broker, &spec, &id, ScriptedSource::calm()));
    }

    let mut assigned = Vec::new();
    for _ in 0..6 {
        assigned.push(agent_of(&assigns.recv().await.unwrap().topic));
    }
    let rejected = agent_of(&rejects.recv().await.unwrap().topic);
    assert!(!assigned.contains(&rejected));

    // Crash one assigned sensor; its last will frees the sector.
    let (_, crashed) = sensors.remove(&assigned[0]).unwrap();
    crashed.abort();
    assert!(crashed.await.unwrap_err().is_cancelled());

    let reassigned = timeout(Duration::from_secs(60), assigns.recv())
        .await
        .expect("rejected sensor admitted on retry")
        .unwrap();
    assert_eq!(agent_of(&reassigned.topic), rejected);

    monitor_token.cancel();
    let report = monitor.await.unwrap();
    assert_eq!(report.stats.admissions, 7);
    assert_eq!(report.stats.rejections, 1);
    assert_eq!(report.stats.abnormal_disconnects, 1);
    assert_eq!(report.network.connected, 6);

    for (_, (_, handle)) in sensors {
        let sensor = handle.await.unwrap();
        assert!(matches!(sensor.stop_reason, StopReason::Shutdown { .. }));
        assert!(sensor.sector.is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn test_storm_feedback_respects_cooldown() {
    let broker = InMemoryBroker::new(1024);
    let spec = NetworkSpec::default();
    let cooldown = chrono::Duration::from_std(spec.feedback.cooldown).unwrap();
    let mut feedback = broker.subscribe(vec![TopicFilter::new("feedback/+/+")]);
    let (monitor_token, monitor) = start_monitor(&broker, &spec);

    let (_, sensor_a) = start_sensor(&broker, &spec, "meteo-a", ScriptedSource::storm());
    let (_, sensor_b) = start_sensor(&broker, &spec, "meteo-b", ScriptedSource::storm());

    let deadline = Instant::now() + Duration::from_secs(240);
    let mut issued: HashMap<String, Vec<DateTime<Utc>>> = HashMap::new();
    while let Ok(Ok(envelope)) = timeout_at(deadline, feedback.recv()).await {
        let payload: FeedbackPayload = envelope.decode().unwrap();
        // Both sensors see the same storm, so every alert has neighbour agreement.
        assert_ne!(payload.kind, FeedbackKind::FalseAlarm, "{}", envelope.topic);
        issued.entry(agent_of(&envelope.topic)).or_default().push(payload.timestamp);
    }

    assert!(!issued.is_empty());
    for stamps in issued.values() {
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= cooldown);
        }
    }

    monitor_token.cancel();
    let report = monitor.await.unwrap();
    assert!(report.stats.alerts_received >= 1);
    assert_eq!(
        report.stats.feedback_issued,
        issued.values().map(|s| s.len() as u64).sum::<u64>()
    );

    for handle in [sensor_a, sensor_b] {
        let sensor = handle.await.unwrap();
        assert!(matches!(sensor.stop_reason, StopReason::Shutdown { .. }));
    }
}

#[tokio::test(start_paused = true)]
async fn test_graceful_goodbye_frees_sector() {
    let broker = InMemoryBroker::new(1024);
    let spec = NetworkSpec::default();
    let mut status = broker.subscribe(vec![TopicFilter::new("status/#")]);
    let mut assigns = broker.subscribe(vec![TopicFilter::new("control/assign/+")]);
    let (monitor_token, monitor) = start_monitor(&broker, &spec);

    let (token, sensor) = start_sensor(&broker, &spec, "meteo-1", ScriptedSource::calm());
    assigns.recv().await.unwrap();
    status.recv().await.unwrap();

    token.cancel();
    let report = sensor.await.unwrap();
    assert_eq!(report.stop_reason, StopReason::Cancelled);
    let goodbye: StatusPayload = status.recv().await.unwrap().decode().unwrap();
    assert!(!goodbye.is_connection_lost());

    tokio::time::sleep(Duration::from_millis(10)).await;
    monitor_token.cancel();
    let report = monitor.await.unwrap();
    assert_eq!(report.stats.graceful_disconnects, 1);
    assert_eq!(report.network.connected, 0);
}
