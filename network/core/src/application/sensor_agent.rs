// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Sensor Agent
//!
//! The per-sensor state machine. Every input (an inbound envelope, a
//! measurement tick, a timer check) is a plain method call that mutates the
//! agent and returns the envelopes to publish, so the whole lifecycle is
//! testable without a transport.
//!
//! ## Lifecycle
//!
//! ```text
//! AwaitingAssignment ──assign──▶ Active ──shutdown──▶ Stopped
//!        │   ▲                                          ▲
//!  reject│   │retry_after elapsed                       │
//!        ▼   │                                          │
//!      Rejected ──────── attempts exhausted ────────────┤
//! AwaitingAssignment ─── assignment timeout ────────────┘
//! ```
//!
//! While `Active`, each tick applies the newest pending feedback, appends the
//! measurement, recomputes risk, expires stale beliefs and evaluates
//! consensus, then publishes data, belief and (if due) alert.

use crate::domain::belief::{to_chrono, Belief, BeliefStore};
use crate::domain::config::{NetworkSpec, SensorSettings, MAX_ADMISSION_TIMER};
use crate::domain::consensus::{ConsensusEngine, ConsensusOutcome};
use crate::domain::learning::{Feedback, FeedbackReceipt, LearningEngine, Sensitivity};
use crate::domain::payload::{
    AlertPayload, AssignPayload, BeliefPayload, ControlCommand, DataPayload, Envelope,
    FeedbackPayload, PayloadError, PresenceStatus, RejectPayload, StatusPayload, CONNECTION_LOST,
};
use crate::domain::risk::{RiskAssessment, RiskEngine};
use crate::domain::sensor::{AgentId, Measurement, SectorId, SectorRef};
use crate::domain::topic::{Topic, TopicFilter};
use crate::domain::window::MeasurementWindow;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// `base * (1 + factor * neighbors)`
pub fn adaptive_interval(base: Duration, factor: f64, neighbors: usize) -> Duration {
    base.mul_f64(1.0 + factor.max(0.0) * neighbors as f64)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    AssignmentTimeout,
    Rejected { attempts: u32 },
    Shutdown { reason: String },
    Cancelled,
    TransportClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::AssignmentTimeout => write!(f, "assignment_timeout"),
            StopReason::Rejected { attempts } => write!(f, "rejected after {} attempts", attempts),
            StopReason::Shutdown { reason } => write!(f, "shutdown: {}", reason),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::TransportClosed => write!(f, "transport_closed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentPhase {
    /// Announced; waiting for the monitor's decision.
    AwaitingAssignment { since: DateTime<Utc>, attempt: u32 },
    Rejected { retry_at: DateTime<Utc>, attempt: u32 },
    Active,
    Stopped { reason: StopReason },
}

pub struct SensorAgent {
    id: AgentId,
    requested_sector: Option<SectorId>,
    sector: Option<SectorId>,
    phase: AgentPhase,
    settings: SensorSettings,
    base_interval: Duration,
    window: MeasurementWindow,
    risk: RiskEngine,
    learning: LearningEngine,
    beliefs: BeliefStore,
    consensus: ConsensusEngine,
    last_assessment: RiskAssessment,
    alerts_emitted: u64,
    ticks: u64,
}

impl SensorAgent {
    pub fn new(id: AgentId, requested_sector: Option<SectorId>, spec: &NetworkSpec, now: DateTime<Utc>) -> Self {
        let settings = spec.sensor.clone();
        Self {
            id,
            requested_sector,
            sector: None,
            phase: AgentPhase::AwaitingAssignment { since: now, attempt: 1 },
            base_interval: settings.base_interval,
            window: MeasurementWindow::new(settings.window_size),
            risk: RiskEngine::new(spec.risk.clone()),
            learning: LearningEngine::new(),
            beliefs: BeliefStore::new(spec.consensus.belief_staleness, spec.consensus.neighbor_scope),
            consensus: ConsensusEngine::new(spec.consensus.clone()),
            last_assessment: RiskAssessment::default(),
            alerts_emitted: 0,
            ticks: 0,
            settings,
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn phase(&self) -> &AgentPhase {
        &self.phase
    }

    /// The sector last assigned by the monitor, kept after stopping.
    pub fn sector(&self) -> Option<SectorId> {
        self.sector
    }

    pub fn is_active(&self) -> bool {
        self.phase == AgentPhase::Active
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.phase, AgentPhase::Stopped { .. })
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        match &self.phase {
            AgentPhase::Stopped { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn sensitivity(&self) -> Sensitivity {
        self.learning.sensitivity()
    }

    pub fn learning(&self) -> &LearningEngine {
        &self.learning
    }

    pub fn beliefs(&self) -> &BeliefStore {
        &self.beliefs
    }

    pub fn last_assessment(&self) -> &RiskAssessment {
        &self.last_assessment
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    pub fn alerts_emitted(&self) -> u64 {
        self.alerts_emitted
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn stop(&mut self, reason: StopReason) {
        if !self.is_stopped() {
            info!("Sensor {} stopping: {}", self.id, reason);
            self.phase = AgentPhase::Stopped { reason };
        }
    }

    /// Everything the agent listens to for its whole life. Sector-scoped
    /// traffic is filtered in [`SensorAgent::handle_message`].
    pub fn subscriptions(&self) -> Vec<TopicFilter> {
        vec![
            TopicFilter::new(format!("control/+/{}", self.id)),
            TopicFilter::new("control/+"),
            TopicFilter::new("belief/+/+"),
            TopicFilter::new(format!("feedback/+/{}", self.id)),
        ]
    }

    fn presence_sector(&self) -> SectorRef {
        self.sector.into()
    }

    fn status(&self, status: PresenceStatus, reason: Option<String>, now: DateTime<Utc>) -> Envelope {
        let topic = Topic::Status {
            sector: self.presence_sector(),
            agent: self.id.clone(),
        };
        Envelope::json(
            &topic,
            &StatusPayload {
                agent_id: self.id.clone(),
                status,
                requested_sector: self.requested_sector,
                reason,
                timestamp: now,
            },
        )
    }

    /// Online presence announcing the agent and requesting a sector.
    pub fn hello(&self, now: DateTime<Utc>) -> Envelope {
        self.status(PresenceStatus::Online, None, now)
    }

    /// Presence the transport publishes if the agent vanishes.
    pub fn last_will(&self, now: DateTime<Utc>) -> Envelope {
        self.status(PresenceStatus::Offline, Some(CONNECTION_LOST.to_string()), now)
    }

    /// Graceful offline presence.
    pub fn goodbye(&self, now: DateTime<Utc>) -> Envelope {
        let reason = self
            .stop_reason()
            .map(ToString::to_string)
            .unwrap_or_else(|| "shutdown".to_string());
        self.status(PresenceStatus::Offline, Some(reason), now)
    }

    /// Process one inbound envelope. Malformed traffic is logged, counted and
    /// dropped without touching state.
    pub fn handle_message(&mut self, envelope: &Envelope, now: DateTime<Utc>) {
        if self.is_stopped() {
            return;
        }

        let topic = match envelope.parse_topic() {
            Ok(topic) => topic,
            Err(e) => {
                self.discard(&envelope.topic, &e);
                return;
            }
        };

        let result = match topic {
            Topic::Assign { agent } if agent == self.id => self.on_assign(envelope),
            Topic::Reject { agent } if agent == self.id => self.on_reject(envelope, now),
            Topic::Belief { sector, agent } => self.on_belief(sector, agent, envelope),
            Topic::Feedback { agent, .. } if agent == self.id => self.on_feedback(envelope),
            Topic::Control { agent, .. } if agent == self.id => self.on_control(envelope),
            Topic::GroupControl { sector } if self.is_active() && Some(sector) == self.sector => {
                self.on_control(envelope)
            }
            other => {
                debug!("Sensor {} ignoring {}", self.id, other);
                Ok(())
            }
        };

        if let Err(e) = result {
            self.discard(&envelope.topic, &e);
        }
    }

    fn discard(&self, topic: &str, error: &dyn std::error::Error) {
        warn!("Sensor {} discarding message on {}: {}", self.id, topic, error);
        metrics::counter!("stormnet_malformed_messages_total", "component" => "sensor").increment(1);
    }

    fn on_assign(&mut self, envelope: &Envelope) -> Result<(), PayloadError> {
        let AssignPayload { sector } = envelope.decode()?;
        match self.phase {
            AgentPhase::AwaitingAssignment { .. } | AgentPhase::Rejected { .. } => {
                info!("Sensor {} assigned to {}", self.id, sector);
                self.sector = Some(sector);
                self.phase = AgentPhase::Active;
            }
            AgentPhase::Active if self.sector == Some(sector) => {
                debug!("Sensor {} re-confirmed in {}", self.id, sector);
            }
            AgentPhase::Active => {
                warn!(
                    "Sensor {} moved from {:?} to {} by monitor",
                    self.id, self.sector, sector
                );
                self.sector = Some(sector);
                self.beliefs.clear();
            }
            AgentPhase::Stopped { .. } => {}
        }
        Ok(())
    }

    fn on_reject(&mut self, envelope: &Envelope, now: DateTime<Utc>) -> Result<(), PayloadError> {
        let RejectPayload { reason, retry_after_secs } = envelope.decode()?;
        let delay = Duration::from_secs(retry_after_secs);
        let retry_at = Some(delay)
            .filter(|delay| *delay <= MAX_ADMISSION_TIMER)
            .and_then(|delay| now.checked_add_signed(to_chrono(delay)))
            .ok_or(PayloadError::OutOfRange {
                field: "retry_after_secs",
                value: retry_after_secs as f64,
            })?;
        let AgentPhase::AwaitingAssignment { attempt, .. } = self.phase else {
            debug!("Sensor {} ignoring rejection outside admission", self.id);
            return Ok(());
        };

        warn!(
            "Sensor {} rejected by monitor (attempt {}/{}): {}",
            self.id, attempt, self.settings.max_admission_attempts, reason
        );
        if attempt >= self.settings.max_admission_attempts {
            self.stop(StopReason::Rejected { attempts: attempt });
        } else {
            self.phase = AgentPhase::Rejected { retry_at, attempt };
        }
        Ok(())
    }

    fn on_belief(&mut self, sector: SectorId, origin: AgentId, envelope: &Envelope) -> Result<(), PayloadError> {
        if origin == self.id {
            return Ok(());
        }
        if !self.is_active() {
            debug!("Sensor {} not assigned yet, ignoring belief from {}", self.id, origin);
            return Ok(());
        }

        let payload: BeliefPayload = envelope.decode()?;
        payload.validate()?;
        if payload.agent_id != origin {
            warn!(
                "Sensor {} ignoring belief on {} claiming origin {}",
                self.id, envelope.topic, payload.agent_id
            );
            return Ok(());
        }

        debug!("Sensor {} received belief from {}: risk={:.2}", self.id, origin, payload.risk_value);
        self.beliefs.upsert(Belief {
            origin,
            sector,
            risk_value: payload.risk_value,
            timestamp: payload.timestamp,
        });
        Ok(())
    }

    fn on_feedback(&mut self, envelope: &Envelope) -> Result<(), PayloadError> {
        let FeedbackPayload { kind, timestamp } = envelope.decode()?;
        let receipt = self.learning.offer(Feedback {
            agent_id: self.id.clone(),
            kind,
            timestamp,
        });
        match receipt {
            FeedbackReceipt::Queued => debug!("Sensor {} queued {} feedback", self.id, kind),
            FeedbackReceipt::Superseded => debug!("Sensor {} replaced pending feedback with {}", self.id, kind),
            FeedbackReceipt::Stale => debug!("Sensor {} dropped stale {} feedback", self.id, kind),
        }
        Ok(())
    }

    fn on_control(&mut self, envelope: &Envelope) -> Result<(), PayloadError> {
        match envelope.decode::<ControlCommand>()? {
            ControlCommand::AdjustInterval { interval_secs: 0 } => {
                warn!("Sensor {} ignoring zero publish interval", self.id);
            }
            ControlCommand::AdjustInterval { interval_secs } => {
                self.base_interval = Duration::from_secs(interval_secs);
                info!("Sensor {} base interval adjusted to {}s", self.id, interval_secs);
            }
            ControlCommand::ResetLearning => {
                self.learning.reset();
                info!("Sensor {} learning parameters reset", self.id);
            }
            ControlCommand::Shutdown { reason } => {
                warn!("Sensor {} received shutdown command: {}", self.id, reason);
                self.stop(StopReason::Shutdown { reason });
            }
        }
        Ok(())
    }

    /// Timer-driven transitions outside the active phase. Returns envelopes
    /// to publish (a renewed announcement after a rejection back-off).
    pub fn poll_timers(&mut self, now: DateTime<Utc>) -> Vec<Envelope> {
        match self.phase {
            AgentPhase::AwaitingAssignment { since, .. }
                if now.signed_duration_since(since) >= to_chrono(self.settings.assignment_timeout) =>
            {
                warn!("Sensor {} timed out waiting for sector assignment", self.id);
                self.stop(StopReason::AssignmentTimeout);
                Vec::new()
            }
            AgentPhase::Rejected { retry_at, attempt } if now >= retry_at => {
                info!("Sensor {} retrying admission (attempt {})", self.id, attempt + 1);
                self.phase = AgentPhase::AwaitingAssignment {
                    since: now,
                    attempt: attempt + 1,
                };
                vec![self.hello(now)]
            }
            _ => Vec::new(),
        }
    }

    /// When [`SensorAgent::poll_timers`] next has something to do.
    pub fn timer_deadline(&self) -> Option<DateTime<Utc>> {
        match self.phase {
            AgentPhase::AwaitingAssignment { since, .. } => Some(
                since
                    .checked_add_signed(to_chrono(self.settings.assignment_timeout))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
            AgentPhase::Rejected { retry_at, .. } => Some(retry_at),
            _ => None,
        }
    }

    /// One evaluation cycle. Does nothing unless the agent is active.
    pub fn on_tick(&mut self, measurement: Measurement, now: DateTime<Utc>) -> Vec<Envelope> {
        let (true, Some(sector)) = (self.is_active(), self.sector) else {
            return Vec::new();
        };
        if !measurement.is_finite() {
            warn!("Sensor {} skipping non-finite measurement", self.id);
            return Vec::new();
        }
        self.ticks += 1;

        if let Some(kind) = self.learning.apply_pending() {
            debug!("Sensor {} applied {} feedback before evaluation", self.id, kind);
        }

        self.window.push(measurement);
        let assessment = self.risk.assess(&self.window, self.learning.sensitivity());
        self.last_assessment = assessment;
        debug!(
            "Sensor {} risk {:.2} (pressure {:.2}, temp {:.2}, humidity {:.2})",
            self.id, assessment.value, assessment.pressure_risk, assessment.temp_risk, assessment.humidity_risk
        );

        let expired = self.beliefs.evict_expired(now);
        if expired > 0 {
            debug!("Sensor {} expired {} stale beliefs", self.id, expired);
        }

        let mut out = vec![
            Envelope::json(
                &Topic::Data { sector, agent: self.id.clone() },
                &DataPayload {
                    agent_id: self.id.clone(),
                    temperature: measurement.temperature,
                    pressure: measurement.pressure,
                    humidity: measurement.humidity,
                    timestamp: measurement.timestamp,
                },
            ),
            Envelope::json(
                &Topic::Belief { sector, agent: self.id.clone() },
                &BeliefPayload {
                    agent_id: self.id.clone(),
                    risk_value: assessment.value,
                    timestamp: now,
                    risk_level: Some(assessment.level()),
                    sensitivity: Some(self.learning.sensitivity().value()),
                    neighbor_count: self.beliefs.active_neighbor_count(sector, now),
                    neighbor_avg_risk: self.beliefs.average_risk(sector, now),
                    false_alarm_count: self.learning.false_alarm_count(),
                    missed_event_count: self.learning.missed_event_count(),
                },
            ),
        ];

        match self.consensus.evaluate(&self.id, sector, assessment.value, &self.beliefs, now) {
            ConsensusOutcome::Alert(alert) => {
                warn!(
                    "Sensor {} ALERT risk={:.2} corroborated by {:?}",
                    self.id, alert.risk_value, alert.triggering_neighbors
                );
                self.alerts_emitted += 1;
                metrics::counter!("stormnet_alerts_emitted_total").increment(1);
                out.push(Envelope::json(
                    &Topic::Alert { sector, agent: self.id.clone() },
                    &AlertPayload {
                        agent_id: alert.agent_id,
                        risk_value: alert.risk_value,
                        timestamp: alert.timestamp,
                        triggering_neighbors: alert.triggering_neighbors,
                        risk_level: Some(assessment.level()),
                    },
                ));
            }
            ConsensusOutcome::Held => debug!("Sensor {} alert condition still holds, not re-emitting", self.id),
            ConsensusOutcome::NoConsensus => debug!("Sensor {} high risk without neighbour agreement", self.id),
            ConsensusOutcome::Quiet => {}
        }
        out
    }

    /// Delay until the next tick, scaled by the number of active neighbours.
    pub fn next_interval(&self, now: DateTime<Utc>) -> Duration {
        let neighbors = self
            .sector
            .filter(|_| self.is_active())
            .map(|sector| self.beliefs.active_neighbor_count(sector, now))
            .unwrap_or(0);
        adaptive_interval(self.base_interval, self.settings.interval_neighbor_factor, neighbors)
    }
}
