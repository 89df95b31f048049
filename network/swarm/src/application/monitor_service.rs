// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! Monitor Service
//!
//! Maps every inbound envelope to a state transition on the
//! [`ConnectionSupervisor`] and returns the envelopes to publish in reply.
//! No I/O happens here; [`super::monitor_runtime`] owns the transport.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Admission, presence, alert intake and feedback emission

use crate::domain::feedback::{FeedbackAnalyzer, FeedbackDecision};
use crate::domain::record::{AlertRecord, BeliefSnapshot};
use crate::domain::supervisor::{Admission, ConnectionSupervisor, DisconnectKind, NetworkSummary, SectorSummary};
use chrono::{DateTime, Utc};
use std::time::Duration;
use stormnet_core::config::NetworkSpec;
use stormnet_core::payload::{
    AlertPayload, AssignPayload, BeliefPayload, ControlCommand, Envelope, FeedbackPayload, PayloadError,
    PresenceStatus, RejectPayload, StatusPayload,
};
use stormnet_core::sensor::{AgentId, SectorRef};
use stormnet_core::topic::{Topic, TopicFilter};
use tracing::{debug, warn};

/// Running totals for the final report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub admissions: u64,
    pub rejections: u64,
    pub graceful_disconnects: u64,
    pub abnormal_disconnects: u64,
    pub alerts_received: u64,
    pub feedback_issued: u64,
    pub feedback_suppressed: u64,
    pub malformed_messages: u64,
}

pub struct MonitorService {
    supervisor: ConnectionSupervisor,
    analyzer: FeedbackAnalyzer,
    stats: MonitorStats,
}

impl MonitorService {
    pub fn new(spec: &NetworkSpec) -> Self {
        Self {
            supervisor: ConnectionSupervisor::new(&spec.supervisor),
            analyzer: FeedbackAnalyzer::new(
                spec.feedback.clone(),
                spec.consensus.neighbor_scope,
                spec.consensus.alert_threshold,
            ),
            stats: MonitorStats::default(),
        }
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn scan_interval(&self) -> Duration {
        self.analyzer.policy().scan_interval
    }

    pub fn subscriptions(&self) -> Vec<TopicFilter> {
        vec![
            TopicFilter::new("status/#"),
            TopicFilter::new("data/+/+"),
            TopicFilter::new("belief/+/+"),
            TopicFilter::new("alert/+/+"),
        ]
    }

    pub fn sector_summaries(&self, now: DateTime<Utc>) -> Vec<SectorSummary> {
        self.supervisor
            .sector_summaries(now, self.analyzer.policy().history_window)
    }

    pub fn network_summary(&self) -> NetworkSummary {
        self.supervisor.network_summary()
    }

    pub fn handle(&mut self, envelope: &Envelope, now: DateTime<Utc>) -> Vec<Envelope> {
        let topic = match envelope.parse_topic() {
            Ok(topic) => topic,
            Err(e) => {
                self.discard(&envelope.topic, &e);
                return Vec::new();
            }
        };

        let result = match topic {
            Topic::Status { sector, agent } => self.on_status(sector, agent, envelope, now),
            Topic::Data { agent, .. } => {
                self.supervisor.touch(&agent, now);
                Ok(Vec::new())
            }
            Topic::Belief { agent, .. } => self.on_belief(agent, envelope),
            Topic::Alert { agent, .. } => self.on_alert(agent, envelope, now),
            other => {
                debug!("Monitor ignoring {}", other);
                Ok(Vec::new())
            }
        };

        result.unwrap_or_else(|e| {
            self.discard(&envelope.topic, &e);
            Vec::new()
        })
    }

    fn discard(&mut self, topic: &str, error: &dyn std::error::Error) {
        warn!("Monitor discarding message on {}: {}", topic, error);
        self.stats.malformed_messages += 1;
        metrics::counter!("stormnet_malformed_messages_total", "component" => "monitor").increment(1);
    }

    fn on_status(
        &mut self,
        sector: SectorRef,
        agent: AgentId,
        envelope: &Envelope,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, PayloadError> {
        let status: StatusPayload = envelope.decode()?;
        if status.agent_id != agent {
            warn!("Status on {} claims agent {}, ignoring", envelope.topic, status.agent_id);
            return Ok(Vec::new());
        }

        match status.status {
            PresenceStatus::Online => {
                let requested = status.requested_sector.or(sector.assigned());
                let reply = match self.supervisor.admit(&agent, requested, now) {
                    Admission::Assigned { sector } => {
                        self.stats.admissions += 1;
                        Envelope::json(&Topic::Assign { agent }, &AssignPayload { sector })
                    }
                    Admission::AlreadyAssigned { sector } => {
                        Envelope::json(&Topic::Assign { agent }, &AssignPayload { sector })
                    }
                    Admission::Rejected { reason, retry_after } => {
                        self.stats.rejections += 1;
                        Envelope::json(
                            &Topic::Reject { agent },
                            &RejectPayload {
                                reason,
                                retry_after_secs: retry_after.as_secs(),
                            },
                        )
                    }
                };
                Ok(vec![reply])
            }
            PresenceStatus::Offline => {
                let kind = if status.is_connection_lost() {
                    DisconnectKind::LastWill
                } else {
                    DisconnectKind::Graceful
                };
                match self.supervisor.release(&agent, kind) {
                    Some(_) if kind == DisconnectKind::LastWill => self.stats.abnormal_disconnects += 1,
                    Some(_) => self.stats.graceful_disconnects += 1,
                    None => debug!("Offline notice from unknown agent {}", agent),
                }
                Ok(Vec::new())
            }
        }
    }

    fn on_belief(&mut self, agent: AgentId, envelope: &Envelope) -> Result<Vec<Envelope>, PayloadError> {
        let belief: BeliefPayload = envelope.decode()?;
        belief.validate()?;
        let known = self.supervisor.record_belief(
            &agent,
            BeliefSnapshot {
                risk_value: belief.risk_value,
                timestamp: belief.timestamp,
                risk_level: belief.risk_level,
                sensitivity: belief.sensitivity,
                false_alarm_count: belief.false_alarm_count,
                missed_event_count: belief.missed_event_count,
            },
        );
        if !known {
            debug!("Belief from unknown agent {} ignored", agent);
        }
        Ok(Vec::new())
    }

    fn on_alert(&mut self, agent: AgentId, envelope: &Envelope, now: DateTime<Utc>) -> Result<Vec<Envelope>, PayloadError> {
        let alert: AlertPayload = envelope.decode()?;
        alert.validate()?;
        let history = self.analyzer.policy().history_window;
        let alert_record = AlertRecord {
            timestamp: alert.timestamp,
            risk_value: alert.risk_value,
            triggering_neighbors: alert.triggering_neighbors.clone(),
        };
        if !self.supervisor.record_alert(&agent, alert_record, history) {
            debug!("Alert from unknown agent {} ignored", agent);
            return Ok(Vec::new());
        }
        self.stats.alerts_received += 1;
        warn!(
            "Alert from {}: risk={:.2}, neighbours {:?}",
            agent, alert.risk_value, alert.triggering_neighbors
        );

        let decision = self.analyzer.evaluate(&mut self.supervisor, &agent, now);
        Ok(self.feedback_envelope(decision, now).into_iter().collect())
    }

    /// Periodic evaluation of every admitted agent.
    pub fn scan(&mut self, now: DateTime<Utc>) -> Vec<Envelope> {
        let mut out = Vec::new();
        for agent in self.supervisor.agent_ids() {
            let decision = self.analyzer.evaluate(&mut self.supervisor, &agent, now);
            out.extend(self.feedback_envelope(decision, now));
        }
        out
    }

    fn feedback_envelope(&mut self, decision: FeedbackDecision, now: DateTime<Utc>) -> Option<Envelope> {
        match decision {
            FeedbackDecision::Issue { agent_id, sector, kind } => {
                self.stats.feedback_issued += 1;
                Some(Envelope::json(
                    &Topic::Feedback { sector, agent: agent_id },
                    &FeedbackPayload { kind, timestamp: now },
                ))
            }
            FeedbackDecision::Suppressed { .. } => {
                self.stats.feedback_suppressed += 1;
                None
            }
            FeedbackDecision::Nothing => None,
        }
    }

    /// One shutdown command per occupied sector.
    pub fn shutdown_broadcast(&self, reason: &str) -> Vec<Envelope> {
        self.supervisor
            .occupied_sectors()
            .into_iter()
            .map(|sector| {
                Envelope::json(
                    &Topic::GroupControl { sector },
                    &ControlCommand::Shutdown {
                        reason: reason.to_string(),
                    },
                )
            })
            .collect()
    }
}
