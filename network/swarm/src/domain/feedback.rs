// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Feedback Analyzer
//!
//! Classifies an agent's recent alerting behaviour against the agents around
//! it and decides whether corrective feedback is due.
//!
//! ## Rules (first match wins)
//! | Condition | Kind |
//! |-----------|------|
//! | more than `max_alerts` alerts within `history_window` | `false_alarm` |
//! | recent alert with no corroborating neighbour in scope | `false_alarm` |
//! | recent corroborated alert with risk ≥ `critical_threshold` | `correct` |
//! | no standing alert, fresh risk > `missed_event_threshold`, a neighbour alerting | `missed_event` |
//!
//! A neighbour corroborates an alert when it is alerting itself, when its
//! fresh belief is above the alert threshold, or when the alert named it as
//! evidence and no fresh belief contradicts that. An older alert still
//! stands while every belief published since has stayed above the alert
//! threshold.
//!
//! Feedback to one agent is throttled by `cooldown`; a classification made
//! during the cooldown is dropped, not queued.

use crate::domain::record::{AlertRecord, SensorRecord};
use crate::domain::supervisor::ConnectionSupervisor;
use chrono::{DateTime, Utc};
use stormnet_core::belief::NeighborScope;
use stormnet_core::config::FeedbackPolicy;
use stormnet_core::learning::FeedbackKind;
use stormnet_core::sensor::{AgentId, SectorId};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationRule {
    ExcessiveAlerts { count: usize },
    StandaloneAlert,
    CorroboratedCritical,
    UnreportedRisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: FeedbackKind,
    pub rule: ClassificationRule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackDecision {
    /// Send this feedback now.
    Issue {
        agent_id: AgentId,
        sector: SectorId,
        kind: FeedbackKind,
    },
    /// Classified, but the agent is cooling down.
    Suppressed { agent_id: AgentId, kind: FeedbackKind },
    Nothing,
}

#[derive(Debug, Clone)]
pub struct FeedbackAnalyzer {
    policy: FeedbackPolicy,
    scope: NeighborScope,
    alert_threshold: f64,
}

impl FeedbackAnalyzer {
    pub fn new(policy: FeedbackPolicy, scope: NeighborScope, alert_threshold: f64) -> Self {
        Self {
            policy,
            scope,
            alert_threshold,
        }
    }

    pub fn policy(&self) -> &FeedbackPolicy {
        &self.policy
    }

    fn corroborates(&self, neighbor: &SensorRecord, alert: &AlertRecord, now: DateTime<Utc>) -> bool {
        if neighbor.is_alerting(now, self.policy.active_alert_window) {
            return true;
        }
        match neighbor.fresh_belief(now, self.policy.belief_staleness) {
            Some(belief) => belief.risk_value > self.alert_threshold,
            None => alert.triggering_neighbors.contains(&neighbor.agent_id),
        }
    }

    pub fn classify<'a>(
        &self,
        subject: &SensorRecord,
        records: impl Iterator<Item = &'a SensorRecord>,
        now: DateTime<Utc>,
    ) -> Option<Classification> {
        let count = subject.alerts_within(now, self.policy.history_window);
        if count > self.policy.max_alerts {
            return Some(Classification {
                kind: FeedbackKind::FalseAlarm,
                rule: ClassificationRule::ExcessiveAlerts { count },
            });
        }

        let neighbors: Vec<&SensorRecord> = records
            .filter(|r| r.agent_id != subject.agent_id)
            .filter(|r| self.scope.includes(subject.sector, r.sector))
            .collect();
        let recent_alert = subject
            .last_alert()
            .filter(|_| subject.is_alerting(now, self.policy.active_alert_window));

        match recent_alert {
            Some(alert) if !neighbors.iter().any(|n| self.corroborates(n, alert, now)) => Some(Classification {
                kind: FeedbackKind::FalseAlarm,
                rule: ClassificationRule::StandaloneAlert,
            }),
            Some(alert) if alert.risk_value >= self.policy.critical_threshold => Some(Classification {
                kind: FeedbackKind::Correct,
                rule: ClassificationRule::CorroboratedCritical,
            }),
            Some(_) => None,
            None if subject.alert_still_standing(now, self.policy.history_window, self.alert_threshold) => None,
            None => subject
                .fresh_belief(now, self.policy.belief_staleness)
                .filter(|b| b.risk_value > self.policy.missed_event_threshold)
                .filter(|_| {
                    neighbors
                        .iter()
                        .any(|n| n.is_alerting(now, self.policy.active_alert_window))
                })
                .map(|_| Classification {
                    kind: FeedbackKind::MissedEvent,
                    rule: ClassificationRule::UnreportedRisk,
                }),
        }
    }

    /// Classify `agent_id` and, if feedback is warranted, claim its cooldown
    /// slot on the supervisor.
    pub fn evaluate(
        &self,
        supervisor: &mut ConnectionSupervisor,
        agent_id: &AgentId,
        now: DateTime<Utc>,
    ) -> FeedbackDecision {
        let Some(subject) = supervisor.record(agent_id) else {
            return FeedbackDecision::Nothing;
        };
        let sector = subject.sector;
        let Some(classification) = self.classify(subject, supervisor.records(), now) else {
            return FeedbackDecision::Nothing;
        };

        if supervisor.claim_feedback(agent_id, now, self.policy.cooldown) {
            info!(
                "Feedback {} for {} ({:?})",
                classification.kind, agent_id, classification.rule
            );
            metrics::counter!("stormnet_feedback_issued_total", "kind" => classification.kind.as_str()).increment(1);
            FeedbackDecision::Issue {
                agent_id: agent_id.clone(),
                sector,
                kind: classification.kind,
            }
        } else {
            debug!(
                "Feedback {} for {} dropped during cooldown",
                classification.kind, agent_id
            );
            metrics::counter!("stormnet_feedback_suppressed_total").increment(1);
            FeedbackDecision::Suppressed {
                agent_id: agent_id.clone(),
                kind: classification.kind,
            }
        }
    }
}
