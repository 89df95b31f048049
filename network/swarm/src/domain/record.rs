// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Sensor Records
//!
//! What the monitor knows about one admitted agent. Created on admission,
//! destroyed on disconnect.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;
use stormnet_core::risk::RiskLevel;
use stormnet_core::sensor::{AgentId, SectorId};

fn within(at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
    now.signed_duration_since(at) <= window
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub risk_value: f64,
    /// Neighbours the agent named as consensus evidence.
    pub triggering_neighbors: Vec<AgentId>,
}

/// Latest belief summary published by the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct BeliefSnapshot {
    pub risk_value: f64,
    pub timestamp: DateTime<Utc>,
    pub risk_level: Option<RiskLevel>,
    pub sensitivity: Option<f64>,
    pub false_alarm_count: u32,
    pub missed_event_count: u32,
}

#[derive(Debug, Clone)]
pub struct SensorRecord {
    pub agent_id: AgentId,
    pub sector: SectorId,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_feedback_at: Option<DateTime<Utc>>,
    alerts: VecDeque<AlertRecord>,
    last_belief: Option<BeliefSnapshot>,
    /// Lowest belief risk published since the last alert.
    min_risk_since_alert: Option<f64>,
}

impl SensorRecord {
    pub fn new(agent_id: AgentId, sector: SectorId, now: DateTime<Utc>) -> Self {
        Self {
            agent_id,
            sector,
            connected_at: now,
            last_seen: now,
            last_feedback_at: None,
            alerts: VecDeque::new(),
            last_belief: None,
            min_risk_since_alert: None,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    /// Append an alert and drop entries older than `history`.
    pub fn record_alert(&mut self, alert: AlertRecord, history: Duration) {
        let at = alert.timestamp;
        self.alerts.push_back(alert);
        self.min_risk_since_alert = None;
        self.prune_alerts(at, history);
    }

    pub fn prune_alerts(&mut self, now: DateTime<Utc>, history: Duration) {
        while let Some(oldest) = self.alerts.front() {
            if within(oldest.timestamp, now, history) {
                break;
            }
            self.alerts.pop_front();
        }
    }

    pub fn alerts_within(&self, now: DateTime<Utc>, window: Duration) -> usize {
        self.alerts
            .iter()
            .filter(|a| a.timestamp <= now && within(a.timestamp, now, window))
            .count()
    }

    pub fn last_alert(&self) -> Option<&AlertRecord> {
        self.alerts.back()
    }

    /// Whether the agent alerted within `window` before `now`.
    pub fn is_alerting(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.last_alert().is_some_and(|a| within(a.timestamp, now, window))
    }

    pub fn set_belief(&mut self, belief: BeliefSnapshot) {
        if self.last_belief.as_ref().is_none_or(|b| belief.timestamp >= b.timestamp) {
            if self.last_alert().is_some_and(|a| belief.timestamp >= a.timestamp) {
                let lowest = self.min_risk_since_alert.map_or(belief.risk_value, |m| m.min(belief.risk_value));
                self.min_risk_since_alert = Some(lowest);
            }
            self.last_belief = Some(belief);
        }
    }

    /// Whether an alert within `history` still covers the current episode:
    /// every belief published since it stayed above `threshold`.
    pub fn alert_still_standing(&self, now: DateTime<Utc>, history: Duration, threshold: f64) -> bool {
        self.last_alert().is_some_and(|a| within(a.timestamp, now, history))
            && self.min_risk_since_alert.is_none_or(|lowest| lowest > threshold)
    }

    pub fn last_belief(&self) -> Option<&BeliefSnapshot> {
        self.last_belief.as_ref()
    }

    /// The last published belief if younger than `staleness`.
    pub fn fresh_belief(&self, now: DateTime<Utc>, staleness: Duration) -> Option<&BeliefSnapshot> {
        self.last_belief
            .as_ref()
            .filter(|b| within(b.timestamp, now, staleness))
    }

    /// Whether feedback may be sent now given the per-agent cooldown.
    pub fn feedback_due(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        let cooldown = chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::MAX);
        self.last_feedback_at
            .is_none_or(|at| now.signed_duration_since(at) >= cooldown)
    }
}
