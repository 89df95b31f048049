// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Consensus Engine
//!
//! Decides after every local risk recomputation whether an [`Alert`] is due.
//!
//! ## Decision Table
//! | Local risk > threshold | Fresh neighbour > threshold | Re-arm policy allows | Outcome |
//! |---|---|---|---|
//! | no | - | - | `Quiet` (re-arms) |
//! | yes | no | - | `NoConsensus` (re-arms) |
//! | yes | yes | no | `Held` |
//! | yes | yes | yes | `Alert` |
//!
//! Neighbour evidence is mandatory: maximum local risk alone never alerts.

use crate::domain::belief::{to_chrono, BeliefStore, NeighborScope};
use crate::domain::sensor::{AgentId, SectorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often an alert may repeat while the alert condition keeps holding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RearmPolicy {
    /// One alert when the condition becomes true; re-armed by the first
    /// evaluation that finds it false.
    #[default]
    Edge,
    /// Any qualifying evaluation alerts, provided `spacing` has elapsed since
    /// the previous alert.
    MinSpacing {
        #[serde(with = "humantime_serde")]
        spacing: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusPolicy {
    /// Both local and neighbour risk must exceed this.
    pub alert_threshold: f64,
    /// Beliefs older than this are not evidence.
    #[serde(with = "humantime_serde")]
    pub belief_staleness: Duration,
    pub neighbor_scope: NeighborScope,
    pub rearm: RearmPolicy,
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self {
            alert_threshold: 0.6,
            belief_staleness: Duration::from_secs(15),
            neighbor_scope: NeighborScope::All,
            rearm: RearmPolicy::Edge,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub agent_id: AgentId,
    pub sector: SectorId,
    pub risk_value: f64,
    pub timestamp: DateTime<Utc>,
    pub triggering_neighbors: Vec<AgentId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsensusOutcome {
    Quiet,
    NoConsensus,
    /// Condition holds but the re-arm policy suppresses a repeat.
    Held,
    Alert(Alert),
}

impl ConsensusOutcome {
    pub fn alert(self) -> Option<Alert> {
        match self {
            ConsensusOutcome::Alert(alert) => Some(alert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsensusEngine {
    policy: ConsensusPolicy,
    armed: bool,
    last_alert_at: Option<DateTime<Utc>>,
}

impl ConsensusEngine {
    pub fn new(policy: ConsensusPolicy) -> Self {
        Self {
            policy,
            armed: true,
            last_alert_at: None,
        }
    }

    pub fn policy(&self) -> &ConsensusPolicy {
        &self.policy
    }

    pub fn last_alert_at(&self) -> Option<DateTime<Utc>> {
        self.last_alert_at
    }

    pub fn evaluate(
        &mut self,
        agent_id: &AgentId,
        sector: SectorId,
        local_risk: f64,
        beliefs: &BeliefStore,
        now: DateTime<Utc>,
    ) -> ConsensusOutcome {
        let threshold = self.policy.alert_threshold;
        if local_risk <= threshold {
            self.armed = true;
            return ConsensusOutcome::Quiet;
        }

        let mut triggering: Vec<AgentId> = beliefs
            .fresh_neighbors(sector, now)
            .filter(|b| &b.origin != agent_id && b.risk_value > threshold)
            .map(|b| b.origin.clone())
            .collect();
        if triggering.is_empty() {
            self.armed = true;
            return ConsensusOutcome::NoConsensus;
        }
        triggering.sort();

        let allowed = match self.policy.rearm {
            RearmPolicy::Edge => self.armed,
            RearmPolicy::MinSpacing { spacing } => self
                .last_alert_at
                .is_none_or(|last| now.signed_duration_since(last) >= to_chrono(spacing)),
        };
        if !allowed {
            return ConsensusOutcome::Held;
        }

        self.armed = false;
        self.last_alert_at = Some(now);
        ConsensusOutcome::Alert(Alert {
            agent_id: agent_id.clone(),
            sector,
            risk_value: local_risk,
            timestamp: now,
            triggering_neighbors: triggering,
        })
    }
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self::new(ConsensusPolicy::default())
    }
}
