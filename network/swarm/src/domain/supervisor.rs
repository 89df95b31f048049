// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Connection Supervisor
//!
//! Admission control over the fixed pool of six sectors. The supervisor owns
//! the sector pool and every [`SensorRecord`]; its methods are the only way
//! to mutate either, so a single owner keeps the capacity invariant exact.
//!
//! ## Admission Table
//! | Situation | Outcome |
//! |-----------|---------|
//! | agent already admitted | `AlreadyAssigned` (same sector re-sent) |
//! | free slot, requested sector free | `Assigned` to the requested sector |
//! | free slot otherwise | `Assigned` to the lowest-numbered free sector |
//! | no free slot | `Rejected` with a retry hint; no record created |

use crate::domain::record::{AlertRecord, BeliefSnapshot, SensorRecord};
use crate::domain::sector_pool::SectorPool;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use stormnet_core::config::SupervisorSettings;
use stormnet_core::risk::RiskLevel;
use stormnet_core::sensor::{AgentId, SectorId};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Assigned { sector: SectorId },
    AlreadyAssigned { sector: SectorId },
    Rejected { reason: String, retry_after: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    Graceful,
    /// Announced by the transport on the agent's behalf.
    LastWill,
}

impl DisconnectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DisconnectKind::Graceful => "graceful",
            DisconnectKind::LastWill => "last_will",
        }
    }
}

impl fmt::Display for DisconnectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monitor-side view of one sector.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorSummary {
    pub sector: SectorId,
    pub agent_id: Option<AgentId>,
    pub risk_value: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub sensitivity: Option<f64>,
    pub failure_count: u32,
    pub recent_alerts: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSummary {
    pub connected: usize,
    pub capacity: usize,
    pub min_risk: Option<f64>,
    pub max_risk: Option<f64>,
    /// Latest risks across the network spread by more than the threshold.
    pub disagreement: bool,
}

pub const DISAGREEMENT_THRESHOLD: f64 = 0.3;

pub struct ConnectionSupervisor {
    pool: SectorPool,
    records: HashMap<AgentId, SensorRecord>,
    retry_after: Duration,
}

impl ConnectionSupervisor {
    pub fn new(settings: &SupervisorSettings) -> Self {
        Self {
            pool: SectorPool::new(settings.capacity),
            records: HashMap::new(),
            retry_after: settings.retry_after,
        }
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn connected_count(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, agent_id: &AgentId) -> Option<&SensorRecord> {
        self.records.get(agent_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &SensorRecord> {
        self.records.values()
    }

    /// Admitted agents ordered by sector.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.pool.iter().map(|(_, agent)| agent.clone()).collect()
    }

    pub fn occupied_sectors(&self) -> Vec<SectorId> {
        self.pool.iter().map(|(sector, _)| sector).collect()
    }

    pub fn admit(&mut self, agent_id: &AgentId, requested: Option<SectorId>, now: DateTime<Utc>) -> Admission {
        if let Some(record) = self.records.get_mut(agent_id) {
            record.touch(now);
            debug!("Agent {} already holds {}, re-sending assignment", agent_id, record.sector);
            return Admission::AlreadyAssigned { sector: record.sector };
        }

        match self.pool.allocate(agent_id.clone(), requested) {
            Some(sector) => {
                if requested.is_some_and(|r| r != sector) {
                    info!("Requested sector {:?} unavailable for {}", requested, agent_id);
                }
                self.records
                    .insert(agent_id.clone(), SensorRecord::new(agent_id.clone(), sector, now));
                info!(
                    "Admitted {} to {} ({}/{})",
                    agent_id,
                    sector,
                    self.pool.occupied(),
                    self.pool.capacity()
                );
                metrics::counter!("stormnet_admissions_total").increment(1);
                metrics::gauge!("stormnet_sectors_occupied").set(self.pool.occupied() as f64);
                Admission::Assigned { sector }
            }
            None => {
                let reason = format!(
                    "network at capacity ({}/{} sectors occupied)",
                    self.pool.occupied(),
                    self.pool.capacity()
                );
                warn!("Rejected {}: {}", agent_id, reason);
                metrics::counter!("stormnet_rejections_total").increment(1);
                Admission::Rejected {
                    reason,
                    retry_after: self.retry_after,
                }
            }
        }
    }

    /// Release the agent's sector and delete its record. Unknown agents are
    /// ignored.
    pub fn release(&mut self, agent_id: &AgentId, kind: DisconnectKind) -> Option<SensorRecord> {
        let record = self.records.remove(agent_id)?;
        self.pool.release(record.sector);

        match kind {
            DisconnectKind::Graceful => info!("Agent {} left {}", agent_id, record.sector),
            DisconnectKind::LastWill => warn!(
                abnormal = true,
                "Agent {} lost connection, released {}", agent_id, record.sector
            ),
        }
        metrics::counter!("stormnet_disconnects_total", "kind" => kind.as_str()).increment(1);
        metrics::gauge!("stormnet_sectors_occupied").set(self.pool.occupied() as f64);
        Some(record)
    }

    pub fn touch(&mut self, agent_id: &AgentId, now: DateTime<Utc>) -> bool {
        match self.records.get_mut(agent_id) {
            Some(record) => {
                record.touch(now);
                true
            }
            None => false,
        }
    }

    pub fn record_alert(&mut self, agent_id: &AgentId, alert: AlertRecord, history: Duration) -> bool {
        match self.records.get_mut(agent_id) {
            Some(record) => {
                record.touch(alert.timestamp);
                record.record_alert(alert, history);
                true
            }
            None => false,
        }
    }

    pub fn record_belief(&mut self, agent_id: &AgentId, belief: BeliefSnapshot) -> bool {
        match self.records.get_mut(agent_id) {
            Some(record) => {
                record.touch(belief.timestamp);
                record.set_belief(belief);
                true
            }
            None => false,
        }
    }

    /// Claim the agent's feedback slot if its cooldown has elapsed.
    pub fn claim_feedback(&mut self, agent_id: &AgentId, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.records.get_mut(agent_id) {
            Some(record) if record.feedback_due(now, cooldown) => {
                record.last_feedback_at = Some(now);
                true
            }
            _ => false,
        }
    }

    pub fn sector_summaries(&self, now: DateTime<Utc>, alert_window: Duration) -> Vec<SectorSummary> {
        SectorId::all()
            .map(|sector| {
                let record = self
                    .pool
                    .occupant(sector)
                    .and_then(|agent| self.records.get(agent));
                let belief = record.and_then(|r| r.last_belief());
                SectorSummary {
                    sector,
                    agent_id: record.map(|r| r.agent_id.clone()),
                    risk_value: belief.map(|b| b.risk_value),
                    risk_level: belief.map(|b| b.risk_level.unwrap_or_else(|| RiskLevel::from_value(b.risk_value))),
                    sensitivity: belief.and_then(|b| b.sensitivity),
                    failure_count: belief.map_or(0, |b| b.false_alarm_count + b.missed_event_count),
                    recent_alerts: record.map_or(0, |r| r.alerts_within(now, alert_window)),
                }
            })
            .collect()
    }

    pub fn network_summary(&self) -> NetworkSummary {
        let risks: Vec<f64> = self
            .records
            .values()
            .filter_map(|r| r.last_belief().map(|b| b.risk_value))
            .collect();
        let min_risk = risks.iter().copied().reduce(f64::min);
        let max_risk = risks.iter().copied().reduce(f64::max);
        NetworkSummary {
            connected: self.records.len(),
            capacity: self.pool.capacity(),
            min_risk,
            max_risk,
            disagreement: matches!((min_risk, max_risk), (Some(lo), Some(hi)) if hi - lo > DISAGREEMENT_THRESHOLD),
        }
    }
}
