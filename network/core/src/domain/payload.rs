// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Wire Payloads
//!
//! Field-named JSON records carried on each channel, plus the [`Envelope`]
//! that pairs a channel name with its encoded body. Unknown fields are
//! ignored on decode so older agents keep working against newer monitors.

use crate::domain::learning::FeedbackKind;
use crate::domain::risk::RiskLevel;
use crate::domain::sensor::{AgentId, SectorId};
use crate::domain::topic::{Topic, TopicError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// `reason` carried by the last-will presence message.
pub const CONNECTION_LOST: &str = "connection_lost";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("field '{field}' out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// A channel name plus its encoded body.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub topic: String,
    pub payload: Bytes,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Encode `body` as JSON for `topic`.
    pub fn json<T: Serialize>(topic: &Topic, body: &T) -> Self {
        let payload = serde_json::to_vec(body).unwrap_or_else(|e| {
            error!("Failed to encode payload for {}: {}", topic, e);
            Vec::new()
        });
        Self::new(topic.to_string(), payload)
    }

    pub fn parse_topic(&self) -> Result<Topic, TopicError> {
        self.topic.parse()
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), PayloadError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PayloadError::OutOfRange { field, value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub agent_id: AgentId,
    pub status: PresenceStatus,
    /// Sector asked for by configuration; honoured only if free.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_sector: Option<SectorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StatusPayload {
    pub fn is_connection_lost(&self) -> bool {
        self.status == PresenceStatus::Offline && self.reason.as_deref() == Some(CONNECTION_LOST)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    pub agent_id: AgentId,
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefPayload {
    pub agent_id: AgentId,
    pub risk_value: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<f64>,
    #[serde(default)]
    pub neighbor_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighbor_avg_risk: Option<f64>,
    #[serde(default)]
    pub false_alarm_count: u32,
    #[serde(default)]
    pub missed_event_count: u32,
}

impl BeliefPayload {
    pub fn validate(&self) -> Result<(), PayloadError> {
        check_unit("risk_value", self.risk_value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub agent_id: AgentId,
    pub risk_value: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub triggering_neighbors: Vec<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
}

impl AlertPayload {
    pub fn validate(&self) -> Result<(), PayloadError> {
        check_unit("risk_value", self.risk_value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignPayload {
    pub sector: SectorId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectPayload {
    pub reason: String,
    pub retry_after_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    AdjustInterval { interval_secs: u64 },
    ResetLearning,
    Shutdown { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPayload {
    pub kind: FeedbackKind,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_is_a_decode_error() {
        let topic = Topic::Belief {
            sector: SectorId::new(1).unwrap(),
            agent: AgentId::new("a"),
        };
        let envelope = Envelope::new(topic.to_string(), r#"{"agent_id":"a"}"#);
        assert!(matches!(envelope.decode::<BeliefPayload>(), Err(PayloadError::Decode(_))));

        let garbage = Envelope::new(topic.to_string(), "not json");
        assert!(garbage.decode::<BeliefPayload>().is_err());
    }

    #[test]
    fn test_out_of_range_risk_is_rejected() {
        let payload = BeliefPayload {
            agent_id: AgentId::new("a"),
            risk_value: 1.4,
            timestamp: Utc::now(),
            risk_level: None,
            sensitivity: None,
            neighbor_count: 0,
            neighbor_avg_risk: None,
            false_alarm_count: 0,
            missed_event_count: 0,
        };
        assert!(matches!(
            payload.validate(),
            Err(PayloadError::OutOfRange { field: "risk_value", .. })
        ));
    }

    #[test]
    fn test_control_command_wire_shape() {
        let json = serde_json::to_value(ControlCommand::Shutdown {
            reason: "monitor stopping".to_string(),
        })
        .unwrap();
        assert_eq!(json["command"], "shutdown");
        assert_eq!(json["reason"], "monitor stopping");

        let parsed: ControlCommand =
            serde_json::from_str(r#"{"command":"adjust_interval","interval_secs":9}"#).unwrap();
        assert_eq!(parsed, ControlCommand::AdjustInterval { interval_secs: 9 });
    }

    #[test]
    fn test_last_will_status_is_connection_lost() {
        let will = StatusPayload {
            agent_id: AgentId::new("a"),
            status: PresenceStatus::Offline,
            requested_sector: None,
            reason: Some(CONNECTION_LOST.to_string()),
            timestamp: Utc::now(),
        };
        assert!(will.is_connection_lost());

        let graceful = StatusPayload { reason: None, ..will };
        assert!(!graceful.is_connection_lost());
    }

    #[test]
    fn test_feedback_kind_serialized_snake_case() {
        let payload = FeedbackPayload {
            kind: FeedbackKind::MissedEvent,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "missed_event");
    }
}
