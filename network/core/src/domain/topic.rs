// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Channel Names
//!
//! Hierarchical channel names used between sensors and the monitor:
//!
//! ```text
//! status/{sector}/{agent_id}     online/offline presence ({sector} may be "pending")
//! data/{sector}/{agent_id}       raw measurement
//! belief/{sector}/{agent_id}     risk opinion
//! alert/{sector}/{agent_id}      consensus alert
//! control/assign/{agent_id}      sector assignment
//! control/reject/{agent_id}      admission rejection
//! control/{sector}/{agent_id}    individual command
//! control/{sector}               sector group command
//! feedback/{sector}/{agent_id}   learning feedback
//! ```
//!
//! [`TopicFilter`] implements the usual `+` (one level) and `#` (remaining
//! levels) wildcards for subscriptions.

use crate::domain::sensor::{AgentId, SectorError, SectorId, SectorRef};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopicError {
    #[error("unrecognised channel '{0}'")]
    Unrecognised(String),

    #[error("invalid sector in channel '{topic}': {source}")]
    Sector {
        topic: String,
        #[source]
        source: SectorError,
    },

    #[error("empty agent id in channel '{0}'")]
    EmptyAgent(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Status { sector: SectorRef, agent: AgentId },
    Data { sector: SectorId, agent: AgentId },
    Belief { sector: SectorId, agent: AgentId },
    Alert { sector: SectorId, agent: AgentId },
    Assign { agent: AgentId },
    Reject { agent: AgentId },
    Control { sector: SectorId, agent: AgentId },
    GroupControl { sector: SectorId },
    Feedback { sector: SectorId, agent: AgentId },
}

impl Topic {
    /// The agent the channel belongs to, if it names one.
    pub fn agent(&self) -> Option<&AgentId> {
        match self {
            Topic::Status { agent, .. }
            | Topic::Data { agent, .. }
            | Topic::Belief { agent, .. }
            | Topic::Alert { agent, .. }
            | Topic::Assign { agent }
            | Topic::Reject { agent }
            | Topic::Control { agent, .. }
            | Topic::Feedback { agent, .. } => Some(agent),
            Topic::GroupControl { .. } => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Status { sector, agent } => write!(f, "status/{}/{}", sector, agent),
            Topic::Data { sector, agent } => write!(f, "data/{}/{}", sector, agent),
            Topic::Belief { sector, agent } => write!(f, "belief/{}/{}", sector, agent),
            Topic::Alert { sector, agent } => write!(f, "alert/{}/{}", sector, agent),
            Topic::Assign { agent } => write!(f, "control/assign/{}", agent),
            Topic::Reject { agent } => write!(f, "control/reject/{}", agent),
            Topic::Control { sector, agent } => write!(f, "control/{}/{}", sector, agent),
            Topic::GroupControl { sector } => write!(f, "control/{}", sector),
            Topic::Feedback { sector, agent } => write!(f, "feedback/{}/{}", sector, agent),
        }
    }
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split('/').collect();
        let sector = |segment: &str| -> Result<SectorId, TopicError> {
            segment.parse().map_err(|source| TopicError::Sector {
                topic: raw.to_string(),
                source,
            })
        };
        let agent = |segment: &str| -> Result<AgentId, TopicError> {
            if segment.is_empty() {
                Err(TopicError::EmptyAgent(raw.to_string()))
            } else {
                Ok(AgentId::new(segment))
            }
        };

        match parts[..] {
            ["status", s, a] => {
                let sector = s.parse().map_err(|source| TopicError::Sector {
                    topic: raw.to_string(),
                    source,
                })?;
                Ok(Topic::Status { sector, agent: agent(a)? })
            }
            ["data", s, a] => Ok(Topic::Data { sector: sector(s)?, agent: agent(a)? }),
            ["belief", s, a] => Ok(Topic::Belief { sector: sector(s)?, agent: agent(a)? }),
            ["alert", s, a] => Ok(Topic::Alert { sector: sector(s)?, agent: agent(a)? }),
            ["feedback", s, a] => Ok(Topic::Feedback { sector: sector(s)?, agent: agent(a)? }),
            ["control", "assign", a] => Ok(Topic::Assign { agent: agent(a)? }),
            ["control", "reject", a] => Ok(Topic::Reject { agent: agent(a)? }),
            ["control", s, a] => Ok(Topic::Control { sector: sector(s)?, agent: agent(a)? }),
            ["control", s] => Ok(Topic::GroupControl { sector: sector(s)? }),
            _ => Err(TopicError::Unrecognised(raw.to_string())),
        }
    }
}

/// Subscription pattern with `+` / `#` wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter(String);

impl TopicFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Exactly one concrete channel.
    pub fn exact(topic: &Topic) -> Self {
        Self(topic.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, topic: &str) -> bool {
        let mut pattern = self.0.split('/');
        let mut levels = topic.split('/');
        loop {
            match (pattern.next(), levels.next()) {
                (Some("#"), _) => return true,
                (Some("+"), Some(_)) => {}
                (Some(p), Some(l)) if p == l => {}
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
