// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Sensor Identity and Readings
//!
//! Value objects shared by every other module:
//!
//! - [`AgentId`]: stable identifier of one sensing agent.
//! - [`SectorId`]: one of the six fixed capacity slots (`sector1`..`sector6`).
//! - [`SectorRef`]: the sector segment of a channel name, which may still be
//!   `pending` before the monitor has assigned a sector.
//! - [`Measurement`]: a single weather reading.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of sector slots managed by a monitor.
pub const SECTOR_COUNT: u8 = 6;

const PENDING_SEGMENT: &str = "pending";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate an id of the form `{kind}-{millis % 100000}-{100..999}`.
    pub fn generate(kind: &str) -> Self {
        let millis = Utc::now().timestamp_millis().rem_euclid(100_000);
        let suffix: u16 = rand::rng().random_range(100..1000);
        Self(format!("{}-{}-{}", kind, millis, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SectorError {
    #[error("sector number {0} is outside 1..={SECTOR_COUNT}")]
    OutOfRange(u8),

    #[error("malformed sector name '{0}'")]
    Malformed(String),
}

/// One of the six fixed sector slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectorId(u8);

impl SectorId {
    pub fn new(number: u8) -> Result<Self, SectorError> {
        if (1..=SECTOR_COUNT).contains(&number) {
            Ok(Self(number))
        } else {
            Err(SectorError::OutOfRange(number))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// All sectors in ascending order.
    pub fn all() -> impl Iterator<Item = SectorId> {
        (1..=SECTOR_COUNT).map(SectorId)
    }

    /// Neighbouring sector on the ring `1..6`, i.e. numbers differing by one
    /// with wrap-around.
    pub fn is_adjacent(self, other: SectorId) -> bool {
        let diff = self.0.abs_diff(other.0);
        diff == 1 || diff == SECTOR_COUNT - 1
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sector{}", self.0)
    }
}

impl FromStr for SectorId {
    type Err = SectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("sector")
            .ok_or_else(|| SectorError::Malformed(s.to_string()))?;
        let number: u8 = digits
            .parse()
            .map_err(|_| SectorError::Malformed(s.to_string()))?;
        SectorId::new(number)
    }
}

impl Serialize for SectorId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SectorId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Sector segment of a channel name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectorRef {
    Assigned(SectorId),
    Pending,
}

impl SectorRef {
    pub fn assigned(self) -> Option<SectorId> {
        match self {
            SectorRef::Assigned(sector) => Some(sector),
            SectorRef::Pending => None,
        }
    }
}

impl From<Option<SectorId>> for SectorRef {
    fn from(sector: Option<SectorId>) -> Self {
        sector.map_or(SectorRef::Pending, SectorRef::Assigned)
    }
}

impl fmt::Display for SectorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectorRef::Assigned(sector) => sector.fmt(f),
            SectorRef::Pending => f.write_str(PENDING_SEGMENT),
        }
    }
}

impl FromStr for SectorRef {
    type Err = SectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == PENDING_SEGMENT {
            Ok(SectorRef::Pending)
        } else {
            s.parse().map(SectorRef::Assigned)
        }
    }
}

/// A single weather reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: DateTime<Utc>,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Hectopascal.
    pub pressure: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
}

impl Measurement {
    pub fn new(timestamp: DateTime<Utc>, temperature: f64, pressure: f64, humidity: f64) -> Self {
        Self {
            timestamp,
            temperature,
            pressure,
            humidity,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.temperature.is_finite() && self.pressure.is_finite() && self.humidity.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_parse_and_display() {
        let sector: SectorId = "sector4".parse().unwrap();
        assert_eq!(sector.number(), 4);
        assert_eq!(sector.to_string(), "sector4");

        assert_eq!("sector0".parse::<SectorId>(), Err(SectorError::OutOfRange(0)));
        assert_eq!("sector7".parse::<SectorId>(), Err(SectorError::OutOfRange(7)));
        assert!(matches!("site3".parse::<SectorId>(), Err(SectorError::Malformed(_))));
    }

    #[test]
    fn test_sector_ring_adjacency() {
        let s1 = SectorId::new(1).unwrap();
        let s2 = SectorId::new(2).unwrap();
        let s4 = SectorId::new(4).unwrap();
        let s6 = SectorId::new(6).unwrap();

        assert!(s1.is_adjacent(s2));
        assert!(s1.is_adjacent(s6));
        assert!(!s1.is_adjacent(s4));
        assert!(!s1.is_adjacent(s1));
    }

    #[test]
    fn test_sector_ref_pending() {
        assert_eq!("pending".parse::<SectorRef>(), Ok(SectorRef::Pending));
        assert_eq!(SectorRef::from(None).to_string(), "pending");
        let assigned = SectorRef::from(SectorId::new(2).ok());
        assert_eq!(assigned.assigned().map(SectorId::number), Some(2));
    }

    #[test]
    fn test_sector_serde_uses_wire_name() {
        let sector = SectorId::new(3).unwrap();
        assert_eq!(serde_json::to_string(&sector).unwrap(), "\"sector3\"");
        let back: SectorId = serde_json::from_str("\"sector3\"").unwrap();
        assert_eq!(back, sector);
        assert!(serde_json::from_str::<SectorId>("\"sector9\"").is_err());
    }

    #[test]
    fn test_generated_agent_id_shape() {
        let id = AgentId::generate("meteo");
        let parts: Vec<&str> = id.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "meteo");
        let suffix: u16 = parts[2].parse().unwrap();
        assert!((100..1000).contains(&suffix));
    }
}
