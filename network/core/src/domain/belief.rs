// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Belief Store
//!
//! Per-agent cache of the most recent risk opinion received from each
//! neighbour. One entry per origin; a newer belief overwrites an older one.
//! Entries older than the staleness bound are excluded from every query even
//! while they are still stored, and are purged on [`BeliefStore::evict_expired`].

use crate::domain::sensor::{AgentId, SectorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Which neighbours count as consensus evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborScope {
    /// Only agents reporting from the same sector.
    SameSector,
    /// Same sector or a ring-adjacent one.
    Adjacent,
    /// Every assigned agent in the network.
    #[default]
    All,
}

impl NeighborScope {
    pub fn includes(self, own: SectorId, other: SectorId) -> bool {
        match self {
            NeighborScope::SameSector => own == other,
            NeighborScope::Adjacent => own == other || own.is_adjacent(other),
            NeighborScope::All => true,
        }
    }
}

impl std::str::FromStr for NeighborScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same_sector" => Ok(NeighborScope::SameSector),
            "adjacent" => Ok(NeighborScope::Adjacent),
            "all" => Ok(NeighborScope::All),
            other => Err(format!("unknown neighbor scope '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    pub origin: AgentId,
    pub sector: SectorId,
    pub risk_value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Convert a std duration, saturating instead of failing on overflow.
pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[derive(Debug, Clone)]
pub struct BeliefStore {
    staleness: chrono::Duration,
    scope: NeighborScope,
    entries: HashMap<AgentId, Belief>,
}

impl BeliefStore {
    pub fn new(staleness: Duration, scope: NeighborScope) -> Self {
        Self {
            staleness: to_chrono(staleness),
            scope,
            entries: HashMap::new(),
        }
    }

    pub fn scope(&self) -> NeighborScope {
        self.scope
    }

    /// Insert or overwrite the belief for its origin. A redelivered belief
    /// older than the stored one is ignored. Returns whether the store changed.
    pub fn upsert(&mut self, belief: Belief) -> bool {
        match self.entries.get(&belief.origin) {
            Some(existing) if existing.timestamp > belief.timestamp => false,
            _ => {
                self.entries.insert(belief.origin.clone(), belief);
                true
            }
        }
    }

    pub fn get(&self, origin: &AgentId) -> Option<&Belief> {
        self.entries.get(origin)
    }

    pub fn is_fresh(&self, belief: &Belief, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(belief.timestamp) <= self.staleness
    }

    /// Non-expired beliefs whose sector lies within scope of `own`.
    pub fn fresh_neighbors(&self, own: SectorId, now: DateTime<Utc>) -> impl Iterator<Item = &Belief> {
        let scope = self.scope;
        self.entries
            .values()
            .filter(move |b| self.is_fresh(b, now) && scope.includes(own, b.sector))
    }

    pub fn active_neighbor_count(&self, own: SectorId, now: DateTime<Utc>) -> usize {
        self.fresh_neighbors(own, now).count()
    }

    pub fn average_risk(&self, own: SectorId, now: DateTime<Utc>) -> Option<f64> {
        let (sum, count) = self
            .fresh_neighbors(own, now)
            .fold((0.0, 0usize), |(sum, count), b| (sum + b.risk_value, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let staleness = self.staleness;
        self.entries
            .retain(|_, b| now.signed_duration_since(b.timestamp) <= staleness);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sector(n: u8) -> SectorId {
        SectorId::new(n).unwrap()
    }

    fn belief(origin: &str, sector_no: u8, risk: f64, at: DateTime<Utc>) -> Belief {
        Belief {
            origin: AgentId::new(origin),
            sector: sector(sector_no),
            risk_value: risk,
            timestamp: at,
        }
    }

    #[test]
    fn test_latest_belief_wins_per_origin() {
        let now = Utc::now();
        let mut store = BeliefStore::new(Duration::from_secs(15), NeighborScope::All);

        assert!(store.upsert(belief("a", 2, 0.2, now - chrono::Duration::seconds(2))));
        assert!(store.upsert(belief("a", 2, 0.7, now)));
        assert!(!store.upsert(belief("a", 2, 0.1, now - chrono::Duration::seconds(1))));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&AgentId::new("a")).unwrap().risk_value, 0.7);
    }

    #[test]
    fn test_stale_beliefs_are_excluded_before_eviction() {
        let now = Utc::now();
        let mut store = BeliefStore::new(Duration::from_secs(15), NeighborScope::All);
        store.upsert(belief("old", 2, 0.9, now - chrono::Duration::seconds(30)));
        store.upsert(belief("new", 3, 0.4, now - chrono::Duration::seconds(5)));

        assert_eq!(store.len(), 2);
        assert_eq!(store.active_neighbor_count(sector(1), now), 1);
        assert_eq!(store.average_risk(sector(1), now), Some(0.4));

        assert_eq!(store.evict_expired(now), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_scope_same_sector_versus_all() {
        let now = Utc::now();
        let mut narrow = BeliefStore::new(Duration::from_secs(15), NeighborScope::SameSector);
        let mut wide = BeliefStore::new(Duration::from_secs(15), NeighborScope::All);
        for store in [&mut narrow, &mut wide] {
            store.upsert(belief("same", 1, 0.5, now));
            store.upsert(belief("next", 2, 0.5, now));
            store.upsert(belief("far", 4, 0.5, now));
        }
        assert_eq!(narrow.active_neighbor_count(sector(1), now), 1);
        assert_eq!(wide.active_neighbor_count(sector(1), now), 3);
    }

    #[test]
    fn test_adjacent_scope_wraps_ring() {
        let now = Utc::now();
        let mut store = BeliefStore::new(Duration::from_secs(15), NeighborScope::Adjacent);
        store.upsert(belief("six", 6, 0.5, now));
        store.upsert(belief("two", 2, 0.5, now));
        store.upsert(belief("four", 4, 0.5, now));
        assert_eq!(store.active_neighbor_count(sector(1), now), 2);
    }

    #[test]
    fn test_average_risk_without_neighbors() {
        let store = BeliefStore::new(Duration::from_secs(15), NeighborScope::All);
        assert_eq!(store.average_risk(sector(1), Utc::now()), None);
        assert!(store.is_empty());
    }
}
