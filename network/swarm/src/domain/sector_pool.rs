// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Sector Pool
//!
//! The fixed set of six sector slots. At most one agent occupies a slot, and
//! no more than `capacity` slots are occupied at once.

use std::collections::BTreeMap;
use stormnet_core::sensor::{AgentId, SectorId, SECTOR_COUNT};

#[derive(Debug, Clone)]
pub struct SectorPool {
    capacity: usize,
    occupants: BTreeMap<SectorId, AgentId>,
}

impl SectorPool {
    /// Capacity is clamped to `1..=6`.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.clamp(1, SECTOR_COUNT as usize),
            occupants: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupied(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_full(&self) -> bool {
        self.occupants.len() >= self.capacity
    }

    pub fn occupant(&self, sector: SectorId) -> Option<&AgentId> {
        self.occupants.get(&sector)
    }

    pub fn is_free(&self, sector: SectorId) -> bool {
        !self.occupants.contains_key(&sector)
    }

    /// Claim a slot for `agent`: the requested sector when it is free,
    /// otherwise the lowest-numbered free one. `None` when full.
    pub fn allocate(&mut self, agent: AgentId, requested: Option<SectorId>) -> Option<SectorId> {
        if self.is_full() {
            return None;
        }
        let sector = requested
            .filter(|s| self.is_free(*s))
            .or_else(|| SectorId::all().find(|s| self.is_free(*s)))?;
        self.occupants.insert(sector, agent);
        Some(sector)
    }

    pub fn release(&mut self, sector: SectorId) -> Option<AgentId> {
        self.occupants.remove(&sector)
    }

    /// Occupied sectors in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (SectorId, &AgentId)> {
        self.occupants.iter().map(|(sector, agent)| (*sector, agent))
    }
}

impl Default for SectorPool {
    fn default() -> Self {
        Self::new(SECTOR_COUNT as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sector(n: u8) -> SectorId {
        SectorId::new(n).unwrap()
    }

    #[test]
    fn test_lowest_free_sector_first() {
        let mut pool = SectorPool::default();
        for n in 1..=6 {
            assert_eq!(pool.allocate(AgentId::new(format!("a{}", n)), None), Some(sector(n)));
        }
        assert!(pool.is_full());
        assert_eq!(pool.allocate(AgentId::new("a7"), None), None);

        assert_eq!(pool.release(sector(4)), Some(AgentId::new("a4")));
        assert_eq!(pool.allocate(AgentId::new("a8"), None), Some(sector(4)));
    }

    #[test]
    fn test_requested_sector_honoured_only_when_free() {
        let mut pool = SectorPool::default();
        assert_eq!(pool.allocate(AgentId::new("a"), Some(sector(5))), Some(sector(5)));
        assert_eq!(pool.allocate(AgentId::new("b"), Some(sector(5))), Some(sector(1)));
        assert_eq!(pool.occupant(sector(5)), Some(&AgentId::new("a")));
    }

    #[test]
    fn test_reduced_capacity() {
        let mut pool = SectorPool::new(2);
        assert!(pool.allocate(AgentId::new("a"), None).is_some());
        assert!(pool.allocate(AgentId::new("b"), Some(sector(6))).is_some());
        assert_eq!(pool.allocate(AgentId::new("c"), None), None);
        assert_eq!(SectorPool::new(0).capacity(), 1);
        assert_eq!(SectorPool::new(40).capacity(), 6);
    }
}
