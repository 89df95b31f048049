// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0
//! Bounded FIFO history of recent readings for one agent.

use crate::domain::sensor::Measurement;
use std::collections::VecDeque;

pub const DEFAULT_WINDOW_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct MeasurementWindow {
    capacity: usize,
    readings: VecDeque<Measurement>,
}

impl MeasurementWindow {
    /// A capacity of zero is treated as one: the window always holds the
    /// latest reading.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            readings: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a reading, evicting the oldest when full. Returns the evicted
    /// reading, if any.
    pub fn push(&mut self, measurement: Measurement) -> Option<Measurement> {
        let evicted = if self.readings.len() == self.capacity {
            self.readings.pop_front()
        } else {
            None
        };
        self.readings.push_back(measurement);
        evicted
    }

    pub fn latest(&self) -> Option<&Measurement> {
        self.readings.back()
    }

    pub fn oldest(&self) -> Option<&Measurement> {
        self.readings.front()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.readings.iter()
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }
}

impl Default for MeasurementWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn reading(pressure: f64) -> Measurement {
        Measurement::new(Utc::now(), 15.0, pressure, 50.0)
    }

    #[test]
    fn test_window_evicts_oldest_first() {
        let mut window = MeasurementWindow::default();
        for i in 0..10 {
            assert!(window.push(reading(1000.0 + i as f64)).is_none());
        }
        assert_eq!(window.len(), 10);

        let evicted = window.push(reading(1010.0)).unwrap();
        assert_eq!(evicted.pressure, 1000.0);
        assert_eq!(window.len(), 10);
        assert_eq!(window.oldest().unwrap().pressure, 1001.0);
        assert_eq!(window.latest().unwrap().pressure, 1010.0);
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let mut window = MeasurementWindow::new(0);
        window.push(reading(990.0));
        window.push(reading(980.0));
        assert_eq!(window.len(), 1);
        assert_eq!(window.latest().unwrap().pressure, 980.0);
    }
}
