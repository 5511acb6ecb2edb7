//! Bounded per-slot history of last-RSSI samples

use std::collections::VecDeque;

use crate::device::MAX_SLOTS;

/// Samples kept per slot before the oldest is evicted
pub const RSSI_HISTORY_CAPACITY: usize = 120;

#[derive(Debug, Clone)]
pub struct RssiHistory {
    slots: Vec<VecDeque<f32>>,
    capacity: usize,
}

impl Default for RssiHistory {
    fn default() -> Self {
        Self::with_capacity(RSSI_HISTORY_CAPACITY)
    }
}

impl RssiHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![VecDeque::with_capacity(capacity); MAX_SLOTS],
            capacity,
        }
    }

    /// Append a sample, evicting the oldest beyond capacity
    pub fn push(&mut self, slot: usize, value: f32) {
        let Some(samples) = self.slots.get_mut(slot) else {
            return;
        };

        samples.push_back(value);
        while samples.len() > self.capacity {
            samples.pop_front();
        }
    }

    /// Samples for one slot, oldest first
    pub fn slot(&self, slot: usize) -> Option<&VecDeque<f32>> {
        self.slots.get(slot)
    }
}
