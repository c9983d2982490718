//! Network link with fair bandwidth sharing.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Entry {
    remaining_volume: f64,
    id: u64,
    transfer: u64,
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .remaining_volume
            .total_cmp(&self.remaining_volume)
            .then(other.id.cmp(&self.id))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

/// Link whose bandwidth is split equally between active transfers.
///
/// Transfers are identified by the caller-provided ids. The link latency is not accounted here.
pub struct SharedLink {
    bandwidth: f64,
    latency: f64,
    entries: BinaryHeap<Entry>,
    next_id: u64,
    throughput_per_transfer: f64,
    last_update: f64,
}

impl SharedLink {
    pub fn new(bandwidth: f64, latency: f64) -> Self {
        Self {
            bandwidth,
            latency,
            entries: BinaryHeap::new(),
            next_id: 0,
            throughput_per_transfer: 0.,
            last_update: 0.,
        }
    }

    pub fn latency(&self) -> f64 {
        self.latency
    }

    fn update(&mut self, time: f64, active: usize) {
        let processed = (time - self.last_update) * self.throughput_per_transfer;
        if processed > 0. {
            self.entries = self
                .entries
                .drain()
                .map(|e| Entry {
                    remaining_volume: e.remaining_volume - processed,
                    ..e
                })
                .collect();
        }
        self.throughput_per_transfer = if active > 0 {
            self.bandwidth / active as f64
        } else {
            0.
        };
        self.last_update = time;
    }

    /// Starts transferring `volume` bytes at `time`.
    pub fn insert(&mut self, time: f64, volume: f64, transfer: u64) {
        self.update(time, self.entries.len() + 1);
        self.entries.push(Entry {
            remaining_volume: volume,
            id: self.next_id,
            transfer,
        });
        self.next_id += 1;
    }

    /// Returns the completion time and id of the transfer which finishes first.
    pub fn next_completion(&self) -> Option<(f64, u64)> {
        self.entries.peek().map(|e| {
            (
                self.last_update + e.remaining_volume.max(0.) / self.throughput_per_transfer,
                e.transfer,
            )
        })
    }

    /// Removes the transfer which finishes first and returns its completion time and id.
    pub fn pop(&mut self) -> Option<(f64, u64)> {
        let (time, transfer) = self.next_completion()?;
        self.entries.pop();
        self.update(time, self.entries.len());
        Some((time, transfer))
    }
}
