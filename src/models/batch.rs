//! Batch model.
//!
//! A batch is one load of product moving through the line under a
//! treatment program. The scheduler never mutates it; computed times live
//! in [`StageSchedule`](super::StageSchedule).

use serde::{Deserialize, Serialize};

/// A production batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Batch identifier (non-zero; 0 marks movements without a batch).
    pub id: u32,
    /// Treatment program reference.
    pub program: u32,
    /// Station where the batch waits before its first transfer.
    pub release_station: u32,
    /// Earliest time the batch is available at its release station (s).
    #[serde(default)]
    pub release_time: i64,
    /// Externally supplied processing order (lower first).
    #[serde(default)]
    pub order_rank: Option<u32>,
}

impl Batch {
    /// Creates a batch released at t=0.
    pub fn new(id: u32, program: u32, release_station: u32) -> Self {
        Self {
            id,
            program,
            release_station,
            release_time: 0,
            order_rank: None,
        }
    }

    /// Sets the release time (s).
    pub fn with_release_time(mut self, release_time: i64) -> Self {
        self.release_time = release_time;
        self
    }

    /// Sets the external order rank.
    pub fn with_order_rank(mut self, rank: u32) -> Self {
        self.order_rank = Some(rank);
        self
    }
}

/// Returns batch indices in their externally supplied order.
///
/// Ranked batches come first by rank; unranked ones keep input order
/// after them.
pub fn release_order(batches: &[Batch]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..batches.len()).collect();
    indices.sort_by_key(|&i| (batches[i].order_rank.unwrap_or(u32::MAX), i));
    indices
}
