//! Stage schedule (scheduler output) model.
//!
//! A stage schedule assigns every (batch, stage) pair a station and a
//! time interval. Stage 0 is the synthetic release stage: the batch
//! waiting at its release station until the first transfer.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One scheduled (batch, stage) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledStage {
    pub batch_id: u32,
    /// Stage number (0 = release stage).
    pub stage: u32,
    /// Assigned station.
    pub station: u32,
    /// Time the batch is put down at the station (s).
    pub start: i64,
    /// Time the batch is lifted from the station (s).
    pub end: i64,
    /// Dwell (`end - start`).
    pub duration: i64,
}

impl ScheduledStage {
    pub fn new(batch_id: u32, stage: u32, station: u32, start: i64, end: i64) -> Self {
        Self {
            batch_id,
            stage,
            station,
            start,
            end,
            duration: end - start,
        }
    }

    /// Whether two rows overlap in time (half-open intervals).
    #[inline]
    pub fn overlaps(&self, other: &ScheduledStage) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A complete stage schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSchedule {
    /// Rows ordered by (batch, stage) as produced.
    pub stages: Vec<ScheduledStage>,
}

/// A detected schedule or movement violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub violation_type: ViolationType,
    /// Related entity (batch, station or transporter id).
    pub entity_id: u32,
    /// Human-readable description.
    pub message: String,
}

/// Classification of violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    /// Dwell outside `[min_time, max_time]`.
    DwellOutOfBounds,
    /// Stage started before the previous stage (plus transfer) ended.
    PrecedenceViolation,
    /// Two batches on one station at the same time.
    StationOverlap,
    /// Stage uses a station outside its permitted set.
    StationNotPermitted,
    /// A transporter movement starts before the previous one ends.
    MovementOverlap,
    /// Task phases out of 0→1→2→3→4 order.
    PhaseOrder,
    /// A (batch, stage) pair has no row.
    MissingStage,
}

impl Violation {
    pub fn new(violation_type: ViolationType, entity_id: u32, message: impl Into<String>) -> Self {
        Self {
            violation_type,
            entity_id,
            message: message.into(),
        }
    }
}

impl StageSchedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row.
    pub fn add_stage(&mut self, stage: ScheduledStage) {
        self.stages.push(stage);
    }

    /// Sorts rows by (batch, stage).
    pub fn normalize(&mut self) {
        self.stages.sort_by_key(|s| (s.batch_id, s.stage));
    }

    /// Makespan: latest end over all rows (s).
    pub fn makespan(&self) -> i64 {
        self.stages.iter().map(|s| s.end).max().unwrap_or(0)
    }

    /// Rows of one batch, ordered by stage number.
    pub fn stages_for_batch(&self, batch_id: u32) -> Vec<&ScheduledStage> {
        let mut rows: Vec<&ScheduledStage> = self
            .stages
            .iter()
            .filter(|s| s.batch_id == batch_id)
            .collect();
        rows.sort_by_key(|s| s.stage);
        rows
    }

    /// Rows on one station, ordered by start.
    pub fn stages_at_station(&self, station: u32) -> Vec<&ScheduledStage> {
        let mut rows: Vec<&ScheduledStage> = self
            .stages
            .iter()
            .filter(|s| s.station == station)
            .collect();
        rows.sort_by_key(|s| s.start);
        rows
    }

    /// Finds one row.
    pub fn stage(&self, batch_id: u32, stage: u32) -> Option<&ScheduledStage> {
        self.stages
            .iter()
            .find(|s| s.batch_id == batch_id && s.stage == stage)
    }

    /// Completion time of a batch (end of its last stage).
    pub fn batch_completion(&self, batch_id: u32) -> Option<i64> {
        self.stages
            .iter()
            .filter(|s| s.batch_id == batch_id)
            .max_by_key(|s| s.stage)
            .map(|s| s.end)
    }

    /// Batch ids in order of first appearance.
    pub fn batch_ids(&self) -> Vec<u32> {
        let mut ids = Vec::new();
        for s in &self.stages {
            if !ids.contains(&s.batch_id) {
                ids.push(s.batch_id);
            }
        }
        ids
    }

    /// Occupied time per station, excluding release stages.
    pub fn station_busy_time(&self) -> HashMap<u32, i64> {
        let mut busy: HashMap<u32, i64> = HashMap::new();
        for s in self.stages.iter().filter(|s| s.stage > 0) {
            *busy.entry(s.station).or_insert(0) += s.duration;
        }
        busy
    }

    /// Number of rows.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schedule() -> StageSchedule {
        let mut s = StageSchedule::new();
        s.add_stage(ScheduledStage::new(2, 1, 102, 50, 120));
        s.add_stage(ScheduledStage::new(1, 0, 101, 0, 10));
        s.add_stage(ScheduledStage::new(1, 1, 102, 40, 45));
        s.add_stage(ScheduledStage::new(1, 2, 103, 60, 200));
        s
    }

    #[test]
    fn test_makespan() {
        assert_eq!(sample_schedule().makespan(), 200);
        assert_eq!(StageSchedule::new().makespan(), 0);
    }

    #[test]
    fn test_duration_derived() {
        let row = ScheduledStage::new(1, 1, 102, 40, 100);
        assert_eq!(row.duration, 60);
    }

    #[test]
    fn test_stages_for_batch_sorted() {
        let s = sample_schedule();
        let rows = s.stages_for_batch(1);
        let stages: Vec<u32> = rows.iter().map(|r| r.stage).collect();
        assert_eq!(stages, vec![0, 1, 2]);
    }

    #[test]
    fn test_stages_at_station() {
        let s = sample_schedule();
        let rows = s.stages_at_station(102);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].batch_id, 1);
        assert!(!rows[0].overlaps(rows[1]));
    }

    #[test]
    fn test_batch_completion() {
        let s = sample_schedule();
        assert_eq!(s.batch_completion(1), Some(200));
        assert_eq!(s.batch_completion(2), Some(120));
        assert_eq!(s.batch_completion(9), None);
    }

    #[test]
    fn test_normalize_and_ids() {
        let mut s = sample_schedule();
        s.normalize();
        assert_eq!(s.stages[0].batch_id, 1);
        assert_eq!(s.stages[0].stage, 0);
        assert_eq!(s.batch_ids(), vec![1, 2]);
    }

    #[test]
    fn test_station_busy_excludes_release() {
        let busy = sample_schedule().station_busy_time();
        assert_eq!(busy.get(&101), None);
        assert_eq!(busy[&102], 75);
    }
}
