//! Hoist movement model.
//!
//! A movement is one timed phase of a transporter: idling, an empty
//! approach, a lift, a loaded transfer, a sink, or an avoidance
//! relocation. The ordered movements of all transporters form the
//! movement log, the canonical output consumed by reporting.
//!
//! # Phase codes
//!
//! | Phase | Code |
//! |-------|------|
//! | Idle | 0 |
//! | MoveToLift | 1 |
//! | Lift | 2 |
//! | MoveToSink | 3 |
//! | Sink | 4 |
//! | Avoid | 5 |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Movement phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    MoveToLift,
    Lift,
    MoveToSink,
    Sink,
    /// Relocation out of a shared zone.
    Avoid,
}

impl Phase {
    /// Numeric phase code used in the movement table.
    pub fn code(self) -> u8 {
        match self {
            Phase::Idle => 0,
            Phase::MoveToLift => 1,
            Phase::Lift => 2,
            Phase::MoveToSink => 3,
            Phase::Sink => 4,
            Phase::Avoid => 5,
        }
    }

    /// Whether the hoist travels horizontally during this phase.
    pub fn is_travel(self) -> bool {
        matches!(self, Phase::MoveToLift | Phase::MoveToSink | Phase::Avoid)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "Idle",
            Phase::MoveToLift => "Move to lift",
            Phase::Lift => "Lift",
            Phase::MoveToSink => "Move to sink",
            Phase::Sink => "Sink",
            Phase::Avoid => "Avoid",
        };
        f.write_str(name)
    }
}

/// A transfer of one batch between two consecutive stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportTask {
    pub batch_id: u32,
    /// Stage number the batch is moved into.
    pub transition: u32,
    pub transporter_id: u32,
    pub from_station: u32,
    pub to_station: u32,
    /// Scheduled lift start (end of the source stage).
    pub lift_time: f64,
    /// Time the Sink phase finishes when the lift is on time; never later
    /// than the destination stage start for a schedule built by this crate.
    pub sink_time: f64,
}

/// One timed hoist phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Sequence id, unique within a log.
    pub seq: u64,
    pub transporter_id: u32,
    /// Batch carried or served; 0 when not batch-bound.
    pub batch_id: u32,
    pub phase: Phase,
    pub start: f64,
    pub end: f64,
    pub from_station: u32,
    pub to_station: u32,
    pub description: String,
}

impl Movement {
    pub fn new(
        transporter_id: u32,
        batch_id: u32,
        phase: Phase,
        start: f64,
        end: f64,
        from_station: u32,
        to_station: u32,
    ) -> Self {
        Self {
            seq: 0,
            transporter_id,
            batch_id,
            phase,
            start,
            end,
            from_station,
            to_station,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Shifts both ends by `delta` seconds.
    #[inline]
    pub fn shift(&mut self, delta: f64) {
        self.start += delta;
        self.end += delta;
    }
}

/// Flat movement table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRow {
    pub seq: u64,
    pub transporter: u32,
    pub batch: u32,
    pub phase: u8,
    pub start: f64,
    pub end: f64,
    pub from_station: u32,
    pub to_station: u32,
    pub description: String,
}

/// Movements grouped per transporter, each list in time order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementLog {
    pub by_transporter: BTreeMap<u32, Vec<Movement>>,
}

impl MovementLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the movement list of one transporter.
    pub fn insert(&mut self, transporter_id: u32, movements: Vec<Movement>) {
        self.by_transporter.insert(transporter_id, movements);
    }

    /// Movements of one transporter (empty if unknown).
    pub fn movements(&self, transporter_id: u32) -> &[Movement] {
        self.by_transporter
            .get(&transporter_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterates over all movements, transporter by transporter.
    pub fn iter(&self) -> impl Iterator<Item = &Movement> {
        self.by_transporter.values().flatten()
    }

    /// Latest end over all transporters.
    pub fn end_time(&self) -> f64 {
        self.iter().map(|m| m.end).fold(0.0, f64::max)
    }

    /// Number of movements with the given phase.
    pub fn count_phase(&self, phase: Phase) -> usize {
        self.iter().filter(|m| m.phase == phase).count()
    }

    /// Total number of movements.
    pub fn len(&self) -> usize {
        self.by_transporter.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reassigns sequence ids in global time order.
    ///
    /// Ordering is (start, transporter, position in its list), so ids are
    /// monotonically increasing in time and stable for equal starts.
    pub fn renumber(&mut self) {
        let mut keys: Vec<(f64, u32, usize)> = self
            .by_transporter
            .iter()
            .flat_map(|(&t, list)| list.iter().enumerate().map(move |(i, m)| (m.start, t, i)))
            .collect();
        keys.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        for (seq, (_, t, i)) in keys.into_iter().enumerate() {
            if let Some(m) = self.by_transporter.get_mut(&t).and_then(|l| l.get_mut(i)) {
                m.seq = seq as u64 + 1;
            }
        }
    }

    /// Flattened table ordered by sequence id.
    pub fn rows(&self) -> Vec<MovementRow> {
        let mut rows: Vec<MovementRow> = self
            .iter()
            .map(|m| MovementRow {
                seq: m.seq,
                transporter: m.transporter_id,
                batch: m.batch_id,
                phase: m.phase.code(),
                start: m.start,
                end: m.end,
                from_station: m.from_station,
                to_station: m.to_station,
                description: m.description.clone(),
            })
            .collect();
        rows.sort_by_key(|r| r.seq);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> MovementLog {
        let mut log = MovementLog::new();
        log.insert(
            1,
            vec![
                Movement::new(1, 0, Phase::Idle, 0.0, 10.0, 100, 100),
                Movement::new(1, 5, Phase::MoveToLift, 10.0, 14.0, 100, 102),
            ],
        );
        log.insert(2, vec![Movement::new(2, 0, Phase::Idle, 0.0, 20.0, 110, 110)]);
        log
    }

    #[test]
    fn test_phase_codes() {
        assert_eq!(Phase::Idle.code(), 0);
        assert_eq!(Phase::Sink.code(), 4);
        assert_eq!(Phase::Avoid.code(), 5);
        assert!(Phase::Avoid.is_travel());
        assert!(!Phase::Lift.is_travel());
    }

    #[test]
    fn test_log_queries() {
        let log = sample_log();
        assert_eq!(log.len(), 3);
        assert_eq!(log.movements(1).len(), 2);
        assert!(log.movements(9).is_empty());
        assert_eq!(log.end_time(), 20.0);
        assert_eq!(log.count_phase(Phase::Idle), 2);
    }

    #[test]
    fn test_renumber_time_order() {
        let mut log = sample_log();
        log.renumber();
        let rows = log.rows();
        let seqs: Vec<u64> = rows.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        // Equal starts break ties by transporter id
        assert_eq!(rows[0].transporter, 1);
        assert_eq!(rows[1].transporter, 2);
        assert_eq!(rows[2].phase, 1);
    }

    #[test]
    fn test_shift() {
        let mut m = Movement::new(1, 1, Phase::Lift, 5.0, 9.0, 101, 101);
        m.shift(2.5);
        assert_eq!(m.start, 7.5);
        assert_eq!(m.duration(), 4.0);
    }
}
