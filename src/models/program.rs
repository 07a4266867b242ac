//! Treatment program (recipe) model.
//!
//! A treatment program is the ordered list of stages a batch passes
//! through. Each stage names a permitted station range and a dwell-time
//! window.
//!
//! # Time Representation
//! Dwell times are whole seconds relative to the scheduling epoch (t=0).

use serde::{Deserialize, Serialize};

use super::Station;

/// One ordered step of a treatment program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    /// Stage number within the program (1-based).
    pub stage: u32,
    /// Lowest permitted station id (inclusive).
    pub min_station: u32,
    /// Highest permitted station id (inclusive).
    pub max_station: u32,
    /// Restricts the range to one parallel group.
    #[serde(default)]
    pub group: Option<u32>,
    /// Minimum dwell (s).
    pub min_time: i64,
    /// Maximum dwell (s).
    pub max_time: i64,
}

impl StageSpec {
    /// Creates a stage bound to a single station with a fixed dwell.
    pub fn new(stage: u32, station: u32, dwell: i64) -> Self {
        Self {
            stage,
            min_station: station,
            max_station: station,
            group: None,
            min_time: dwell,
            max_time: dwell,
        }
    }

    /// Sets the permitted station range.
    pub fn with_station_range(mut self, min_station: u32, max_station: u32) -> Self {
        self.min_station = min_station;
        self.max_station = max_station;
        self
    }

    /// Restricts the range to a parallel group.
    pub fn with_group(mut self, group: u32) -> Self {
        self.group = Some(group);
        self
    }

    /// Sets the dwell window.
    pub fn with_dwell(mut self, min_time: i64, max_time: i64) -> Self {
        self.min_time = min_time;
        self.max_time = max_time;
        self
    }

    /// Whether `station` is a permitted choice for this stage.
    pub fn permits(&self, station: &Station) -> bool {
        station.id >= self.min_station
            && station.id <= self.max_station
            && self.group.is_none_or(|g| g == station.group)
    }

    /// Candidate station ids, in line order.
    ///
    /// An empty result is a configuration error; callers report it.
    pub fn candidates(&self, stations: &[Station]) -> Vec<u32> {
        let mut ids: Vec<u32> = stations
            .iter()
            .filter(|s| self.permits(s))
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// A treatment program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentProgram {
    /// Program identifier.
    pub id: u32,
    /// Ordered stages.
    pub stages: Vec<StageSpec>,
}

impl TreatmentProgram {
    /// Creates an empty program.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            stages: Vec::new(),
        }
    }

    /// Appends a stage.
    pub fn with_stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }

    /// Number of stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Sum of the minimum dwell times (s).
    pub fn min_total_time(&self) -> i64 {
        self.stages.iter().map(|s| s.min_time).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Vec<Station> {
        vec![
            Station::new(101, 0.0).with_group(1),
            Station::new(102, 500.0).with_group(2),
            Station::new(103, 1000.0).with_group(2),
            Station::new(104, 1500.0).with_group(3),
        ]
    }

    #[test]
    fn test_program_builder() {
        let program = TreatmentProgram::new(1)
            .with_stage(StageSpec::new(1, 102, 60).with_dwell(60, 120))
            .with_stage(StageSpec::new(2, 104, 30));

        assert_eq!(program.stage_count(), 2);
        assert_eq!(program.min_total_time(), 90);
    }

    #[test]
    fn test_candidates_range() {
        let stage = StageSpec::new(1, 101, 10).with_station_range(102, 104);
        assert_eq!(stage.candidates(&line()), vec![102, 103, 104]);
    }

    #[test]
    fn test_candidates_group_intersection() {
        let stage = StageSpec::new(1, 101, 10)
            .with_station_range(101, 104)
            .with_group(2);
        assert_eq!(stage.candidates(&line()), vec![102, 103]);
    }

    #[test]
    fn test_candidates_empty() {
        let stage = StageSpec::new(1, 101, 10)
            .with_station_range(101, 101)
            .with_group(3);
        assert!(stage.candidates(&line()).is_empty());
    }
}
