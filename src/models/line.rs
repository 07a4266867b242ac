//! Line problem: the full input of the pipeline.

use serde::{Deserialize, Serialize};

use super::{Batch, Station, StageSpec, TransferTable, Transporter, TreatmentProgram};

/// Everything the scheduler and the movement synthesizer consume.
///
/// Transporters are kept in declared priority order; the first capable
/// one serves a transfer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineProblem {
    pub stations: Vec<Station>,
    pub programs: Vec<TreatmentProgram>,
    pub batches: Vec<Batch>,
    pub transporters: Vec<Transporter>,
    /// Measured durations overriding physics estimates.
    #[serde(default)]
    pub transfer_table: TransferTable,
}

impl LineProblem {
    pub fn new(stations: Vec<Station>, transporters: Vec<Transporter>) -> Self {
        Self {
            stations,
            programs: Vec::new(),
            batches: Vec::new(),
            transporters,
            transfer_table: TransferTable::new(),
        }
    }

    pub fn with_program(mut self, program: TreatmentProgram) -> Self {
        self.programs.push(program);
        self
    }

    pub fn with_batch(mut self, batch: Batch) -> Self {
        self.batches.push(batch);
        self
    }

    pub fn with_transfer_table(mut self, table: TransferTable) -> Self {
        self.transfer_table = table;
        self
    }

    /// Parses a problem from its canonical JSON form.
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn station(&self, id: u32) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn program(&self, id: u32) -> Option<&TreatmentProgram> {
        self.programs.iter().find(|p| p.id == id)
    }

    pub fn batch(&self, id: u32) -> Option<&Batch> {
        self.batches.iter().find(|b| b.id == id)
    }

    pub fn transporter(&self, id: u32) -> Option<&Transporter> {
        self.transporters.iter().find(|t| t.id == id)
    }

    /// Stage specs of a batch's program (empty if the program is unknown).
    pub fn stages_of(&self, batch: &Batch) -> &[StageSpec] {
        self.program(batch.program)
            .map(|p| p.stages.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        let problem = LineProblem::new(
            vec![Station::new(101, 0.0), Station::new(102, 600.0)],
            vec![Transporter::new(1, 101, 102)],
        )
        .with_program(TreatmentProgram::new(1).with_stage(StageSpec::new(1, 102, 30)))
        .with_batch(Batch::new(1, 1, 101));

        assert_eq!(problem.station(102).unwrap().position, 600.0);
        assert!(problem.station(103).is_none());
        assert_eq!(problem.transporter(1).unwrap().id, 1);
        let batch = problem.batch(1).unwrap();
        assert_eq!(problem.stages_of(batch).len(), 1);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "stations": [
                {"id": 101, "position": 0.0, "kind": "dry"},
                {"id": 102, "position": 800.0, "drain_time": 5.0, "device_delay": 1.0}
            ],
            "programs": [
                {"id": 1, "stages": [
                    {"stage": 1, "min_station": 102, "max_station": 102, "min_time": 60, "max_time": 90}
                ]}
            ],
            "batches": [{"id": 1, "program": 1, "release_station": 101}],
            "transporters": [
                {"id": 1, "ranges": [{"lift_min": 101, "lift_max": 102, "sink_min": 101, "sink_max": 102}],
                 "start_station": 101}
            ]
        }"#;

        let problem = LineProblem::from_json_str(json).unwrap();
        assert_eq!(problem.stations.len(), 2);
        assert!(!problem.station(101).unwrap().is_wet());
        assert_eq!(problem.programs[0].stages[0].max_time, 90);
        assert!(problem.transfer_table.is_empty());
    }

    #[test]
    fn test_from_json_error() {
        assert!(LineProblem::from_json_str("{").is_err());
    }
}
