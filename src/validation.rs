//! Input validation and result checks.
//!
//! [`validate_input`] checks the structural integrity of a line problem
//! before scheduling. Detects:
//! - Duplicate IDs
//! - Unknown program and station references
//! - Inverted dwell bounds or station ranges
//! - Programs without stages
//!
//! [`check_schedule`] and [`check_movements`] verify the pipeline's
//! outputs against the line invariants: dwell bounds, stage precedence,
//! station exclusivity, per-transporter time order and phase order.

use std::collections::{HashMap, HashSet};

use crate::models::{LineProblem, MovementLog, Phase, StageSchedule, Violation, ViolationType};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Tolerance for floating-point time comparisons (s).
const TIME_EPS: f64 = 1e-6;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A batch references a program that doesn't exist.
    UnknownProgram,
    /// A batch or transporter references a station that doesn't exist.
    UnknownStation,
    /// `min_time > max_time`, negative dwell, or `min_station > max_station`.
    InvalidBounds,
    /// A program has no stages.
    EmptyProgram,
    /// Stage numbers are not 1, 2, 3, ... in order.
    InvalidStageNumber,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates the input data for a line problem.
///
/// Checks:
/// 1. No duplicate station, program, batch or transporter IDs
/// 2. Every program has stages numbered 1, 2, 3, ...
/// 3. Dwell bounds and station ranges are ordered
/// 4. Batches reference existing programs and release stations
/// 5. Transporter start stations exist
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(problem: &LineProblem) -> ValidationResult {
    let mut errors = Vec::new();

    let mut station_ids = HashSet::new();
    for s in &problem.stations {
        if !station_ids.insert(s.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate station ID: {}", s.id),
            ));
        }
    }

    let mut program_ids = HashSet::new();
    for p in &problem.programs {
        if !program_ids.insert(p.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate program ID: {}", p.id),
            ));
        }
        if p.stages.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyProgram,
                format!("Program {} has no stages", p.id),
            ));
        }
        for (i, spec) in p.stages.iter().enumerate() {
            if spec.stage as usize != i + 1 {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidStageNumber,
                    format!("Program {} stage #{} is numbered {}", p.id, i + 1, spec.stage),
                ));
            }
            if spec.min_time < 0 || spec.min_time > spec.max_time {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidBounds,
                    format!(
                        "Program {} stage {}: dwell [{}, {}]",
                        p.id, spec.stage, spec.min_time, spec.max_time
                    ),
                ));
            }
            if spec.min_station > spec.max_station {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidBounds,
                    format!(
                        "Program {} stage {}: station range [{}, {}]",
                        p.id, spec.stage, spec.min_station, spec.max_station
                    ),
                ));
            }
        }
    }

    let mut batch_ids = HashSet::new();
    for b in &problem.batches {
        if !batch_ids.insert(b.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate batch ID: {}", b.id),
            ));
        }
        if !program_ids.contains(&b.program) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownProgram,
                format!("Batch {} references unknown program {}", b.id, b.program),
            ));
        }
        if !station_ids.contains(&b.release_station) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownStation,
                format!(
                    "Batch {} references unknown release station {}",
                    b.id, b.release_station
                ),
            ));
        }
    }

    let mut transporter_ids = HashSet::new();
    for t in &problem.transporters {
        if !transporter_ids.insert(t.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate transporter ID: {}", t.id),
            ));
        }
        if !station_ids.contains(&t.start_station) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownStation,
                format!(
                    "Transporter {} starts at unknown station {}",
                    t.id, t.start_station
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks a stage schedule against the problem it solves.
///
/// Stage 0 rows must sit on the batch's release station and only have a
/// lower dwell bound of zero.
pub fn check_schedule(schedule: &StageSchedule, problem: &LineProblem) -> Vec<Violation> {
    let mut violations = Vec::new();

    for batch in &problem.batches {
        let rows = schedule.stages_for_batch(batch.id);
        let specs = problem.stages_of(batch);

        for stage in std::iter::once(0).chain(specs.iter().map(|s| s.stage)) {
            if !rows.iter().any(|r| r.stage == stage) {
                violations.push(Violation::new(
                    ViolationType::MissingStage,
                    batch.id,
                    format!("Batch {} stage {} is not scheduled", batch.id, stage),
                ));
            }
        }

        for row in &rows {
            if row.stage == 0 {
                if row.station != batch.release_station {
                    violations.push(Violation::new(
                        ViolationType::StationNotPermitted,
                        batch.id,
                        format!(
                            "Batch {} released at {} instead of {}",
                            batch.id, row.station, batch.release_station
                        ),
                    ));
                }
                if row.duration < 0 {
                    violations.push(Violation::new(
                        ViolationType::DwellOutOfBounds,
                        batch.id,
                        format!("Batch {} release stage ends before it starts", batch.id),
                    ));
                }
                continue;
            }

            let Some(spec) = specs.iter().find(|s| s.stage == row.stage) else {
                continue;
            };
            if row.duration < spec.min_time || row.duration > spec.max_time {
                violations.push(Violation::new(
                    ViolationType::DwellOutOfBounds,
                    batch.id,
                    format!(
                        "Batch {} stage {}: dwell {} outside [{}, {}]",
                        batch.id, row.stage, row.duration, spec.min_time, spec.max_time
                    ),
                ));
            }
            if !problem.station(row.station).is_some_and(|s| spec.permits(s)) {
                violations.push(Violation::new(
                    ViolationType::StationNotPermitted,
                    batch.id,
                    format!(
                        "Batch {} stage {}: station {} not permitted",
                        batch.id, row.stage, row.station
                    ),
                ));
            }
        }

        for pair in rows.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.start >= b.start || a.end > b.start {
                violations.push(Violation::new(
                    ViolationType::PrecedenceViolation,
                    batch.id,
                    format!(
                        "Batch {}: stage {} [{}, {}) vs stage {} starting {}",
                        batch.id, a.stage, a.start, a.end, b.stage, b.start
                    ),
                ));
            }
        }
    }

    let mut by_station: HashMap<u32, Vec<usize>> = HashMap::new();
    for (i, row) in schedule.stages.iter().enumerate() {
        by_station.entry(row.station).or_default().push(i);
    }
    for (station, rows) in by_station {
        for (k, &i) in rows.iter().enumerate() {
            for &j in &rows[k + 1..] {
                let (a, b) = (&schedule.stages[i], &schedule.stages[j]);
                if a.batch_id != b.batch_id && a.overlaps(b) {
                    violations.push(Violation::new(
                        ViolationType::StationOverlap,
                        station,
                        format!(
                            "Station {}: batch {} [{}, {}) overlaps batch {} [{}, {})",
                            station, a.batch_id, a.start, a.end, b.batch_id, b.start, b.end
                        ),
                    ));
                }
            }
        }
    }

    violations
}

/// Checks per-transporter time order and task phase order.
///
/// Batch-bound phases other than Avoid must cycle 0, 1, 2, 3, 4.
/// Movements with batch 0 (return trips, trailing idles) are not part of
/// a task.
pub fn check_movements(log: &MovementLog) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (&id, list) in &log.by_transporter {
        for pair in list.windows(2) {
            if pair[0].end > pair[1].start + TIME_EPS {
                violations.push(Violation::new(
                    ViolationType::MovementOverlap,
                    id,
                    format!(
                        "Transporter {}: movement ending {} overlaps next starting {}",
                        id, pair[0].end, pair[1].start
                    ),
                ));
            }
        }

        let mut expected = 0;
        for m in list.iter().filter(|m| m.batch_id != 0 && m.phase != Phase::Avoid) {
            let code = m.phase.code();
            if code != expected {
                violations.push(Violation::new(
                    ViolationType::PhaseOrder,
                    id,
                    format!(
                        "Transporter {} batch {}: phase {} where {} was expected",
                        id, m.batch_id, code, expected
                    ),
                ));
            }
            expected = (code + 1) % 5;
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Batch, Movement, ScheduledStage, StageSpec, Station, Transporter, TreatmentProgram};

    fn problem() -> LineProblem {
        LineProblem::new(
            vec![Station::new(20, 0.0), Station::new(21, 500.0), Station::new(101, 0.0)],
            vec![Transporter::new(1, 20, 101)],
        )
        .with_program(
            TreatmentProgram::new(1)
                .with_stage(StageSpec::new(1, 20, 100).with_station_range(20, 21).with_dwell(100, 150))
                .with_stage(StageSpec::new(2, 21, 30)),
        )
        .with_batch(Batch::new(1, 1, 101))
        .with_batch(Batch::new(2, 1, 101))
    }

    fn schedule() -> StageSchedule {
        let mut s = StageSchedule::new();
        s.add_stage(ScheduledStage::new(1, 0, 101, 0, 0));
        s.add_stage(ScheduledStage::new(1, 1, 20, 10, 110));
        s.add_stage(ScheduledStage::new(1, 2, 21, 120, 150));
        s.add_stage(ScheduledStage::new(2, 0, 101, 0, 100));
        s.add_stage(ScheduledStage::new(2, 1, 20, 110, 210));
        s.add_stage(ScheduledStage::new(2, 2, 21, 220, 250));
        s
    }

    fn kinds(violations: &[Violation]) -> Vec<ViolationType> {
        violations.iter().map(|v| v.violation_type.clone()).collect()
    }

    #[test]
    fn test_valid_input() {
        assert!(validate_input(&problem()).is_ok());
    }

    #[test]
    fn test_duplicate_ids() {
        let mut p = problem();
        p.stations.push(Station::new(20, 9.0));
        p.batches.push(Batch::new(1, 1, 101));
        let errors = validate_input(&p).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == ValidationErrorKind::DuplicateId));
    }

    #[test]
    fn test_unknown_references() {
        let mut p = problem();
        p.batches.push(Batch::new(3, 9, 999));
        p.transporters.push(Transporter::new(2, 20, 21).with_start_station(77));
        let errors = validate_input(&p).unwrap_err();
        assert!(errors.iter().any(|e| e.kind == ValidationErrorKind::UnknownProgram));
        assert_eq!(
            errors.iter().filter(|e| e.kind == ValidationErrorKind::UnknownStation).count(),
            2
        );
    }

    #[test]
    fn test_invalid_bounds_and_empty_program() {
        let p = problem()
            .with_program(TreatmentProgram::new(2))
            .with_program(
                TreatmentProgram::new(3).with_stage(StageSpec::new(1, 20, 10).with_dwell(50, 10)),
            );
        let errors = validate_input(&p).unwrap_err();
        assert!(errors.iter().any(|e| e.kind == ValidationErrorKind::EmptyProgram));
        assert!(errors.iter().any(|e| e.kind == ValidationErrorKind::InvalidBounds));
    }

    #[test]
    fn test_stage_numbering() {
        let p = problem().with_program(TreatmentProgram::new(2).with_stage(StageSpec::new(2, 20, 10)));
        let errors = validate_input(&p).unwrap_err();
        assert_eq!(errors[0].kind, ValidationErrorKind::InvalidStageNumber);
    }

    #[test]
    fn test_valid_schedule() {
        assert!(check_schedule(&schedule(), &problem()).is_empty());
    }

    #[test]
    fn test_dwell_out_of_bounds() {
        let mut s = schedule();
        s.stages[1] = ScheduledStage::new(1, 1, 20, 10, 50);
        assert_eq!(kinds(&check_schedule(&s, &problem())), vec![ViolationType::DwellOutOfBounds]);
    }

    #[test]
    fn test_station_overlap_detected() {
        let mut s = schedule();
        s.stages[4] = ScheduledStage::new(2, 1, 20, 100, 200);
        let v = check_schedule(&s, &problem());
        assert!(kinds(&v).contains(&ViolationType::StationOverlap));
    }

    #[test]
    fn test_precedence_and_missing_stage() {
        let mut s = schedule();
        s.stages[2] = ScheduledStage::new(1, 2, 21, 105, 135);
        s.stages.remove(5);
        let v = kinds(&check_schedule(&s, &problem()));
        assert!(v.contains(&ViolationType::PrecedenceViolation));
        assert!(v.contains(&ViolationType::MissingStage));
    }

    #[test]
    fn test_station_not_permitted() {
        let mut s = schedule();
        s.stages[0] = ScheduledStage::new(1, 0, 20, 0, 0);
        s.stages[2] = ScheduledStage::new(1, 2, 20, 120, 150);
        let v = kinds(&check_schedule(&s, &problem()));
        assert_eq!(
            v.iter().filter(|k| **k == ViolationType::StationNotPermitted).count(),
            2
        );
    }

    #[test]
    fn test_movement_checks() {
        let mut log = MovementLog::new();
        log.insert(
            1,
            vec![
                Movement::new(1, 1, Phase::Idle, 0.0, 5.0, 101, 101),
                Movement::new(1, 1, Phase::MoveToLift, 5.0, 5.0, 101, 101),
                Movement::new(1, 1, Phase::Lift, 5.0, 20.0, 101, 101),
                Movement::new(1, 1, Phase::Sink, 18.0, 30.0, 20, 20),
            ],
        );
        let v = kinds(&check_movements(&log));
        assert_eq!(v, vec![ViolationType::MovementOverlap, ViolationType::PhaseOrder]);
    }
}
