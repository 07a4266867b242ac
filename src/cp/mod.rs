//! CP-based stage scheduling formulation.
//!
//! Builds a [`CpModel`] from a [`LineProblem`]: one interval per
//! (batch, stage) including the synthetic release stage 0, a transfer
//! table for every candidate station pair of consecutive stages, station
//! and hoist exclusivity, and optionally the supplied batch order. The
//! model is solved by any [`CpSolver`] backend.
//!
//! # Reference
//! - Laborie et al. (2018), "IBM ILOG CP Optimizer for Scheduling"
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"

mod model;
mod solver;
mod timeline;
mod timetable;

pub use model::{CpConstraint, CpModel, IntervalVar, Job, Objective, Transfer};
pub use solver::{CancelToken, CpSolution, CpSolver, IntervalSolution, SolverConfig, SolverStatus};
pub use timeline::{HoistTrack, Timeline, Trip};
pub use timetable::TimetableSolver;

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{LineError, Result};
use crate::models::{
    capable_transporter, release_order, LineProblem, ScheduledStage, StageSchedule, Transporter,
};
use crate::physics::PhysicsCalculator;

/// Builds a CP model from a line problem.
///
/// # Example
/// ```no_run
/// use hoist_line::cp::{ScheduleCpBuilder, SolverConfig, TimetableSolver};
/// use hoist_line::models::LineProblem;
///
/// let problem = LineProblem::from_json_str(
///     r#"{"stations": [], "programs": [], "batches": [], "transporters": []}"#,
/// )
/// .unwrap();
/// let builder = ScheduleCpBuilder::new(&problem);
/// let (schedule, solution) = builder
///     .solve(&TimetableSolver::new(), &SolverConfig::default(), true)
///     .unwrap();
/// ```
pub struct ScheduleCpBuilder<'a> {
    problem: &'a LineProblem,
    physics: PhysicsCalculator,
}

impl<'a> ScheduleCpBuilder<'a> {
    pub fn new(problem: &'a LineProblem) -> Self {
        Self {
            problem,
            physics: PhysicsCalculator::default(),
        }
    }

    pub fn with_physics(mut self, physics: PhysicsCalculator) -> Self {
        self.physics = physics;
        self
    }

    /// Transfer duration and hoist for a station pair.
    ///
    /// The hoist is the first transporter covering the pair. Its
    /// externally supplied transfer time wins over the physics estimate.
    /// Without a capable hoist the estimate uses the first transporter and
    /// the pair carries no hoist resource.
    pub fn transfer(&self, from: u32, to: u32) -> Transfer {
        let transporters = &self.problem.transporters;
        let hoist = capable_transporter(transporters, from, to);

        let seconds = match hoist.and_then(|t| self.problem.transfer_table.transfer(t.id, from, to)) {
            Some(s) => s,
            None => match (
                self.problem.station(from),
                self.problem.station(to),
                hoist.or(transporters.first()),
            ) {
                (Some(a), Some(b), Some(t)) => self.physics.transfer_estimate(a, b, t),
                _ => 0.0,
            },
        };

        Transfer {
            duration: (seconds.ceil() as i64).max(1),
            hoist: hoist.map(|t| t.id),
        }
    }

    /// Empty travel of `transporter` between two stations, whole seconds.
    ///
    /// A positive measured move wins over the physics estimate. Rounded up
    /// so a hoist scheduled this far apart always arrives in time.
    pub fn empty_move(&self, transporter: &Transporter, from: u32, to: u32) -> i64 {
        if from == to {
            return 0;
        }
        let seconds = match self.problem.transfer_table.movement(transporter.id, from, to) {
            Some(s) => s,
            None => match (self.problem.station(from), self.problem.station(to)) {
                (Some(a), Some(b)) => self.physics.travel_time(a, b, transporter),
                _ => self.physics.fallback_duration(),
            },
        };
        seconds.ceil().max(0.0) as i64
    }

    /// Builds the model.
    ///
    /// Creates:
    /// - An `IntervalVar` per (batch, stage), stage 0 at the release station
    /// - A `Chain` per batch, in release order
    /// - `StationNoOverlap`, and `HoistNoOverlap` when the line has hoists
    /// - Hoist homes and empty moves between every pair of stations a
    ///   hoist reaches
    /// - `OrderedStarts` on the first treated stage when `preserve_order`
    ///
    /// Fails with [`LineError::EmptyStationRange`] for a stage without a
    /// permitted station.
    pub fn build(&self, preserve_order: bool) -> Result<CpModel> {
        let problem = self.problem;
        let order = release_order(&problem.batches);

        // candidate stations per batch, stage 0 first
        let mut candidates: Vec<Vec<Vec<u32>>> = Vec::with_capacity(order.len());
        for &bi in &order {
            let batch = &problem.batches[bi];
            let mut per_stage = vec![vec![batch.release_station]];
            for spec in problem.stages_of(batch) {
                let c = spec.candidates(&problem.stations);
                if c.is_empty() {
                    return Err(LineError::EmptyStationRange {
                        batch: batch.id,
                        stage: spec.stage,
                    });
                }
                per_stage.push(c);
            }
            candidates.push(per_stage);
        }

        let name = if preserve_order { "preserve-order" } else { "free-order" };
        let mut model = CpModel::new(name, 0);

        let mut worst_transfers: Vec<Vec<i64>> = Vec::with_capacity(order.len());
        for per_stage in &candidates {
            let mut worst = Vec::with_capacity(per_stage.len());
            for pair in per_stage.windows(2) {
                let mut w = 0;
                for &a in &pair[0] {
                    for &b in &pair[1] {
                        let t = if model.has_transfer(a, b) {
                            model.transfer(a, b)
                        } else {
                            let t = self.transfer(a, b);
                            model.set_transfer(a, b, t);
                            t
                        };
                        w = w.max(t.duration);
                    }
                }
                worst.push(w);
            }
            worst_transfers.push(worst);
        }

        let mut stations: BTreeSet<u32> = candidates.iter().flatten().flatten().copied().collect();
        stations.extend(problem.transporters.iter().map(|t| t.start_station));
        for t in &problem.transporters {
            model.add_hoist(t.id, t.start_station);
            let reachable: Vec<u32> = stations
                .iter()
                .copied()
                .filter(|&s| s == t.start_station || t.reaches(s))
                .collect();
            for &a in &reachable {
                for &b in &reachable {
                    if a != b {
                        model.set_empty_move(t.id, a, b, self.empty_move(t, a, b));
                    }
                }
            }
        }
        let max_move = model.max_empty_move();

        // serial execution of every batch fits inside the horizon
        let latest_release = order
            .iter()
            .map(|&bi| problem.batches[bi].release_time)
            .max()
            .unwrap_or(0);
        let mut horizon = latest_release.max(0).saturating_add(max_move);
        for (k, &bi) in order.iter().enumerate() {
            let specs = problem.stages_of(&problem.batches[bi]);
            for (spec, transfer) in specs.iter().zip(&worst_transfers[k]) {
                horizon = horizon
                    .saturating_add(spec.max_time.max(spec.min_time))
                    .saturating_add(*transfer)
                    .saturating_add(max_move);
            }
        }
        model.horizon = horizon;

        for (k, &bi) in order.iter().enumerate() {
            let batch = &problem.batches[bi];
            let mut per_stage = candidates[k].iter();
            let mut chain = Vec::with_capacity(candidates[k].len());

            if let Some(release) = per_stage.next() {
                chain.push(model.add_interval(IntervalVar::new(
                    batch.id,
                    0,
                    batch.release_time,
                    0,
                    horizon,
                    release.clone(),
                )));
            }
            for (spec, stations) in problem.stages_of(batch).iter().zip(per_stage) {
                chain.push(model.add_interval(IntervalVar::new(
                    batch.id,
                    spec.stage,
                    0,
                    spec.min_time,
                    spec.max_time,
                    stations.clone(),
                )));
            }
            model.add_job(batch.id, chain);
        }

        model.add_constraint(CpConstraint::StationNoOverlap);
        if !problem.transporters.is_empty() {
            model.add_constraint(CpConstraint::HoistNoOverlap);
        }
        if preserve_order {
            model.add_constraint(CpConstraint::OrderedStarts {
                jobs: (0..model.jobs().len()).collect(),
                position: 1,
            });
        }
        model.set_objective(Objective::MinimizeMakespan);

        debug!(
            model = %model.name,
            intervals = model.interval_count(),
            constraints = model.constraint_count(),
            horizon,
            "built stage model"
        );
        Ok(model)
    }

    /// Builds and solves the model.
    ///
    /// Fails with [`LineError::Infeasible`] when the solver finds no
    /// assignment.
    pub fn solve<S: CpSolver>(
        &self,
        solver: &S,
        config: &SolverConfig,
        preserve_order: bool,
    ) -> Result<(StageSchedule, CpSolution)> {
        let model = self.build(preserve_order)?;
        let solution = solver.solve(&model, config);
        debug!(
            solver = solver.name(),
            status = ?solution.status,
            objective = ?solution.objective,
            lower_bound = solution.lower_bound,
            iterations = solution.iterations,
            "solve finished"
        );

        if !solution.is_solution_found() {
            return Err(LineError::Infeasible {
                lower_bound: Some(solution.lower_bound),
            });
        }
        let schedule = Self::decode_solution(&model, &solution);
        Ok((schedule, solution))
    }

    /// Decodes a CP solution into a stage schedule.
    pub fn decode_solution(model: &CpModel, solution: &CpSolution) -> StageSchedule {
        let mut schedule = StageSchedule::new();
        for iv in model.intervals() {
            if let Some(s) = solution.intervals.get(&iv.id) {
                schedule.add_stage(ScheduledStage::new(iv.batch_id, iv.stage, s.station, s.start, s.end));
            }
        }
        schedule.normalize();
        schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Batch, StageSpec, Station, TransferTable, Transporter, TreatmentProgram};

    /// Load 101, tank 20, unload 102; every transfer takes 10 s.
    fn shared_tank_problem() -> LineProblem {
        let stations = vec![
            Station::new(20, 1000.0),
            Station::new(101, 0.0),
            Station::new(102, 2000.0),
        ];
        let table = TransferTable::new()
            .with_transfer(1, 101, 20, 10.0)
            .with_transfer(1, 20, 102, 10.0);
        LineProblem::new(stations, vec![Transporter::new(1, 20, 102)])
            .with_program(
                TreatmentProgram::new(1)
                    .with_stage(StageSpec::new(1, 20, 100))
                    .with_stage(StageSpec::new(2, 102, 10)),
            )
            .with_batch(Batch::new(1, 1, 101))
            .with_batch(Batch::new(2, 1, 101))
            .with_transfer_table(table)
    }

    #[test]
    fn test_build_model() {
        let problem = shared_tank_problem();
        let model = ScheduleCpBuilder::new(&problem).build(false).unwrap();

        // 2 batches x (release + 2 stages)
        assert_eq!(model.interval_count(), 6);
        assert_eq!(model.jobs().len(), 2);
        assert!(model.stations_exclusive());
        assert!(model.hoists_exclusive());
        assert!(model.ordered_starts().is_none());
        assert_eq!(model.transfer(101, 20), Transfer { duration: 10, hoist: Some(1) });
        assert_eq!(model.interval(0).id, "B1_S0");
        assert_eq!(model.interval(0).candidates, vec![101]);
    }

    #[test]
    fn test_build_preserve_order() {
        let problem = shared_tank_problem();
        let model = ScheduleCpBuilder::new(&problem).build(true).unwrap();
        let (jobs, position) = model.ordered_starts().unwrap();
        assert_eq!(jobs, &[0, 1]);
        assert_eq!(position, 1);
    }

    #[test]
    fn test_horizon_covers_serial_execution() {
        let problem = shared_tank_problem();
        let model = ScheduleCpBuilder::new(&problem).build(false).unwrap();
        // longest empty move is 101 <-> 102: 6 s
        // 6 + 2 x (100 + 10 + 6 + 10 + 10 + 6)
        assert_eq!(model.horizon, 290);
    }

    #[test]
    fn test_empty_moves_registered() {
        let problem = shared_tank_problem();
        let model = ScheduleCpBuilder::new(&problem).build(false).unwrap();
        assert_eq!(model.hoist_home(1), Some(20));
        // 1000 mm at 500 mm/s with 2 s ramps: triangular, 4 s
        assert_eq!(model.empty_move(1, 101, 20), 4);
        assert_eq!(model.empty_move(1, 102, 101), 6);
        assert_eq!(model.empty_move(1, 20, 20), 0);
    }

    #[test]
    fn test_measured_empty_move_wins() {
        let mut problem = shared_tank_problem();
        problem.transfer_table.set_move(1, 102, 101, 20.5);
        let builder = ScheduleCpBuilder::new(&problem);
        let hoist = &problem.transporters[0];
        assert_eq!(builder.empty_move(hoist, 102, 101), 21);
        assert_eq!(builder.empty_move(hoist, 101, 102), 6);
    }

    #[test]
    fn test_empty_station_range() {
        let problem = shared_tank_problem().with_program(
            TreatmentProgram::new(2).with_stage(StageSpec::new(1, 20, 60).with_group(99)),
        );
        let problem = problem.with_batch(Batch::new(3, 2, 101));
        let err = ScheduleCpBuilder::new(&problem).build(true).unwrap_err();
        assert!(matches!(err, LineError::EmptyStationRange { batch: 3, stage: 1 }));
    }

    #[test]
    fn test_physics_transfer_without_table() {
        let mut problem = shared_tank_problem();
        problem.transfer_table = TransferTable::new();
        let builder = ScheduleCpBuilder::new(&problem);
        let t = builder.transfer(101, 20);
        assert_eq!(t.hoist, Some(1));
        let (a, b) = (problem.station(101).unwrap(), problem.station(20).unwrap());
        let expected = PhysicsCalculator::default().transfer_estimate(a, b, &problem.transporters[0]);
        assert_eq!(t.duration, expected.ceil() as i64);
    }

    #[test]
    fn test_uncovered_pair_has_no_hoist() {
        let problem = shared_tank_problem();
        // hoist 1 serves stations 20..=102 only
        let t = ScheduleCpBuilder::new(&problem).transfer(20, 500);
        assert_eq!(t.hoist, None);
        assert!(t.duration >= 1);
    }

    #[test]
    fn test_solve_serializes_shared_tank() {
        let problem = shared_tank_problem();
        let builder = ScheduleCpBuilder::new(&problem);
        let config = SolverConfig::default().with_max_iterations(20);

        let (schedule, solution) = builder.solve(&TimetableSolver::new(), &config, true).unwrap();
        assert!(solution.is_solution_found());

        let a = schedule.stage(1, 1).unwrap();
        let b = schedule.stage(2, 1).unwrap();
        assert_eq!(a.station, 20);
        assert!(!a.overlaps(b));
        assert_eq!(schedule.stage_count(), 6);
        assert_eq!(solution.objective, Some(schedule.makespan()));
    }
}
