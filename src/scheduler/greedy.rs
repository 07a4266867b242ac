//! Order / stretch / resolve greedy scheduler.
//!
//! # Algorithm
//!
//! 1. Order batches: release order when the order is preserved, otherwise
//!    by (release time, total minimum dwell).
//! 2. For each batch, walk its stages. For every stage pick the candidate
//!    station whose transfer can start earliest, given when the station
//!    and the hoist become available.
//! 3. Stretch: the previous stage's dwell is extended until that transfer
//!    can start.
//! 4. Resolve: if a stretch exceeds the stage's maximum dwell, the batch
//!    release is postponed by the excess and the batch is re-planned.
//!
//! # Complexity
//! O(n * m * c) per placement attempt where n=batches, m=stages/batch,
//! c=candidate stations.
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{ScheduleOutcome, SchedulingStrategy};
use crate::cp::{CpModel, HoistTrack, ScheduleCpBuilder, SolverStatus, Transfer, Trip};
use crate::error::{LineError, Result};
use crate::models::{release_order, Batch, LineProblem, ScheduledStage, StageSchedule};
use crate::physics::PhysicsCalculator;

/// Placement attempts per batch before giving up.
const MAX_POSTPONES: usize = 10_000;

/// Greedy order / stretch / resolve scheduler.
///
/// # Example
///
/// ```
/// use hoist_line::models::{Batch, LineProblem, StageSpec, Station, Transporter, TreatmentProgram};
/// use hoist_line::scheduler::{GreedyStrategy, SchedulingStrategy};
///
/// let problem = LineProblem::new(
///     vec![Station::new(101, 0.0), Station::new(102, 1000.0)],
///     vec![Transporter::new(1, 101, 102)],
/// )
/// .with_program(TreatmentProgram::new(1).with_stage(StageSpec::new(1, 102, 60)))
/// .with_batch(Batch::new(1, 1, 101));
///
/// let outcome = GreedyStrategy::new().solve(&problem, true).unwrap();
/// assert_eq!(outcome.schedule.stage_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GreedyStrategy {
    physics: PhysicsCalculator,
}

/// Resource availability while placing batches.
///
/// Stations are tracked by the end of their last use. Hoists keep every
/// loaded trip so short transfers can fill earlier gaps, as long as the
/// empty moves around them still fit.
#[derive(Debug)]
struct LineState {
    station_available: HashMap<u32, i64>,
    hoists: HashMap<u32, HoistTrack>,
}

impl LineState {
    fn new(model: &CpModel) -> Self {
        Self {
            station_available: HashMap::new(),
            hoists: model.hoists().map(|(h, home)| (h, HoistTrack::new(home))).collect(),
        }
    }

    fn station(&self, id: u32) -> i64 {
        self.station_available.get(&id).copied().unwrap_or(i64::MIN)
    }

    /// Earliest lift at or after `earliest` for a transfer `from` → `to`.
    ///
    /// `pending` holds the loaded trips already planned for the batch.
    fn hoist_slot(
        &self,
        model: &CpModel,
        transfer: Transfer,
        earliest: i64,
        (from, to): (u32, u32),
        pending: &[(u32, Trip)],
    ) -> i64 {
        let Some((h, track)) = transfer.hoist.and_then(|h| self.hoists.get(&h).map(|t| (h, t))) else {
            return earliest;
        };
        let own: Vec<Trip> = pending.iter().filter(|(p, _)| *p == h).map(|(_, t)| *t).collect();
        track.earliest(earliest, transfer.duration, from, to, &own, |a, b| model.empty_move(h, a, b))
    }
}

/// One planned stage before commit.
struct Planned {
    stage: u32,
    station: u32,
    start: i64,
    end: i64,
    transfer_out: Option<Transfer>,
}

/// Loaded trips of a plan, tagged with their hoist.
fn planned_trips(plan: &[Planned]) -> Vec<(u32, Trip)> {
    plan.windows(2)
        .filter_map(|w| {
            let h = w[0].transfer_out?.hoist?;
            Some((
                h,
                Trip {
                    start: w[0].end,
                    end: w[1].start,
                    from: w[0].station,
                    to: w[1].station,
                },
            ))
        })
        .collect()
}

impl GreedyStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_physics(mut self, physics: PhysicsCalculator) -> Self {
        self.physics = physics;
        self
    }

    /// Batch indices in placement order.
    fn batch_order(problem: &LineProblem, preserve_order: bool) -> Vec<usize> {
        let mut order = release_order(&problem.batches);
        if !preserve_order {
            let min_work = |i: usize| -> i64 {
                problem
                    .stages_of(&problem.batches[i])
                    .iter()
                    .map(|s| s.min_time)
                    .sum()
            };
            order.sort_by_key(|&i| (problem.batches[i].release_time, min_work(i)));
        }
        order
    }

    /// Plans one batch released no earlier than `release`.
    ///
    /// Returns the plan, or the postponement needed when a stretch would
    /// exceed a maximum dwell.
    fn plan(
        &self,
        model: &CpModel,
        problem: &LineProblem,
        batch: &Batch,
        release: i64,
        first_start_bound: Option<i64>,
        state: &LineState,
    ) -> std::result::Result<Vec<Planned>, i64> {
        let start = release.max(state.station(batch.release_station));
        let mut plan = vec![Planned {
            stage: 0,
            station: batch.release_station,
            start,
            end: start,
            transfer_out: None,
        }];
        let mut prev_bounds = (0, i64::MAX);

        for (pos, spec) in problem.stages_of(batch).iter().enumerate() {
            let candidates = spec.candidates(&problem.stations);
            let pending = planned_trips(&plan);
            let Some(prev) = plan.last_mut() else {
                break;
            };
            let earliest_end = prev.start.saturating_add(prev_bounds.0);
            let bound = if pos == 0 { first_start_bound } else { None };

            let mut best: Option<(i64, u32, Transfer)> = None;
            for q in candidates {
                let transfer = model.transfer(prev.station, q);
                let mut lift = earliest_end.max(state.station(q).saturating_sub(transfer.duration));
                if let Some(b) = bound {
                    lift = lift.max(b - transfer.duration);
                }
                let lift = state.hoist_slot(model, transfer, lift, (prev.station, q), &pending);
                if best.is_none_or(|(l, _, _)| lift < l) {
                    best = Some((lift, q, transfer));
                }
            }
            let Some((lift, station, transfer)) = best else {
                break;
            };

            let stretch = lift - prev.start;
            if stretch > prev_bounds.1 {
                return Err(stretch - prev_bounds.1);
            }
            prev.end = lift;
            prev.transfer_out = Some(transfer);

            let next_start = lift + transfer.duration;
            plan.push(Planned {
                stage: spec.stage,
                station,
                start: next_start,
                end: next_start + spec.min_time,
                transfer_out: None,
            });
            prev_bounds = (spec.min_time, spec.max_time);
        }
        Ok(plan)
    }

    fn commit(state: &mut LineState, plan: &[Planned], batch_id: u32, schedule: &mut StageSchedule) {
        for p in plan {
            schedule.add_stage(ScheduledStage::new(batch_id, p.stage, p.station, p.start, p.end));
            let available = state.station_available.entry(p.station).or_insert(i64::MIN);
            *available = (*available).max(p.end);
        }
        for (h, trip) in planned_trips(plan) {
            state
                .hoists
                .entry(h)
                .or_insert_with(|| HoistTrack::new(trip.from))
                .reserve(trip);
        }
    }
}

impl SchedulingStrategy for GreedyStrategy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn solve(&self, problem: &LineProblem, preserve_order: bool) -> Result<ScheduleOutcome> {
        let builder = ScheduleCpBuilder::new(problem).with_physics(self.physics.clone());
        // also rejects empty station ranges
        let model = builder.build(preserve_order)?;
        let lower_bound = model.lower_bound();

        let mut state = LineState::new(&model);
        let mut schedule = StageSchedule::new();
        let mut first_start_bound = None;

        for bi in Self::batch_order(problem, preserve_order) {
            let batch = &problem.batches[bi];
            let mut release = batch.release_time;
            let mut attempts = 0;

            let plan = loop {
                match self.plan(&model, problem, batch, release, first_start_bound, &state) {
                    Ok(plan) => break plan,
                    Err(delay) => {
                        attempts += 1;
                        if attempts >= MAX_POSTPONES {
                            warn!(batch = batch.id, "greedy placement gave up");
                            return Err(LineError::Infeasible {
                                lower_bound: Some(lower_bound),
                            });
                        }
                        release += delay.max(1);
                    }
                }
            };
            if attempts > 0 {
                debug!(batch = batch.id, attempts, release, "batch postponed");
            }

            if preserve_order {
                first_start_bound = plan.get(1).map(|p| p.start).or(first_start_bound);
            }
            Self::commit(&mut state, &plan, batch.id, &mut schedule);
        }

        schedule.normalize();
        let makespan = schedule.makespan();
        let status = if makespan <= lower_bound {
            SolverStatus::Optimal
        } else {
            SolverStatus::Feasible
        };
        Ok(ScheduleOutcome::new(schedule, preserve_order, status, Some(lower_bound), self.name()))
    }
}
