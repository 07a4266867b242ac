//! Stage schedulers and KPI evaluation.
//!
//! A [`SchedulingStrategy`] produces a stage schedule for one variant:
//! batch order preserved or free. [`StageScheduler`] runs both variants
//! and keeps the better one.
//!
//! # Strategies
//!
//! - `ConstraintStrategy`: CP model solved by a [`CpSolver`](crate::cp::CpSolver).
//! - `GreedyStrategy`: order / stretch / resolve heuristic. Fast, not optimal.
//!
//! # Policy
//!
//! Both variants run on scoped threads. The smaller makespan wins; ties
//! go to the order-preserving schedule. If neither variant is feasible the
//! result is [`LineError::Infeasible`] with the best lower bound seen.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3-4
//! - Manier & Bloch (2003), "A classification for hoist scheduling problems"

mod constraint;
mod greedy;
mod kpi;

pub use constraint::ConstraintStrategy;
pub use greedy::GreedyStrategy;
pub use kpi::ScheduleKpi;

use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{PipelineConfig, StrategyKind};
use crate::cp::SolverStatus;
use crate::error::{LineError, Result};
use crate::models::{LineProblem, StageSchedule};
use crate::physics::PhysicsCalculator;

/// One solved scheduling variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    pub schedule: StageSchedule,
    /// Whether the supplied batch order was enforced.
    pub preserve_order: bool,
    pub makespan: i64,
    pub status: SolverStatus,
    pub lower_bound: Option<i64>,
    /// Name of the strategy that produced the schedule.
    pub strategy: String,
}

impl ScheduleOutcome {
    pub fn new(
        schedule: StageSchedule,
        preserve_order: bool,
        status: SolverStatus,
        lower_bound: Option<i64>,
        strategy: &str,
    ) -> Self {
        Self {
            makespan: schedule.makespan(),
            schedule,
            preserve_order,
            status,
            lower_bound,
            strategy: strategy.to_string(),
        }
    }
}

/// Produces a stage schedule for one ordering variant.
pub trait SchedulingStrategy: Send + Sync {
    /// Strategy name for logs and outcomes.
    fn name(&self) -> &'static str;

    /// Schedules every batch of `problem`.
    ///
    /// With `preserve_order`, batches start their first treated stage in
    /// release order (rank, then input position).
    fn solve(&self, problem: &LineProblem, preserve_order: bool) -> Result<ScheduleOutcome>;
}

/// Runs both ordering variants and keeps the better schedule.
pub struct StageScheduler {
    strategy: Box<dyn SchedulingStrategy>,
}

impl StageScheduler {
    pub fn new(strategy: Box<dyn SchedulingStrategy>) -> Self {
        Self { strategy }
    }

    /// Creates the scheduler selected by `config.scheduler.strategy`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let physics = PhysicsCalculator::new(config.physics.clone());
        let strategy: Box<dyn SchedulingStrategy> = match config.scheduler.strategy {
            StrategyKind::Constraint => {
                Box::new(ConstraintStrategy::from_config(&config.scheduler).with_physics(physics))
            }
            StrategyKind::Greedy => Box::new(GreedyStrategy::new().with_physics(physics)),
        };
        Self::new(strategy)
    }

    /// Solves both variants and returns the lower-makespan one.
    pub fn schedule(&self, problem: &LineProblem) -> Result<ScheduleOutcome> {
        let strategy = self.strategy.as_ref();
        let (ordered, free) = thread::scope(|s| {
            let worker = s.spawn(|| strategy.solve(problem, false));
            let ordered = strategy.solve(problem, true);
            let free = worker
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (ordered, free)
        });

        for variant in [&ordered, &free] {
            if let Err(e) = variant {
                debug!(strategy = strategy.name(), error = %e, "variant failed");
            }
        }

        let chosen = select(ordered, free)?;
        info!(
            strategy = strategy.name(),
            preserve_order = chosen.preserve_order,
            makespan = chosen.makespan,
            status = ?chosen.status,
            "accepted schedule"
        );
        Ok(chosen)
    }
}

/// Picks the winning variant. Errors other than infeasibility are
/// configuration problems shared by both variants and are returned as is.
fn select(ordered: Result<ScheduleOutcome>, free: Result<ScheduleOutcome>) -> Result<ScheduleOutcome> {
    match (ordered, free) {
        (Ok(a), Ok(b)) => Ok(if b.makespan < a.makespan { b } else { a }),
        (Ok(found), Err(e)) | (Err(e), Ok(found)) => {
            if matches!(e, LineError::Infeasible { .. }) {
                Ok(found)
            } else {
                Err(e)
            }
        }
        (
            Err(LineError::Infeasible { lower_bound: a }),
            Err(LineError::Infeasible { lower_bound: b }),
        ) => Err(LineError::Infeasible {
            lower_bound: a.max(b),
        }),
        (Err(e), Err(LineError::Infeasible { .. })) => Err(e),
        (_, Err(e)) => Err(e),
    }
}
