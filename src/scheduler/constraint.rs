//! Constraint-model strategy.

use tracing::debug;

use super::{ScheduleOutcome, SchedulingStrategy};
use crate::config::SchedulerConfig;
use crate::cp::{CancelToken, CpSolver, ScheduleCpBuilder, SolverConfig, TimetableSolver};
use crate::error::Result;
use crate::models::LineProblem;
use crate::physics::PhysicsCalculator;

/// Builds the CP model for each variant and hands it to a solver backend.
#[derive(Debug, Clone)]
pub struct ConstraintStrategy<S = TimetableSolver> {
    solver: S,
    solver_config: SolverConfig,
    physics: PhysicsCalculator,
}

impl ConstraintStrategy<TimetableSolver> {
    pub fn new() -> Self {
        Self::with_solver(TimetableSolver::new())
    }

    /// Timetable backend with the configured budget and seed.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new().with_solver_config(
            SolverConfig::default()
                .with_time_limit(config.time_limit())
                .with_max_iterations(config.max_iterations)
                .with_seed(config.seed),
        )
    }
}

impl Default for ConstraintStrategy<TimetableSolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CpSolver> ConstraintStrategy<S> {
    /// Uses a different solver backend.
    pub fn with_solver(solver: S) -> Self {
        Self {
            solver,
            solver_config: SolverConfig::default(),
            physics: PhysicsCalculator::default(),
        }
    }

    pub fn with_solver_config(mut self, config: SolverConfig) -> Self {
        self.solver_config = config;
        self
    }

    pub fn with_physics(mut self, physics: PhysicsCalculator) -> Self {
        self.physics = physics;
        self
    }

    /// Token that aborts every solve started by this strategy.
    pub fn cancel_token(&self) -> CancelToken {
        self.solver_config.cancel.clone()
    }
}

impl<S: CpSolver> SchedulingStrategy for ConstraintStrategy<S> {
    fn name(&self) -> &'static str {
        "constraint"
    }

    fn solve(&self, problem: &LineProblem, preserve_order: bool) -> Result<ScheduleOutcome> {
        let builder = ScheduleCpBuilder::new(problem).with_physics(self.physics.clone());
        let (schedule, solution) = builder.solve(&self.solver, &self.solver_config, preserve_order)?;
        debug!(
            preserve_order,
            solver = self.solver.name(),
            makespan = schedule.makespan(),
            elapsed_ms = solution.elapsed.as_millis() as u64,
            "constraint variant solved"
        );
        Ok(ScheduleOutcome::new(
            schedule,
            preserve_order,
            solution.status,
            Some(solution.lower_bound),
            self.name(),
        ))
    }
}
