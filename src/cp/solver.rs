//! Solver interface.
//!
//! A [`CpSolver`] takes a [`CpModel`] and a wall-clock budget and returns
//! the best assignment it found, or an infeasibility signal with a lower
//! bound. Backends are interchangeable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::CpModel;

/// Shared abort flag observed by running solvers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Solver budget and search settings.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub time_limit: Duration,
    pub max_iterations: usize,
    pub seed: u64,
    pub cancel: CancelToken,
}

impl SolverConfig {
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(10),
            max_iterations: 2_000,
            seed: 42,
            cancel: CancelToken::new(),
        }
    }
}

/// Outcome class of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverStatus {
    /// Objective equals the lower bound.
    Optimal,
    /// A feasible assignment without optimality proof.
    Feasible,
    /// No feasible assignment.
    Infeasible,
    /// Aborted before any assignment was found.
    Cancelled,
}

/// Assigned values of one interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalSolution {
    pub station: u32,
    pub start: i64,
    pub end: i64,
}

/// Solver result.
#[derive(Debug, Clone)]
pub struct CpSolution {
    pub status: SolverStatus,
    /// Interval id → assigned values.
    pub intervals: HashMap<String, IntervalSolution>,
    /// Makespan of the assignment.
    pub objective: Option<i64>,
    pub lower_bound: i64,
    /// Search iterations performed.
    pub iterations: usize,
    pub elapsed: Duration,
}

impl CpSolution {
    /// A result carrying no assignment.
    pub fn without_solution(status: SolverStatus, lower_bound: i64) -> Self {
        Self {
            status,
            intervals: HashMap::new(),
            objective: None,
            lower_bound,
            iterations: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_solution_found(&self) -> bool {
        matches!(self.status, SolverStatus::Optimal | SolverStatus::Feasible)
    }
}

/// A scheduling model solver backend.
pub trait CpSolver: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Solves the model within `config.time_limit`.
    fn solve(&self, model: &CpModel, config: &SolverConfig) -> CpSolution;
}
