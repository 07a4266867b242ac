//! End-to-end run: validate, schedule, synthesize, avoid.
//!
//! # Example
//! ```no_run
//! use hoist_line::config::PipelineConfig;
//! use hoist_line::models::LineProblem;
//!
//! let problem = LineProblem::from_json_str(&std::fs::read_to_string("line.json")?)?;
//! let output = hoist_line::pipeline::run(&problem, &PipelineConfig::default())?;
//! println!("makespan {}", output.outcome.makespan);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{LineError, Result};
use crate::models::{LineProblem, MovementLog};
use crate::movement::{AvoidanceResolver, MovementSynthesizer, StartPositions};
use crate::physics::PhysicsCalculator;
use crate::scheduler::{ScheduleKpi, ScheduleOutcome, StageScheduler};
use crate::validation::{check_schedule, validate_input};

/// Everything a run produces.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub outcome: ScheduleOutcome,
    /// Collision-resolved movements per transporter.
    pub movements: MovementLog,
    pub kpi: ScheduleKpi,
}

/// Runs the full pipeline on `problem`.
///
/// Errors abort the run without partial output. A schedule that fails
/// [`check_schedule`] is rejected as [`LineError::InvalidSchedule`].
pub fn run(problem: &LineProblem, config: &PipelineConfig) -> Result<PipelineOutput> {
    validate_input(problem).map_err(LineError::InvalidInput)?;
    info!(
        stations = problem.stations.len(),
        batches = problem.batches.len(),
        transporters = problem.transporters.len(),
        "input validated"
    );

    let outcome = StageScheduler::from_config(config).schedule(problem)?;

    let violations = check_schedule(&outcome.schedule, problem);
    if !violations.is_empty() {
        for v in &violations {
            warn!(entity = v.entity_id, kind = ?v.violation_type, "{}", v.message);
        }
        return Err(LineError::InvalidSchedule(violations));
    }

    let physics = PhysicsCalculator::new(config.physics.clone());
    let starts = StartPositions::from_transporters(&problem.transporters);
    let raw = MovementSynthesizer::new(problem)
        .with_physics(physics.clone())
        .synthesize(&outcome.schedule, &starts)?;

    let movements = AvoidanceResolver::new(problem, config.avoidance.clone())
        .with_physics(physics)
        .resolve(raw);

    let kpi = ScheduleKpi::calculate(&outcome.schedule, problem);
    info!(
        makespan = outcome.makespan,
        movements = movements.len(),
        utilization = kpi.avg_utilization,
        "pipeline finished"
    );

    Ok(PipelineOutput {
        outcome,
        movements,
        kpi,
    })
}
