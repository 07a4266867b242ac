//! Scheduling and hoist movement planning for surface-treatment lines.
//!
//! Batches travel through a line of treatment stations following a
//! program of stages. Overhead transporters (hoists) lift them out of
//! one station and sink them into the next. This crate decides when each
//! batch enters each station and what every hoist does second by second.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Station`, `TreatmentProgram`, `Batch`,
//!   `Transporter`, `TransferTable`, `StageSchedule`, `MovementLog`
//! - **`physics`**: Travel, lift and sink durations from motion profiles
//! - **`cp`**: Interval constraint model of the stage problem and its solver
//! - **`scheduler`**: Ordered / free-order variants, selection, KPIs
//! - **`movement`**: Five-phase movement synthesis and shared-zone avoidance
//! - **`validation`**: Input integrity checks and result verification
//! - **`pipeline`**: The end-to-end run
//!
//! # Example
//! ```no_run
//! use hoist_line::config::PipelineConfig;
//! use hoist_line::models::LineProblem;
//!
//! hoist_line::logging::init();
//! let problem = LineProblem::from_json_str(r#"{"stations": [], "programs": [], "batches": [], "transporters": []}"#)?;
//! let output = hoist_line::pipeline::run(&problem, &PipelineConfig::default())?;
//! assert_eq!(output.outcome.makespan, 0);
//! # Ok::<(), hoist_line::LineError>(())
//! ```
//!
//! # References
//!
//! - Manier & Bloch (2003), "A classification for hoist scheduling problems"
//! - Phillips & Unger (1976), "Mathematical programming solution of a hoist
//!   scheduling program"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"

pub mod config;
pub mod cp;
pub mod error;
pub mod logging;
pub mod models;
pub mod movement;
pub mod physics;
pub mod pipeline;
pub mod scheduler;
pub mod validation;

pub use error::{LineError, Result};
