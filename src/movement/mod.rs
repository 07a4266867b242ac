//! Hoist movement generation.
//!
//! Turns an accepted stage schedule into per-transporter phase timelines
//! and makes them collision-free.
//!
//! # Pipeline
//!
//! 1. [`MovementSynthesizer`]: one five-phase task per stage transition,
//!    chained per transporter in lift-time order.
//! 2. [`AvoidanceResolver`]: long idles inside a zone shared by two
//!    transporters become an avoidance move plus a shorter idle, then
//!    every timeline is re-sorted and clamped.
//!
//! Avoidance is pairwise. A station range shared by three or more
//! transporters at once is handled pair by pair without a joint decision.
//!
//! # Reference
//! - Manier & Bloch (2003), "A classification for hoist scheduling problems"
//! - Leung & Zhang (2003), "Optimal cyclic scheduling for printed circuit
//!   board production lines with multiple hoists"

mod avoidance;
mod synthesis;

pub use avoidance::{AvoidanceResolver, SharedZone};
pub use synthesis::{MovementSynthesizer, StartPositions, TransporterCursor};
