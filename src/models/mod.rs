//! Hoist line domain models.
//!
//! Provides the data types describing a treatment line (stations,
//! programs, batches, transporters) and the two outputs of the pipeline
//! (stage schedule, movement log).
//!
//! # Domain Mappings
//!
//! | hoist-line | Job-shop term |
//! |------------|---------------|
//! | Batch | Job |
//! | StageSpec | Operation |
//! | Station | Machine |
//! | Transporter | Transport resource |
//! | StageSchedule | Schedule |

mod batch;
mod line;
mod movement;
mod program;
mod schedule;
mod station;
mod transfer;
mod transporter;

pub use batch::{release_order, Batch};
pub use line::LineProblem;
pub use movement::{Movement, MovementLog, MovementRow, Phase, TransportTask};
pub use program::{StageSpec, TreatmentProgram};
pub use schedule::{ScheduledStage, StageSchedule, Violation, ViolationType};
pub use station::{Station, StationKind};
pub use transfer::{TransferEntry, TransferTable};
pub use transporter::{
    capable_transporter, HorizontalProfile, OperatingRange, Transporter, VerticalProfile,
};
