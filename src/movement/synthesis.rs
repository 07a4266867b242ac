//! Movement synthesis.
//!
//! Every consecutive stage pair of a batch (release stage included) is
//! one transport task. A task runs on the first transporter whose lift
//! range covers the source and whose sink range covers the destination,
//! and expands into five phases:
//!
//! | Phase | Span |
//! |-------|------|
//! | Idle | cursor end → approach start |
//! | MoveToLift | empty travel to the source, ends at the scheduled lift |
//! | Lift | lift duration at the source |
//! | MoveToSink | loaded travel source → destination |
//! | Sink | sink duration at the destination |
//!
//! A measured table transfer rescales Lift, MoveToSink and Sink to its
//! total.
//!
//! Tasks of one transporter are walked in lift-time order with a
//! [`TransporterCursor`]. After the last task the hoist returns to its
//! start station and idles until the latest end of all transporters.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{LineError, Result};
use crate::models::{
    capable_transporter, LineProblem, Movement, MovementLog, Phase, StageSchedule, TransportTask,
    Transporter,
};
use crate::physics::PhysicsCalculator;

/// Start station per transporter.
#[derive(Debug, Clone, Default)]
pub struct StartPositions {
    positions: HashMap<u32, u32>,
}

impl StartPositions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured start station of every transporter.
    pub fn from_transporters(transporters: &[Transporter]) -> Self {
        Self {
            positions: transporters.iter().map(|t| (t.id, t.start_station)).collect(),
        }
    }

    pub fn with_position(mut self, transporter_id: u32, station: u32) -> Self {
        self.positions.insert(transporter_id, station);
        self
    }

    pub fn get(&self, transporter_id: u32) -> Option<u32> {
        self.positions.get(&transporter_id).copied()
    }
}

/// Where a transporter is and when it becomes free.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransporterCursor {
    pub location: u32,
    pub last_end: f64,
}

impl TransporterCursor {
    pub fn new(location: u32) -> Self {
        Self {
            location,
            last_end: 0.0,
        }
    }
}

/// Expands a stage schedule into per-transporter movements.
pub struct MovementSynthesizer<'a> {
    problem: &'a LineProblem,
    physics: PhysicsCalculator,
}

impl<'a> MovementSynthesizer<'a> {
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

    /// Builds one transport task per stage transition.
    ///
    /// Fails with [`LineError::NoCapableTransporter`] when no transporter
    /// covers a transition.
    pub fn tasks(&self, schedule: &StageSchedule) -> Result<Vec<TransportTask>> {
        let mut tasks = Vec::new();
        for batch_id in schedule.batch_ids() {
            let rows = schedule.stages_for_batch(batch_id);
            for pair in rows.windows(2) {
                let (from, to) = (pair[0], pair[1]);
                let transporter =
                    capable_transporter(&self.problem.transporters, from.station, to.station)
                        .ok_or(LineError::NoCapableTransporter {
                            from: from.station,
                            to: to.station,
                        })?;
                let (lift, carry, sink) = self.loaded_phases(transporter, from.station, to.station);
                let lift_time = from.end as f64;
                let sink_time = lift_time + lift + carry + sink;
                if sink_time > to.start as f64 + 1e-6 {
                    warn!(
                        batch = batch_id,
                        stage = to.stage,
                        late_by = sink_time - to.start as f64,
                        "sink finishes after the scheduled stage start"
                    );
                }
                tasks.push(TransportTask {
                    batch_id,
                    transition: to.stage,
                    transporter_id: transporter.id,
                    from_station: from.station,
                    to_station: to.station,
                    lift_time,
                    sink_time,
                });
            }
        }
        Ok(tasks)
    }

    /// Synthesizes the raw movement log.
    pub fn synthesize(&self, schedule: &StageSchedule, starts: &StartPositions) -> Result<MovementLog> {
        let tasks = self.tasks(schedule)?;
        let mut log = MovementLog::new();
        let mut cursors = Vec::with_capacity(self.problem.transporters.len());

        for transporter in &self.problem.transporters {
            let home = starts.get(transporter.id).unwrap_or(transporter.start_station);
            let mut own: Vec<&TransportTask> = tasks
                .iter()
                .filter(|t| t.transporter_id == transporter.id)
                .collect();
            own.sort_by(|a, b| a.lift_time.total_cmp(&b.lift_time).then(a.batch_id.cmp(&b.batch_id)));

            let mut cursor = TransporterCursor::new(home);
            let mut movements = Vec::with_capacity(own.len() * 5 + 2);
            for task in &own {
                self.expand_task(transporter, task, &mut cursor, &mut movements);
            }
            if !own.is_empty() && cursor.location != home {
                let duration = self.approach_time(transporter, cursor.location, home);
                movements.push(
                    Movement::new(
                        transporter.id,
                        0,
                        Phase::MoveToLift,
                        cursor.last_end,
                        cursor.last_end + duration,
                        cursor.location,
                        home,
                    )
                    .with_description(format!("Return {} → {}", cursor.location, home)),
                );
                cursor.location = home;
                cursor.last_end += duration;
            }
            debug!(
                transporter = transporter.id,
                tasks = own.len(),
                end = cursor.last_end,
                "transporter timeline synthesized"
            );
            cursors.push((transporter.id, cursor, own.is_empty()));
            log.insert(transporter.id, movements);
        }

        let global_end = cursors.iter().map(|(_, c, _)| c.last_end).fold(0.0, f64::max);
        for (id, cursor, idle_only) in cursors {
            if idle_only || cursor.last_end < global_end {
                if let Some(list) = log.by_transporter.get_mut(&id) {
                    list.push(
                        Movement::new(
                            id,
                            0,
                            Phase::Idle,
                            cursor.last_end,
                            global_end,
                            cursor.location,
                            cursor.location,
                        )
                        .with_description(format!("Idle at {}", cursor.location)),
                    );
                }
            }
        }

        log.renumber();
        Ok(log)
    }

    /// Appends the five phases of one task and advances the cursor.
    fn expand_task(
        &self,
        transporter: &Transporter,
        task: &TransportTask,
        cursor: &mut TransporterCursor,
        out: &mut Vec<Movement>,
    ) {
        let approach = self.approach_time(transporter, cursor.location, task.from_station);
        let (lift, _, sink) = self.loaded_phases(transporter, task.from_station, task.to_station);

        let mut approach_start = task.lift_time - approach;
        if approach_start < cursor.last_end {
            warn!(
                transporter = transporter.id,
                batch = task.batch_id,
                station = task.from_station,
                late_by = cursor.last_end - approach_start,
                "hoist cannot reach lift station in time"
            );
            approach_start = cursor.last_end;
        }

        let t = transporter.id;
        let b = task.batch_id;
        let (here, from, to) = (cursor.location, task.from_station, task.to_station);
        let lift_start = approach_start + approach;
        let carry_start = lift_start + lift;
        let end = task.sink_time + (lift_start - task.lift_time);
        let sink_start = end - sink;

        out.push(
            Movement::new(t, b, Phase::Idle, cursor.last_end, approach_start, here, here)
                .with_description(format!("Idle at {here}")),
        );
        out.push(
            Movement::new(t, b, Phase::MoveToLift, approach_start, lift_start, here, from)
                .with_description(format!("Move {here} → {from}")),
        );
        out.push(
            Movement::new(t, b, Phase::Lift, lift_start, carry_start, from, from)
                .with_description(format!("Lift batch {b} at {from}")),
        );
        out.push(
            Movement::new(t, b, Phase::MoveToSink, carry_start, sink_start, from, to)
                .with_description(format!("Carry batch {b} {from} → {to}")),
        );
        out.push(
            Movement::new(t, b, Phase::Sink, sink_start, end, to, to)
                .with_description(format!("Sink batch {b} at {to}")),
        );

        cursor.location = to;
        cursor.last_end = end;
    }

    /// Lift, carry and sink durations of a loaded transfer.
    ///
    /// A measured table transfer rescales the three phases to its total.
    fn loaded_phases(&self, transporter: &Transporter, from: u32, to: u32) -> (f64, f64, f64) {
        let lift = self.vertical_time(transporter, from, true);
        let carry = self.travel_time(transporter, from, to);
        let sink = self.vertical_time(transporter, to, false);
        let total = lift + carry + sink;
        match self.problem.transfer_table.transfer(transporter.id, from, to) {
            Some(measured) if total > 0.0 => {
                let k = measured / total;
                (lift * k, carry * k, sink * k)
            }
            _ => (lift, carry, sink),
        }
    }

    /// Empty travel: a positive table move wins over physics.
    fn approach_time(&self, transporter: &Transporter, from: u32, to: u32) -> f64 {
        if from == to {
            return 0.0;
        }
        match self.problem.transfer_table.movement(transporter.id, from, to) {
            Some(seconds) => seconds,
            None => self.travel_time(transporter, from, to),
        }
    }

    fn travel_time(&self, transporter: &Transporter, from: u32, to: u32) -> f64 {
        if from == to {
            return 0.0;
        }
        match (self.problem.station(from), self.problem.station(to)) {
            (Some(a), Some(b)) => self.physics.travel_time(a, b, transporter),
            _ => self.physics.fallback_duration(),
        }
    }

    fn vertical_time(&self, transporter: &Transporter, station: u32, lift: bool) -> f64 {
        match self.problem.station(station) {
            Some(s) if lift => self.physics.lift_time(s, transporter),
            Some(s) => self.physics.sink_time(s, transporter),
            None => self.physics.fallback_duration(),
        }
    }
}
