//! Schedule quality metrics (KPIs).
//!
//! Computes line performance indicators from a stage schedule and the
//! problem it solves.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan (C_max) | Latest stage end |
//! | Avg Flow Time | Mean time from release to last stage end |
//! | Total Stretch | Sum of max(0, dwell - min dwell) over treated stages |
//! | Avg Utilization | Mean station busyness over the makespan |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{LineProblem, StageSchedule};

/// Schedule performance indicators.
///
/// All time values are in seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleKpi {
    pub makespan: i64,
    /// Average flow time: mean(completion - release).
    pub avg_flow_time: f64,
    /// Dwell beyond the minimum, summed over all treated stages.
    pub total_stretch: i64,
    /// Average station utilization (0.0..1.0), release stages excluded.
    pub avg_utilization: f64,
    pub utilization_by_station: HashMap<u32, f64>,
    pub batch_count: usize,
}

impl ScheduleKpi {
    /// Computes KPIs from a schedule and its input problem.
    pub fn calculate(schedule: &StageSchedule, problem: &LineProblem) -> Self {
        let makespan = schedule.makespan();

        let mut total_flow = 0.0;
        let mut batch_count = 0;
        for batch in &problem.batches {
            if let Some(completion) = schedule.batch_completion(batch.id) {
                batch_count += 1;
                total_flow += (completion - batch.release_time) as f64;
            }
        }

        let mut total_stretch = 0;
        for row in schedule.stages.iter().filter(|s| s.stage > 0) {
            let min_time = problem
                .batch(row.batch_id)
                .and_then(|b| {
                    problem
                        .stages_of(b)
                        .iter()
                        .find(|spec| spec.stage == row.stage)
                })
                .map(|spec| spec.min_time)
                .unwrap_or(row.duration);
            total_stretch += (row.duration - min_time).max(0);
        }

        let utilization_by_station: HashMap<u32, f64> = if makespan > 0 {
            schedule
                .station_busy_time()
                .into_iter()
                .map(|(station, busy)| (station, busy as f64 / makespan as f64))
                .collect()
        } else {
            HashMap::new()
        };
        let avg_utilization = if utilization_by_station.is_empty() {
            0.0
        } else {
            utilization_by_station.values().sum::<f64>() / utilization_by_station.len() as f64
        };

        let avg_flow_time = if batch_count == 0 {
            0.0
        } else {
            total_flow / batch_count as f64
        };

        Self {
            makespan,
            avg_flow_time,
            total_stretch,
            avg_utilization,
            utilization_by_station,
            batch_count,
        }
    }

    /// Whether the schedule meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_makespan: i64, min_utilization: f64) -> bool {
        self.makespan <= max_makespan && self.avg_utilization >= min_utilization
    }
}
