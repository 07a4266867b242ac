//! Constraint model for stage scheduling.
//!
//! One interval variable per (batch, stage). Each interval chooses a
//! station from its candidate set and a duration from its bounds.
//! Consecutive intervals of a job are linked by a transfer whose length
//! and hoist resource depend on the chosen station pair.

use std::collections::HashMap;

/// An interval decision variable.
#[derive(Debug, Clone)]
pub struct IntervalVar {
    /// Unique name, e.g. `B3_S2`.
    pub id: String,
    pub batch_id: u32,
    pub stage: u32,
    /// Earliest start (s).
    pub start_min: i64,
    pub duration_min: i64,
    pub duration_max: i64,
    /// Permitted stations, ascending.
    pub candidates: Vec<u32>,
}

impl IntervalVar {
    pub fn new(
        batch_id: u32,
        stage: u32,
        start_min: i64,
        duration_min: i64,
        duration_max: i64,
        candidates: Vec<u32>,
    ) -> Self {
        Self {
            id: format!("B{batch_id}_S{stage}"),
            batch_id,
            stage,
            start_min,
            duration_min,
            duration_max,
            candidates,
        }
    }
}

/// A job: a chain of intervals executed in order.
#[derive(Debug, Clone)]
pub struct Job {
    pub batch_id: u32,
    /// Interval indices in chain order.
    pub intervals: Vec<usize>,
}

/// Transfer between two stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Whole seconds from lift start to sink end.
    pub duration: i64,
    /// Transporter occupied by the transfer; `None` if no hoist covers it.
    pub hoist: Option<u32>,
}

/// Model constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CpConstraint {
    /// `end[i] + transfer ≤ start[i+1]` along a job.
    Chain { job: usize },
    /// Intervals on the same station never overlap.
    StationNoOverlap,
    /// Transfer intervals on the same hoist never overlap.
    HoistNoOverlap,
    /// Jobs start the interval at chain position `position` in the
    /// listed order.
    OrderedStarts { jobs: Vec<usize>, position: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Objective {
    /// Minimize the latest job completion.
    #[default]
    MinimizeMakespan,
}

/// A complete scheduling model.
#[derive(Debug, Clone)]
pub struct CpModel {
    pub name: String,
    /// Upper bound for every time value (s).
    pub horizon: i64,
    intervals: Vec<IntervalVar>,
    jobs: Vec<Job>,
    transfers: HashMap<(u32, u32), Transfer>,
    /// Start station per hoist.
    hoists: HashMap<u32, u32>,
    /// Empty travel per (hoist, from, to), whole seconds.
    moves: HashMap<(u32, u32, u32), i64>,
    constraints: Vec<CpConstraint>,
    objective: Objective,
}

impl CpModel {
    pub fn new(name: impl Into<String>, horizon: i64) -> Self {
        Self {
            name: name.into(),
            horizon,
            intervals: Vec::new(),
            jobs: Vec::new(),
            transfers: HashMap::new(),
            hoists: HashMap::new(),
            moves: HashMap::new(),
            constraints: Vec::new(),
            objective: Objective::default(),
        }
    }

    /// Adds an interval and returns its index.
    pub fn add_interval(&mut self, interval: IntervalVar) -> usize {
        self.intervals.push(interval);
        self.intervals.len() - 1
    }

    /// Adds a job with a chain constraint and returns its index.
    pub fn add_job(&mut self, batch_id: u32, intervals: Vec<usize>) -> usize {
        self.jobs.push(Job {
            batch_id,
            intervals,
        });
        let job = self.jobs.len() - 1;
        self.constraints.push(CpConstraint::Chain { job });
        job
    }

    pub fn set_transfer(&mut self, from: u32, to: u32, transfer: Transfer) {
        self.transfers.insert((from, to), transfer);
    }

    pub fn has_transfer(&self, from: u32, to: u32) -> bool {
        self.transfers.contains_key(&(from, to))
    }

    /// Transfer between two stations; zero-length and hoist-free if the
    /// pair was never registered.
    pub fn transfer(&self, from: u32, to: u32) -> Transfer {
        self.transfers.get(&(from, to)).copied().unwrap_or(Transfer {
            duration: 0,
            hoist: None,
        })
    }

    /// Registers a hoist waiting at `home` at time 0.
    pub fn add_hoist(&mut self, hoist: u32, home: u32) {
        self.hoists.insert(hoist, home);
    }

    pub fn hoist_home(&self, hoist: u32) -> Option<u32> {
        self.hoists.get(&hoist).copied()
    }

    /// Registered hoists as (id, home).
    pub fn hoists(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.hoists.iter().map(|(&h, &home)| (h, home))
    }

    pub fn set_empty_move(&mut self, hoist: u32, from: u32, to: u32, seconds: i64) {
        self.moves.insert((hoist, from, to), seconds);
    }

    /// Empty travel of `hoist` between two stations; zero for the same
    /// station or an unregistered pair.
    pub fn empty_move(&self, hoist: u32, from: u32, to: u32) -> i64 {
        if from == to {
            return 0;
        }
        self.moves.get(&(hoist, from, to)).copied().unwrap_or(0)
    }

    /// Longest registered empty move.
    pub fn max_empty_move(&self) -> i64 {
        self.moves.values().copied().max().unwrap_or(0)
    }

    pub fn add_constraint(&mut self, constraint: CpConstraint) {
        self.constraints.push(constraint);
    }

    pub fn set_objective(&mut self, objective: Objective) {
        self.objective = objective;
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn interval(&self, index: usize) -> &IntervalVar {
        &self.intervals[index]
    }

    pub fn intervals(&self) -> &[IntervalVar] {
        &self.intervals
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn constraints(&self) -> &[CpConstraint] {
        &self.constraints
    }

    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Whether transfer intervals compete for hoists.
    pub fn hoists_exclusive(&self) -> bool {
        self.constraints.contains(&CpConstraint::HoistNoOverlap)
    }

    /// Whether stations are exclusive.
    pub fn stations_exclusive(&self) -> bool {
        self.constraints.contains(&CpConstraint::StationNoOverlap)
    }

    /// The ordered-start constraint, if any: (job order, chain position).
    pub fn ordered_starts(&self) -> Option<(&[usize], usize)> {
        self.constraints.iter().find_map(|c| match c {
            CpConstraint::OrderedStarts { jobs, position } => Some((jobs.as_slice(), *position)),
            _ => None,
        })
    }

    /// Earliest completion of one job ignoring all resource conflicts.
    pub fn job_lower_bound(&self, job: usize) -> i64 {
        let chain = &self.jobs[job].intervals;
        let mut t = i64::MIN;
        for (pos, &idx) in chain.iter().enumerate() {
            let iv = &self.intervals[idx];
            let start = t.max(iv.start_min);
            let end = start.saturating_add(iv.duration_min);
            t = match chain.get(pos + 1) {
                Some(&next) => {
                    let next_iv = &self.intervals[next];
                    let min_transfer = iv
                        .candidates
                        .iter()
                        .flat_map(|&a| next_iv.candidates.iter().map(move |&b| (a, b)))
                        .map(|(a, b)| self.transfer(a, b).duration)
                        .min()
                        .unwrap_or(0);
                    end.saturating_add(min_transfer)
                }
                None => end,
            };
        }
        t.max(0)
    }

    /// Makespan lower bound: the slowest job on an empty line.
    pub fn lower_bound(&self) -> i64 {
        (0..self.jobs.len())
            .map(|j| self.job_lower_bound(j))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_stage_model() -> CpModel {
        let mut m = CpModel::new("test", 10_000);
        let a = m.add_interval(IntervalVar::new(1, 0, 5, 0, 10_000, vec![100]));
        let b = m.add_interval(IntervalVar::new(1, 1, 0, 60, 90, vec![101, 102]));
        m.add_job(1, vec![a, b]);
        m.set_transfer(100, 101, Transfer { duration: 30, hoist: Some(1) });
        m.set_transfer(100, 102, Transfer { duration: 20, hoist: Some(1) });
        m
    }

    #[test]
    fn test_interval_naming() {
        let iv = IntervalVar::new(3, 2, 0, 1, 2, vec![7]);
        assert_eq!(iv.id, "B3_S2");
    }

    #[test]
    fn test_add_job_adds_chain() {
        let m = two_stage_model();
        assert_eq!(m.interval_count(), 2);
        assert_eq!(m.constraint_count(), 1);
        assert_eq!(m.constraints()[0], CpConstraint::Chain { job: 0 });
    }

    #[test]
    fn test_unregistered_transfer_is_free() {
        let m = two_stage_model();
        assert_eq!(m.transfer(100, 101).duration, 30);
        assert!(!m.has_transfer(101, 100));
        assert_eq!(m.transfer(101, 100), Transfer { duration: 0, hoist: None });
    }

    #[test]
    fn test_lower_bound_uses_cheapest_transfer() {
        let m = two_stage_model();
        // release 5 + dwell 0 + transfer 20 + dwell 60
        assert_eq!(m.job_lower_bound(0), 85);
        assert_eq!(m.lower_bound(), 85);
    }

    #[test]
    fn test_ordered_starts_lookup() {
        let mut m = two_stage_model();
        assert!(m.ordered_starts().is_none());
        m.add_constraint(CpConstraint::OrderedStarts { jobs: vec![0], position: 1 });
        m.add_constraint(CpConstraint::HoistNoOverlap);
        let (jobs, pos) = m.ordered_starts().unwrap();
        assert_eq!(jobs, &[0]);
        assert_eq!(pos, 1);
        assert!(m.hoists_exclusive());
        assert!(!m.stations_exclusive());
    }

    #[test]
    fn test_empty_moves() {
        let mut m = two_stage_model();
        m.add_hoist(1, 100);
        m.set_empty_move(1, 101, 100, 12);
        assert_eq!(m.hoist_home(1), Some(100));
        assert_eq!(m.empty_move(1, 101, 100), 12);
        assert_eq!(m.empty_move(1, 100, 100), 0);
        assert_eq!(m.empty_move(2, 101, 100), 0);
        assert_eq!(m.max_empty_move(), 12);
    }
}
