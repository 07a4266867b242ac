//! Timetable insertion solver.
//!
//! # Algorithm
//!
//! 1. Jobs are inserted one at a time into station and hoist timetables.
//! 2. For one job, a depth-first search walks the chain. At each interval
//!    it tries end times from the minimum dwell upward, only at the points
//!    where a blocking reservation of the next station ends or the hoist
//!    can be back at the station, then every candidate next station. A
//!    hoist trip also needs the empty move from the hoist's previous drop
//!    and time to reach its next lift. The first complete chain wins,
//!    so each job gets its earliest feasible completion for the chosen
//!    search order.
//! 3. If the search exhausts its node budget the job is appended after
//!    every existing reservation (tail placement), which is always
//!    feasible.
//! 4. With ordered starts the given job order is inserted once, each job
//!    bounded by the previous job's start. Otherwise a seeded local search
//!    (swap / reinsert moves) over insertion orders runs until the
//!    iteration cap, the time limit, cancellation, or the lower bound is
//!    reached.
//!
//! # Reference
//! - Phillips & Unger (1976), "Mathematical programming solution of a
//!   hoist scheduling program"
//! - Manier & Bloch (2003), "A classification for hoist scheduling
//!   problems"

use std::collections::HashMap;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{
    CancelToken, CpModel, CpSolution, CpSolver, HoistTrack, IntervalSolution, SolverConfig, SolverStatus,
    Timeline, Trip,
};

/// One placed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    interval: usize,
    station: u32,
    start: i64,
    end: i64,
}

#[derive(Debug)]
struct Reservations {
    stations: HashMap<u32, Timeline>,
    hoists: HashMap<u32, HoistTrack>,
}

impl Reservations {
    fn new(model: &CpModel) -> Self {
        Self {
            stations: HashMap::new(),
            hoists: model.hoists().map(|(h, home)| (h, HoistTrack::new(home))).collect(),
        }
    }

    fn station_free(&self, model: &CpModel, station: u32, start: i64, end: i64) -> bool {
        !model.stations_exclusive()
            || self
                .stations
                .get(&station)
                .is_none_or(|t| t.is_free(start, end))
    }

    fn hoist_free(&self, model: &CpModel, hoist: Option<u32>, trip: Trip, pending: &[Trip]) -> bool {
        match hoist {
            Some(h) if model.hoists_exclusive() => self
                .hoists
                .get(&h)
                .is_none_or(|t| t.fits(trip, pending, |a, b| model.empty_move(h, a, b))),
            _ => true,
        }
    }

    fn station_ends(&self, station: u32) -> impl Iterator<Item = i64> + '_ {
        self.stations.get(&station).into_iter().flat_map(|t| t.ends())
    }

    /// Times at which `hoist` can be back at `station` after a trip.
    fn hoist_ready(&self, model: &CpModel, hoist: Option<u32>, station: u32) -> Vec<i64> {
        match hoist.and_then(|h| self.hoists.get(&h).map(|t| (h, t))) {
            Some((h, track)) => {
                let travel = |a, b| model.empty_move(h, a, b);
                track.ready_times(station, &travel).collect()
            }
            None => Vec::new(),
        }
    }

    fn latest_end(&self) -> i64 {
        self.stations
            .values()
            .filter_map(Timeline::latest_end)
            .chain(self.hoists.values().filter_map(HoistTrack::latest_end))
            .max()
            .unwrap_or(i64::MIN)
    }

    fn commit(&mut self, model: &CpModel, placements: &[Placement]) {
        for (i, p) in placements.iter().enumerate() {
            self.stations
                .entry(p.station)
                .or_default()
                .reserve(p.start, p.end);
            if let Some(next) = placements.get(i + 1) {
                let transfer = model.transfer(p.station, next.station);
                if let Some(h) = transfer.hoist {
                    let home = model.hoist_home(h).unwrap_or(p.station);
                    self.hoists.entry(h).or_insert_with(|| HoistTrack::new(home)).reserve(Trip {
                        start: p.end,
                        end: next.start,
                        from: p.station,
                        to: next.station,
                    });
                }
            }
        }
    }
}

/// Loaded trips on `hoist` along `path`, the last one ending at
/// (`station`, `start`).
fn pending_trips(model: &CpModel, hoist: u32, path: &[Placement], station: u32, start: i64) -> Vec<Trip> {
    let arrivals = path
        .iter()
        .skip(1)
        .map(|p| (p.station, p.start))
        .chain(std::iter::once((station, start)));
    path.iter()
        .zip(arrivals)
        .filter(|(p, (to, _))| model.transfer(p.station, *to).hoist == Some(hoist))
        .map(|(p, (to, end))| Trip {
            start: p.end,
            end,
            from: p.station,
            to,
        })
        .collect()
}

/// Per-job search state.
struct JobSearch<'a> {
    model: &'a CpModel,
    res: &'a Reservations,
    chain: &'a [usize],
    /// Chain position bounded by `start_bound`.
    bound_position: usize,
    start_bound: Option<i64>,
    nodes: usize,
    budget: usize,
}

impl JobSearch<'_> {
    fn exhausted(&self) -> bool {
        self.nodes >= self.budget
    }

    fn bound_at(&self, position: usize) -> Option<i64> {
        if position == self.bound_position {
            self.start_bound
        } else {
            None
        }
    }

    fn place(&mut self, pos: usize, station: u32, start: i64, path: &mut Vec<Placement>) -> bool {
        self.nodes += 1;
        if self.exhausted() {
            return false;
        }

        let model = self.model;
        let idx = self.chain[pos];
        let iv = model.interval(idx);
        let lo = start.saturating_add(iv.duration_min);
        let hi = start.saturating_add(iv.duration_max).min(model.horizon);
        if lo > hi {
            return false;
        }

        let Some(&next_idx) = self.chain.get(pos + 1) else {
            if !self.res.station_free(model, station, start, lo) {
                return false;
            }
            path.push(Placement { interval: idx, station, start, end: lo });
            return true;
        };

        let next = model.interval(next_idx);
        let bound = self.bound_at(pos + 1);

        let mut ends = vec![lo];
        for &q in &next.candidates {
            let transfer = model.transfer(station, q);
            ends.extend(self.res.station_ends(q).map(|e| e - transfer.duration));
            ends.extend(self.res.hoist_ready(model, transfer.hoist, station));
            ends.push(next.start_min - transfer.duration);
            if let Some(b) = bound {
                ends.push(b - transfer.duration);
            }
        }
        ends.retain(|&e| e >= lo && e <= hi);
        ends.sort_unstable();
        ends.dedup();

        for end in ends {
            // occupancy only grows with `end`
            if !self.res.station_free(model, station, start, end) {
                break;
            }
            for &q in &next.candidates {
                let transfer = model.transfer(station, q);
                let next_start = end + transfer.duration;
                if next_start < next.start_min || bound.is_some_and(|b| next_start < b) {
                    continue;
                }
                let trip = Trip { start: end, end: next_start, from: station, to: q };
                let pending = match transfer.hoist {
                    Some(h) => pending_trips(model, h, path, station, start),
                    None => Vec::new(),
                };
                if !self.res.hoist_free(model, transfer.hoist, trip, &pending) {
                    continue;
                }
                if !self.res.station_free(model, q, next_start, next_start + next.duration_min) {
                    continue;
                }

                path.push(Placement { interval: idx, station, start, end });
                if self.place(pos + 1, q, next_start, path) {
                    return true;
                }
                path.pop();
                if self.exhausted() {
                    return false;
                }
            }
        }
        false
    }

    /// Appends the job after every reservation.
    fn tail(&self) -> Vec<Placement> {
        let model = self.model;
        let after = self.res.latest_end();
        let mut placements: Vec<Placement> = Vec::with_capacity(self.chain.len());

        let first = model.interval(self.chain[0]);
        let mut station = first.candidates[0];
        let mut start = first.start_min.max(after);
        if let Some(b) = self.bound_at(0) {
            start = start.max(b);
        }

        for (pos, &idx) in self.chain.iter().enumerate() {
            let iv = model.interval(idx);
            let Some(&next_idx) = self.chain.get(pos + 1) else {
                let end = start + iv.duration_min;
                placements.push(Placement { interval: idx, station, start, end });
                break;
            };

            let next = model.interval(next_idx);
            let q = next.candidates[0];
            let transfer = model.transfer(station, q);
            let earliest_next = next
                .start_min
                .max(self.bound_at(pos + 1).unwrap_or(i64::MIN));
            let mut end = (start + iv.duration_min).max(earliest_next - transfer.duration);
            if let Some(h) = transfer.hoist.filter(|_| model.hoists_exclusive()) {
                if let Some(track) = self.res.hoists.get(&h) {
                    let pending = pending_trips(model, h, &placements, station, start);
                    end = track.earliest(end, transfer.duration, station, q, &pending, |a, b| {
                        model.empty_move(h, a, b)
                    });
                }
            }
            let end = end.min(start.saturating_add(iv.duration_max));
            placements.push(Placement { interval: idx, station, start, end });

            start = (end + transfer.duration).max(earliest_next);
            station = q;
        }
        placements
    }
}

/// Timetable insertion solver with order local search.
#[derive(Debug, Clone)]
pub struct TimetableSolver {
    /// Search nodes per job insertion before falling back to tail placement.
    pub node_budget: usize,
}

impl TimetableSolver {
    pub fn new() -> Self {
        Self {
            node_budget: 50_000,
        }
    }

    pub fn with_node_budget(mut self, budget: usize) -> Self {
        self.node_budget = budget.max(1);
        self
    }

    fn insert_job(
        &self,
        model: &CpModel,
        res: &Reservations,
        job: usize,
        bound_position: usize,
        start_bound: Option<i64>,
    ) -> Vec<Placement> {
        let chain = &model.jobs()[job].intervals;
        let mut search = JobSearch {
            model,
            res,
            chain,
            bound_position,
            start_bound,
            nodes: 0,
            budget: self.node_budget,
        };

        let first = model.interval(chain[0]);
        let mut path = Vec::with_capacity(chain.len());
        for &station in &first.candidates {
            let mut starts: Vec<i64> = std::iter::once(first.start_min)
                .chain(res.station_ends(station))
                .chain(search.bound_at(0))
                .filter(|&s| s >= first.start_min && search.bound_at(0).is_none_or(|b| s >= b))
                .collect();
            starts.sort_unstable();
            starts.dedup();

            for start in starts {
                if search.place(0, station, start, &mut path) {
                    return path;
                }
                path.clear();
                if search.exhausted() {
                    break;
                }
            }
        }

        debug!(
            batch = model.jobs()[job].batch_id,
            nodes = search.nodes,
            "insertion search exhausted, appending job at tail"
        );
        search.tail()
    }

    /// Inserts jobs in `order`; returns makespan and placements.
    fn evaluate(&self, model: &CpModel, order: &[usize], ordered: Option<usize>) -> (i64, Vec<Placement>) {
        let mut res = Reservations::new(model);
        let mut all = Vec::with_capacity(model.interval_count());
        let mut bound = None;
        let mut makespan = 0;

        for &job in order {
            let position = ordered.unwrap_or(usize::MAX);
            let placements = self.insert_job(model, &res, job, position, bound);
            if let Some(pos) = ordered {
                bound = placements.get(pos).or(placements.last()).map(|p| p.start);
            }
            if let Some(last) = placements.last() {
                makespan = makespan.max(last.end);
            }
            res.commit(model, &placements);
            all.extend(placements);
        }
        (makespan, all)
    }

    fn initial_orders(model: &CpModel) -> Vec<Vec<usize>> {
        let given: Vec<usize> = (0..model.jobs().len()).collect();
        let release = |j: usize| model.interval(model.jobs()[j].intervals[0]).start_min;
        let work = |j: usize| -> i64 {
            model.jobs()[j]
                .intervals
                .iter()
                .map(|&i| model.interval(i).duration_min)
                .sum()
        };

        let mut shortest = given.clone();
        shortest.sort_by_key(|&j| (release(j), work(j), j));
        let mut longest = given.clone();
        longest.sort_by_key(|&j| (release(j), std::cmp::Reverse(work(j)), j));

        let mut orders = vec![given];
        for order in [shortest, longest] {
            if !orders.contains(&order) {
                orders.push(order);
            }
        }
        orders
    }

    fn neighbour(order: &[usize], rng: &mut StdRng) -> Vec<usize> {
        let mut next = order.to_vec();
        let n = next.len();
        let i = rng.random_range(0..n);
        let mut j = rng.random_range(0..n - 1);
        if j >= i {
            j += 1;
        }
        if rng.random_bool(0.5) {
            next.swap(i, j);
        } else {
            let job = next.remove(i);
            next.insert(j, job);
        }
        next
    }

    fn to_solution(
        model: &CpModel,
        placements: &[Placement],
        makespan: i64,
        lower_bound: i64,
        iterations: usize,
        started: Instant,
    ) -> CpSolution {
        let intervals = placements
            .iter()
            .map(|p| {
                (
                    model.interval(p.interval).id.clone(),
                    IntervalSolution { station: p.station, start: p.start, end: p.end },
                )
            })
            .collect();
        CpSolution {
            status: if makespan <= lower_bound {
                SolverStatus::Optimal
            } else {
                SolverStatus::Feasible
            },
            intervals,
            objective: Some(makespan),
            lower_bound,
            iterations,
            elapsed: started.elapsed(),
        }
    }
}

impl Default for TimetableSolver {
    fn default() -> Self {
        Self::new()
    }
}

fn stop(cancel: &CancelToken, started: Instant, config: &SolverConfig) -> bool {
    cancel.is_cancelled() || started.elapsed() >= config.time_limit
}

impl CpSolver for TimetableSolver {
    fn name(&self) -> &'static str {
        "timetable"
    }

    fn solve(&self, model: &CpModel, config: &SolverConfig) -> CpSolution {
        let started = Instant::now();
        let lower_bound = model.lower_bound();

        if config.cancel.is_cancelled() {
            return CpSolution::without_solution(SolverStatus::Cancelled, lower_bound);
        }
        if model.jobs().is_empty() {
            return Self::to_solution(model, &[], 0, lower_bound, 0, started);
        }
        if model
            .intervals()
            .iter()
            .any(|iv| iv.candidates.is_empty() || iv.duration_min > iv.duration_max)
        {
            return CpSolution::without_solution(SolverStatus::Infeasible, lower_bound);
        }

        if let Some((order, position)) = model.ordered_starts() {
            let (makespan, placements) = self.evaluate(model, order, Some(position));
            debug!(model = %model.name, makespan, lower_bound, "ordered insertion");
            return Self::to_solution(model, &placements, makespan, lower_bound, 1, started);
        }

        let mut best: Option<(i64, Vec<usize>, Vec<Placement>)> = None;
        for order in Self::initial_orders(model) {
            if best.is_some() && stop(&config.cancel, started, config) {
                break;
            }
            let (makespan, placements) = self.evaluate(model, &order, None);
            if best.as_ref().is_none_or(|(m, _, _)| makespan < *m) {
                best = Some((makespan, order, placements));
            }
        }
        let Some((mut best_makespan, mut best_order, mut best_placements)) = best else {
            return CpSolution::without_solution(SolverStatus::Cancelled, lower_bound);
        };

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut iterations = 0;
        while model.jobs().len() > 1
            && iterations < config.max_iterations
            && best_makespan > lower_bound
            && !stop(&config.cancel, started, config)
        {
            iterations += 1;
            let candidate = Self::neighbour(&best_order, &mut rng);
            let (makespan, placements) = self.evaluate(model, &candidate, None);
            if makespan <= best_makespan {
                if makespan < best_makespan {
                    debug!(iteration = iterations, makespan, "improved order");
                }
                best_makespan = makespan;
                best_order = candidate;
                best_placements = placements;
            }
        }

        debug!(
            model = %model.name,
            makespan = best_makespan,
            lower_bound,
            iterations,
            "free-order search finished"
        );
        Self::to_solution(model, &best_placements, best_makespan, lower_bound, iterations, started)
    }
}
