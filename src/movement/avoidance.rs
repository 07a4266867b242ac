//! Shared-zone avoidance.
//!
//! Two transporters whose spans overlap share a zone of stations. A hoist
//! parked in that zone blocks its neighbour, so long idles inside it are
//! split into an avoidance move out of the zone followed by a shorter
//! idle at the retreat station. The lower-span ("left") transporter
//! retreats below the zone, the other one above it.
//!
//! After splitting, each timeline is sorted by (start, Avoid first,
//! phase, original position) and clamped so every movement starts no
//! earlier than its predecessor ends. Running the resolver on its own
//! output changes nothing.

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::config::AvoidanceConfig;
use crate::models::{LineProblem, Movement, MovementLog, Phase, Transporter};
use crate::physics::PhysicsCalculator;

/// Station range shared by two transporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedZone {
    /// Transporter retreating below the zone.
    pub left: u32,
    /// Transporter retreating above the zone.
    pub right: u32,
    pub min_station: u32,
    pub max_station: u32,
}

impl SharedZone {
    pub fn contains(&self, station: u32) -> bool {
        station >= self.min_station && station <= self.max_station
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Below,
    Above,
}

/// Inserts avoidance moves and enforces per-transporter time order.
pub struct AvoidanceResolver<'a> {
    problem: &'a LineProblem,
    config: AvoidanceConfig,
    physics: PhysicsCalculator,
}

impl<'a> AvoidanceResolver<'a> {
    pub fn new(problem: &'a LineProblem, config: AvoidanceConfig) -> Self {
        Self {
            problem,
            config,
            physics: PhysicsCalculator::default(),
        }
    }

    pub fn with_physics(mut self, physics: PhysicsCalculator) -> Self {
        self.physics = physics;
        self
    }

    /// Shared zones of every transporter pair with overlapping spans.
    pub fn zones(&self) -> Vec<SharedZone> {
        let transporters = &self.problem.transporters;
        let mut zones = Vec::new();
        for (i, a) in transporters.iter().enumerate() {
            for b in &transporters[i + 1..] {
                let (sa, sb) = (a.span(), b.span());
                let (left, right) = if sb.0 < sa.0 { (b, a) } else { (a, b) };

                let bounds = self
                    .config
                    .zone_for(a.id, b.id)
                    .or_else(|| {
                        let lo = sa.0.max(sb.0);
                        let hi = sa.1.min(sb.1);
                        (lo <= hi).then_some((lo, hi))
                    });
                match bounds {
                    Some((lo, hi)) if lo <= hi => zones.push(SharedZone {
                        left: left.id,
                        right: right.id,
                        min_station: lo,
                        max_station: hi,
                    }),
                    _ => debug!(a = a.id, b = b.id, "no shared zone, pair skipped"),
                }
            }
        }
        zones
    }

    /// Resolves a raw movement log.
    pub fn resolve(&self, mut log: MovementLog) -> MovementLog {
        if self.config.enabled {
            for zone in self.zones() {
                for (id, side) in [(zone.left, Side::Below), (zone.right, Side::Above)] {
                    let Some(transporter) = self.problem.transporter(id) else {
                        continue;
                    };
                    let Some(target) = self.retreat_station(transporter, &zone, side) else {
                        warn!(
                            transporter = id,
                            zone_min = zone.min_station,
                            zone_max = zone.max_station,
                            "no retreat station outside shared zone"
                        );
                        continue;
                    };
                    if let Some(list) = log.by_transporter.get_mut(&id) {
                        let inserted = self.split_idles(transporter, &zone, target, list);
                        if inserted > 0 {
                            debug!(transporter = id, target, inserted, "avoidance moves inserted");
                        }
                    }
                }
            }
        }

        for list in log.by_transporter.values_mut() {
            order_and_clamp(list);
        }
        log.renumber();
        log
    }

    /// Nearest station outside the zone on `side`, within the
    /// transporter's span. Stations at least `avoid_distance` mm from the
    /// zone edge are preferred.
    fn retreat_station(&self, transporter: &Transporter, zone: &SharedZone, side: Side) -> Option<u32> {
        let (span_min, span_max) = transporter.span();
        let mut candidates: Vec<u32> = self
            .problem
            .stations
            .iter()
            .map(|s| s.id)
            .filter(|&id| id >= span_min && id <= span_max)
            .filter(|&id| match side {
                Side::Below => id < zone.min_station,
                Side::Above => id > zone.max_station,
            })
            .collect();
        candidates.sort_unstable_by_key(|&id| match side {
            Side::Below => zone.min_station - id,
            Side::Above => id - zone.max_station,
        });

        let edge = match side {
            Side::Below => zone.min_station,
            Side::Above => zone.max_station,
        };
        let clear = self.problem.station(edge).and_then(|edge| {
            candidates.iter().copied().find(|&id| {
                self.problem
                    .station(id)
                    .is_some_and(|s| s.distance_to(edge) >= transporter.avoid_distance)
            })
        });
        clear.or_else(|| candidates.first().copied())
    }

    /// Avoidance move duration between two stations.
    fn avoid_time(&self, transporter: &Transporter, from: u32, to: u32) -> Option<f64> {
        let (a, b) = (self.problem.station(from)?, self.problem.station(to)?);
        let distance = a.distance_to(b);
        if transporter.horizontal.is_usable() {
            Some(self.physics.horizontal_time(distance, &transporter.horizontal))
        } else {
            Some(distance * self.config.fallback_secs_per_mm.max(0.0))
        }
    }

    /// Splits long in-zone idles. Returns the number of Avoid moves added.
    ///
    /// A following empty move is retargeted to start at the retreat
    /// station and retimed; the clamp shifts whatever comes after it. Any
    /// other follower gets a move back carved from the end of the idle.
    fn split_idles(
        &self,
        transporter: &Transporter,
        zone: &SharedZone,
        target: u32,
        list: &mut Vec<Movement>,
    ) -> usize {
        let src: Vec<Movement> = list.drain(..).collect();
        let mut out = Vec::with_capacity(src.len() + 2);
        let mut inserted = 0;
        let mut retarget_next = false;

        for (i, mut m) in src.iter().cloned().enumerate() {
            if retarget_next {
                self.retarget(transporter, target, &mut m);
                retarget_next = false;
            }

            let splittable = m.phase == Phase::Idle
                && zone.contains(m.from_station)
                && m.duration() > self.config.min_idle_for_avoid;
            let travel = if splittable {
                self.avoid_time(transporter, m.from_station, target)
            } else {
                None
            };
            let follows_move = src.get(i + 1).is_none_or(|n| n.phase == Phase::MoveToLift);
            let back = if follows_move {
                Some(0.0)
            } else {
                self.avoid_time(transporter, target, m.from_station)
            };

            match travel.zip(back) {
                Some((d, back)) if d + back <= m.duration() => {
                    let (t, b, here) = (m.transporter_id, m.batch_id, m.from_station);
                    let avoid_end = m.start + d;
                    let idle_end = m.end - back;
                    out.push(
                        Movement::new(t, b, Phase::Avoid, m.start, avoid_end, here, target)
                            .with_description(format!("Avoid {here} → {target}")),
                    );
                    out.push(
                        Movement::new(t, b, Phase::Idle, avoid_end, idle_end, target, target)
                            .with_description(format!("Idle at {target}")),
                    );
                    if follows_move {
                        retarget_next = true;
                    } else {
                        out.push(
                            Movement::new(t, b, Phase::MoveToLift, idle_end, m.end, target, here)
                                .with_description(format!("Move {target} → {here}")),
                        );
                    }
                    inserted += 1;
                }
                Some((d, back)) => {
                    debug!(
                        transporter = transporter.id,
                        station = m.from_station,
                        idle = m.duration(),
                        travel = d + back,
                        "avoidance move does not fit in idle"
                    );
                    out.push(m);
                }
                None => out.push(m),
            }
        }
        *list = out;
        inserted
    }

    /// Points an empty move at `target` as its origin and retimes it.
    fn retarget(&self, transporter: &Transporter, target: u32, m: &mut Movement) {
        let to = m.to_station;
        if let Some(d) = self.avoid_time(transporter, target, to) {
            m.end = m.start + d;
        }
        let verb = if m.description.starts_with("Return") { "Return" } else { "Move" };
        m.from_station = target;
        m.description = format!("{verb} {target} → {to}");
    }
}

/// Sorts one timeline and removes residual overlap by shifting.
fn order_and_clamp(list: &mut Vec<Movement>) {
    let mut indexed: Vec<(usize, Movement)> = list.drain(..).enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| {
        a.start
            .total_cmp(&b.start)
            .then_with(|| avoid_first(a.phase, b.phase))
            .then(a.phase.code().cmp(&b.phase.code()))
            .then(ia.cmp(ib))
    });

    let mut prev_end = f64::NEG_INFINITY;
    for (_, mut m) in indexed {
        if m.start < prev_end {
            m.shift(prev_end - m.start);
        }
        prev_end = m.end;
        list.push(m);
    }
}

fn avoid_first(a: Phase, b: Phase) -> Ordering {
    match (a == Phase::Avoid, b == Phase::Avoid) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HorizontalProfile, Station};
    use crate::validation::check_movements;

    /// Stations 101..=115 one metre apart; hoist 1 spans 101..=110, hoist 2
    /// spans 105..=115.
    fn line() -> LineProblem {
        let stations = (101..=115)
            .map(|id| Station::new(id, (id - 100) as f64 * 1000.0))
            .collect();
        LineProblem::new(
            stations,
            vec![Transporter::new(1, 101, 110), Transporter::new(2, 105, 115)],
        )
    }

    fn raw_log() -> MovementLog {
        let mut log = MovementLog::new();
        log.insert(
            1,
            vec![
                Movement::new(1, 7, Phase::Idle, 0.0, 80.0, 107, 107),
                Movement::new(1, 7, Phase::MoveToLift, 80.0, 84.0, 107, 108),
                Movement::new(1, 7, Phase::Lift, 84.0, 100.0, 108, 108),
            ],
        );
        log.insert(
            2,
            vec![
                Movement::new(2, 0, Phase::Idle, 0.0, 200.0, 112, 112),
                Movement::new(2, 8, Phase::Idle, 200.0, 240.0, 109, 109),
            ],
        );
        log
    }

    #[test]
    fn test_zone_is_span_intersection() {
        let problem = line();
        let zones = AvoidanceResolver::new(&problem, AvoidanceConfig::default()).zones();
        assert_eq!(
            zones,
            vec![SharedZone { left: 1, right: 2, min_station: 105, max_station: 110 }]
        );
        assert!(zones[0].contains(105));
        assert!(!zones[0].contains(111));
    }

    #[test]
    fn test_explicit_zone_overrides() {
        let problem = line();
        let config = AvoidanceConfig::default().with_zone(2, 1, (107, 108));
        let zones = AvoidanceResolver::new(&problem, config).zones();
        assert_eq!(zones[0].min_station, 107);
        assert_eq!(zones[0].max_station, 108);
    }

    #[test]
    fn test_disjoint_spans_skipped() {
        let mut problem = line();
        problem.transporters[1] = Transporter::new(2, 111, 115);
        let zones = AvoidanceResolver::new(&problem, AvoidanceConfig::default()).zones();
        assert!(zones.is_empty());
    }

    #[test]
    fn test_long_idle_split_keeps_duration() {
        let problem = line();
        let resolved = AvoidanceResolver::new(&problem, AvoidanceConfig::default()).resolve(raw_log());

        let list = resolved.movements(1);
        assert_eq!(list[0].phase, Phase::Avoid);
        assert_eq!(list[0].from_station, 107);
        assert_eq!(list[0].to_station, 104);
        assert_eq!(list[1].phase, Phase::Idle);
        assert_eq!(list[1].from_station, 104);
        assert!((list[0].duration() + list[1].duration() - 80.0).abs() < 1e-9);
        assert_eq!(list[2].phase, Phase::MoveToLift);
        assert_eq!(list[2].from_station, 104);
        assert!(check_movements(&resolved).is_empty());
    }

    #[test]
    fn test_retargeted_move_gets_travel_time() {
        // the hoist already waits at its lift station inside the zone
        let problem = line();
        let mut log = MovementLog::new();
        log.insert(
            1,
            vec![
                Movement::new(1, 7, Phase::Idle, 0.0, 80.0, 107, 107),
                Movement::new(1, 7, Phase::MoveToLift, 80.0, 80.0, 107, 107)
                    .with_description("Move 107 → 107"),
                Movement::new(1, 7, Phase::Lift, 80.0, 96.0, 107, 107),
            ],
        );
        let resolved = AvoidanceResolver::new(&problem, AvoidanceConfig::default()).resolve(log);
        let list = resolved.movements(1);
        let back = PhysicsCalculator::default().horizontal_time(3000.0, &HorizontalProfile::default());

        assert_eq!(list[0].phase, Phase::Avoid);
        assert_eq!(list[0].to_station, 104);
        let approach = &list[2];
        assert_eq!(approach.phase, Phase::MoveToLift);
        assert_eq!((approach.from_station, approach.to_station), (104, 107));
        assert_eq!(approach.description, "Move 104 → 107");
        assert!(approach.duration() > 0.0);
        assert!((approach.duration() - back).abs() < 1e-9);
        assert!((list[3].start - approach.end).abs() < 1e-9);
        assert!((list[3].duration() - 16.0).abs() < 1e-9);
        assert!(check_movements(&resolved).is_empty());
    }

    #[test]
    fn test_stationary_follower_gets_move_back() {
        let problem = line();
        let mut log = MovementLog::new();
        log.insert(
            1,
            vec![
                Movement::new(1, 7, Phase::Idle, 0.0, 80.0, 107, 107),
                Movement::new(1, 7, Phase::Lift, 80.0, 96.0, 107, 107),
            ],
        );
        let resolved = AvoidanceResolver::new(&problem, AvoidanceConfig::default()).resolve(log);
        let list = resolved.movements(1);
        let phases: Vec<Phase> = list.iter().map(|m| m.phase).collect();
        assert_eq!(phases, vec![Phase::Avoid, Phase::Idle, Phase::MoveToLift, Phase::Lift]);
        assert_eq!((list[2].from_station, list[2].to_station), (104, 107));
        assert!((list[2].end - 80.0).abs() < 1e-9);
        assert_eq!(list[3].start, 80.0);
        assert!(check_movements(&resolved).is_empty());
    }

    #[test]
    fn test_right_transporter_retreats_above() {
        let problem = line();
        let resolved = AvoidanceResolver::new(&problem, AvoidanceConfig::default()).resolve(raw_log());
        // idle at 112 lies outside the zone, the 40 s idle at 109 is short
        assert_eq!(resolved.movements(2).len(), 2);

        let mut log = raw_log();
        if let Some(list) = log.by_transporter.get_mut(&2) {
            list[1].end = 300.0;
        }
        let resolved = AvoidanceResolver::new(&problem, AvoidanceConfig::default()).resolve(log);
        let list = resolved.movements(2);
        assert_eq!(list[1].phase, Phase::Avoid);
        assert_eq!(list[1].to_station, 111);
    }

    #[test]
    fn test_avoid_distance_prefers_clear_station() {
        let mut problem = line();
        problem.transporters[0] = Transporter::new(1, 101, 110).with_avoid_distance(2500.0);
        let resolved = AvoidanceResolver::new(&problem, AvoidanceConfig::default()).resolve(raw_log());
        // 104 is 1 m from the zone edge at 105, 102 is the first 2.5 m clear
        assert_eq!(resolved.movements(1)[0].to_station, 102);
    }

    #[test]
    fn test_threshold_is_strict() {
        let problem = line();
        let config = AvoidanceConfig {
            min_idle_for_avoid: 80.0,
            ..AvoidanceConfig::default()
        };
        let resolved = AvoidanceResolver::new(&problem, config).resolve(raw_log());
        assert_eq!(resolved.count_phase(Phase::Avoid), 0);
    }

    #[test]
    fn test_move_that_does_not_fit_is_skipped() {
        let mut problem = line();
        problem.transporters[0] =
            Transporter::new(1, 101, 110).with_horizontal(HorizontalProfile::new(2.0, 2.0, 10.0));
        let resolved = AvoidanceResolver::new(&problem, AvoidanceConfig::default()).resolve(raw_log());
        // 3 m at 10 mm/s takes far longer than the 80 s idle
        assert_eq!(resolved.count_phase(Phase::Avoid), 0);
        assert_eq!(resolved.movements(1)[1].from_station, 107);
    }

    #[test]
    fn test_unusable_profile_uses_distance_fallback() {
        let mut problem = line();
        problem.transporters[0] =
            Transporter::new(1, 101, 110).with_horizontal(HorizontalProfile::new(1.0, 1.0, 0.0));
        let resolved = AvoidanceResolver::new(&problem, AvoidanceConfig::default()).resolve(raw_log());
        // 3000 mm x 0.01 s/mm
        assert!((resolved.movements(1)[0].duration() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_disabled_only_orders() {
        let problem = line();
        let config = AvoidanceConfig {
            enabled: false,
            ..AvoidanceConfig::default()
        };
        let resolved = AvoidanceResolver::new(&problem, config).resolve(raw_log());
        assert_eq!(resolved.count_phase(Phase::Avoid), 0);
        assert_eq!(resolved.len(), 5);
    }

    #[test]
    fn test_clamp_removes_overlap() {
        let problem = line();
        let mut log = MovementLog::new();
        log.insert(
            1,
            vec![
                Movement::new(1, 1, Phase::Lift, 10.0, 30.0, 101, 101),
                Movement::new(1, 1, Phase::MoveToSink, 25.0, 35.0, 101, 102),
            ],
        );
        let resolved = AvoidanceResolver::new(&problem, AvoidanceConfig::default()).resolve(log);
        let list = resolved.movements(1);
        assert_eq!(list[1].start, 30.0);
        assert_eq!(list[1].end, 40.0);
    }

    #[test]
    fn test_resolver_is_idempotent() {
        let problem = line();
        let resolver = AvoidanceResolver::new(&problem, AvoidanceConfig::default());
        let once = resolver.resolve(raw_log());
        let twice = resolver.resolve(once.clone());
        assert_eq!(once.count_phase(Phase::Avoid), twice.count_phase(Phase::Avoid));
        assert_eq!(once.rows().len(), twice.rows().len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a, b);
        }
    }
}
