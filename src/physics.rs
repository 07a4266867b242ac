//! Hoist motion physics.
//!
//! Computes horizontal travel and vertical lift/sink durations from a
//! transporter's motion profiles.
//!
//! # Horizontal travel
//!
//! With cruise speed `v`, acceleration time `ta` and deceleration time
//! `td`, reaching full speed and stopping again covers
//! `d_ramp = v·(ta + td)/2`.
//!
//! - `d ≥ d_ramp` → trapezoidal: `t = ta + td + (d − d_ramp)/v`
//! - `d < d_ramp` → triangular (cruise speed never reached):
//!   `v_peak = √(2·d·v/(ta + td))`, `t = v_peak·(ta + td)/v`
//!
//! Both forms agree at `d = d_ramp`.
//!
//! # Vertical motion
//!
//! - Lift: `delay + slow/v_slow + (total − slow − slow_end)/v_fast +
//!   slow_end/v_slow + drain`
//! - Sink: `delay + (total − slow)/v_fast + slow/v_slow`
//!
//! `slow` is the wet or dry slow distance of the station. Drain applies to
//! wet stations only.
//!
//! Durations are never negative. An unusable profile (zero, negative or
//! non-finite speed) yields the configured fallback duration and a
//! warning.

use tracing::warn;

use crate::config::PhysicsConfig;
use crate::models::{HorizontalProfile, Station, Transporter};

/// Pure travel time for a distance, or `None` if the profile is unusable.
pub fn horizontal_transfer_time(
    distance: f64,
    accel_time: f64,
    decel_time: f64,
    max_speed: f64,
) -> Option<f64> {
    let profile = HorizontalProfile::new(accel_time, decel_time, max_speed);
    if !profile.is_usable() || !distance.is_finite() {
        return None;
    }
    let d = distance.abs();
    if d == 0.0 {
        return Some(0.0);
    }

    let ramp_time = accel_time + decel_time;
    let ramp_distance = max_speed * ramp_time / 2.0;

    if ramp_distance >= d {
        let peak = (2.0 * d * max_speed / ramp_time).sqrt();
        Some(peak * ramp_time / max_speed)
    } else {
        Some(ramp_time + (d - ramp_distance) / max_speed)
    }
}

/// Motion duration calculator.
#[derive(Debug, Clone, Default)]
pub struct PhysicsCalculator {
    config: PhysicsConfig,
}

impl PhysicsCalculator {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    /// Fallback duration for unusable profiles (s).
    pub fn fallback_duration(&self) -> f64 {
        self.config.fallback_duration.max(0.0)
    }

    /// Horizontal travel over `distance` mm.
    pub fn horizontal_time(&self, distance: f64, profile: &HorizontalProfile) -> f64 {
        if distance == 0.0 {
            return 0.0;
        }
        match horizontal_transfer_time(
            distance,
            profile.accel_time,
            profile.decel_time,
            profile.max_speed,
        ) {
            Some(t) => t.max(0.0),
            None => {
                warn!(
                    ?profile,
                    distance, "unusable horizontal profile, using fallback duration"
                );
                self.fallback_duration()
            }
        }
    }

    /// Horizontal travel between two stations.
    pub fn travel_time(&self, from: &Station, to: &Station, transporter: &Transporter) -> f64 {
        self.horizontal_time(from.distance_to(to), &transporter.horizontal)
    }

    /// Lift duration at a station.
    pub fn lift_time(&self, station: &Station, transporter: &Transporter) -> f64 {
        let v = &transporter.vertical;
        if !v.is_usable() {
            warn!(
                transporter = transporter.id,
                station = station.id,
                "unusable vertical profile, using fallback lift duration"
            );
            return self.fallback_duration();
        }

        let slow = self.slow_distance(station, transporter);
        let slow_end = v.slow_end_distance.max(0.0);
        let fast = (v.total_distance - slow - slow_end).max(0.0);

        let t = station.device_delay.max(0.0)
            + slow / v.slow_speed
            + fast / v.fast_speed
            + slow_end / v.slow_speed
            + station.effective_drain_time();
        t.max(0.0)
    }

    /// Sink duration at a station (no drain term).
    pub fn sink_time(&self, station: &Station, transporter: &Transporter) -> f64 {
        let v = &transporter.vertical;
        if !v.is_usable() {
            warn!(
                transporter = transporter.id,
                station = station.id,
                "unusable vertical profile, using fallback sink duration"
            );
            return self.fallback_duration();
        }

        let slow = self.slow_distance(station, transporter);
        let fast = (v.total_distance - slow).max(0.0);

        let t = station.device_delay.max(0.0) + fast / v.fast_speed + slow / v.slow_speed;
        t.max(0.0)
    }

    /// Loaded transfer estimate: lift at `from`, travel, sink at `to`.
    pub fn transfer_estimate(&self, from: &Station, to: &Station, transporter: &Transporter) -> f64 {
        self.lift_time(from, transporter)
            + self.travel_time(from, to, transporter)
            + self.sink_time(to, transporter)
    }

    fn slow_distance(&self, station: &Station, transporter: &Transporter) -> f64 {
        let v = &transporter.vertical;
        let d = if station.is_wet() {
            v.slow_distance_wet
        } else {
            v.slow_distance_dry
        };
        d.clamp(0.0, v.total_distance.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StationKind, VerticalProfile};

    fn scenario_hoist() -> Transporter {
        Transporter::new(1, 10, 11).with_vertical(VerticalProfile {
            total_distance: 500.0,
            slow_distance_wet: 50.0,
            slow_distance_dry: 50.0,
            slow_end_distance: 50.0,
            slow_speed: 25.0,
            fast_speed: 100.0,
        })
    }

    fn wet_station() -> Station {
        Station::new(10, 0.0).with_device_delay(2.0).with_drain_time(5.0)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_lift_time_wet_scenario() {
        let calc = PhysicsCalculator::default();
        // 2 + 50/25 + 400/100 + 50/25 + 5
        assert!(approx(calc.lift_time(&wet_station(), &scenario_hoist()), 15.0));
    }

    #[test]
    fn test_lift_time_dry_no_drain() {
        let calc = PhysicsCalculator::default();
        let dry = Station::new(11, 500.0)
            .with_kind(StationKind::Dry)
            .with_drain_time(5.0);
        // 0 + 2 + 4 + 2
        assert!(approx(calc.lift_time(&dry, &scenario_hoist()), 8.0));
    }

    #[test]
    fn test_sink_time() {
        let calc = PhysicsCalculator::default();
        // 2 + 450/100 + 50/25
        assert!(approx(calc.sink_time(&wet_station(), &scenario_hoist()), 8.5));
    }

    #[test]
    fn test_slow_distance_by_kind() {
        let calc = PhysicsCalculator::default();
        let mut hoist = scenario_hoist();
        hoist.vertical.slow_distance_dry = 100.0;
        let dry = Station::new(11, 0.0).with_kind(StationKind::Dry);
        // sink: 400/100 + 100/25
        assert!(approx(calc.sink_time(&dry, &hoist), 8.0));
    }

    #[test]
    fn test_horizontal_trapezoidal() {
        // ramp distance = 500 * 4 / 2 = 1000
        let t = horizontal_transfer_time(3000.0, 2.0, 2.0, 500.0).unwrap();
        assert!(approx(t, 8.0));
    }

    #[test]
    fn test_horizontal_triangular() {
        // peak 250 mm/s: 1 s up + 1 s down
        let t = horizontal_transfer_time(250.0, 2.0, 2.0, 500.0).unwrap();
        assert!(approx(t, 2.0));
    }

    #[test]
    fn test_horizontal_profiles_meet_at_ramp_distance() {
        let t = horizontal_transfer_time(1000.0, 2.0, 2.0, 500.0).unwrap();
        assert!(approx(t, 4.0));
        let just_below = horizontal_transfer_time(999.999, 2.0, 2.0, 500.0).unwrap();
        assert!((t - just_below).abs() < 1e-3);
    }

    #[test]
    fn test_horizontal_zero_distance() {
        assert_eq!(horizontal_transfer_time(0.0, 2.0, 2.0, 500.0), Some(0.0));
        let calc = PhysicsCalculator::default();
        let profile = HorizontalProfile::new(1.0, 1.0, 0.0);
        // zero distance needs no profile at all
        assert_eq!(calc.horizontal_time(0.0, &profile), 0.0);
    }

    #[test]
    fn test_horizontal_instant_acceleration() {
        let t = horizontal_transfer_time(1000.0, 0.0, 0.0, 250.0).unwrap();
        assert!(approx(t, 4.0));
    }

    #[test]
    fn test_fallback_on_zero_speed() {
        let calc = PhysicsCalculator::new(PhysicsConfig {
            fallback_duration: 12.0,
        });
        let mut hoist = scenario_hoist();
        hoist.horizontal.max_speed = 0.0;
        hoist.vertical.fast_speed = 0.0;

        let a = Station::new(10, 0.0);
        let b = Station::new(11, 2000.0);
        assert_eq!(calc.travel_time(&a, &b, &hoist), 12.0);
        assert_eq!(calc.lift_time(&a, &hoist), 12.0);
        assert_eq!(calc.sink_time(&b, &hoist), 12.0);
    }

    #[test]
    fn test_never_negative() {
        let calc = PhysicsCalculator::default();
        let mut hoist = scenario_hoist();
        // slow distances longer than the stroke
        hoist.vertical.slow_distance_wet = 900.0;
        hoist.vertical.slow_end_distance = 900.0;
        let st = Station::new(10, 0.0).with_device_delay(-3.0);
        assert!(calc.lift_time(&st, &hoist) >= 0.0);
        assert!(calc.sink_time(&st, &hoist) >= 0.0);
    }

    #[test]
    fn test_transfer_estimate_sums_phases() {
        let calc = PhysicsCalculator::default();
        let hoist = scenario_hoist().with_horizontal(HorizontalProfile::new(2.0, 2.0, 500.0));
        let a = wet_station();
        let b = Station::new(11, 3000.0).with_kind(StationKind::Dry);
        // lift 15 + travel 8 + dry sink (4.5 + 2)
        let expected = 15.0 + 8.0 + 6.5;
        assert!(approx(calc.transfer_estimate(&a, &b, &hoist), expected));
    }
}
