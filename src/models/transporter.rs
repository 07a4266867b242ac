//! Transporter (hoist) model.
//!
//! A transporter lifts a batch from one station and sinks it at another.
//! It can only serve stations inside its operating ranges; a line with
//! several physical segments may give one hoist several ranges.
//!
//! # Units
//! Distances are millimetres, speeds mm/s, times seconds.

use serde::{Deserialize, Serialize};

/// One operating range of a transporter.
///
/// Lift and sink bounds may differ (e.g. a hoist that may drop at a
/// transfer station it never lifts from).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingRange {
    /// Lowest station it may lift from.
    pub lift_min: u32,
    /// Highest station it may lift from.
    pub lift_max: u32,
    /// Lowest station it may sink at.
    pub sink_min: u32,
    /// Highest station it may sink at.
    pub sink_max: u32,
}

impl OperatingRange {
    /// Same bounds for lifting and sinking.
    pub fn new(min_station: u32, max_station: u32) -> Self {
        Self {
            lift_min: min_station,
            lift_max: max_station,
            sink_min: min_station,
            sink_max: max_station,
        }
    }

    /// Separate lift and sink bounds.
    pub fn split(lift: (u32, u32), sink: (u32, u32)) -> Self {
        Self {
            lift_min: lift.0,
            lift_max: lift.1,
            sink_min: sink.0,
            sink_max: sink.1,
        }
    }

    #[inline]
    pub fn can_lift(&self, station: u32) -> bool {
        station >= self.lift_min && station <= self.lift_max
    }

    #[inline]
    pub fn can_sink(&self, station: u32) -> bool {
        station >= self.sink_min && station <= self.sink_max
    }

    /// Lowest and highest station touched by this range.
    pub fn span(&self) -> (u32, u32) {
        (
            self.lift_min.min(self.sink_min),
            self.lift_max.max(self.sink_max),
        )
    }
}

/// Horizontal motion profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizontalProfile {
    /// Time to reach full speed from standstill (s).
    pub accel_time: f64,
    /// Time to stop from full speed (s).
    pub decel_time: f64,
    /// Cruise speed (mm/s).
    pub max_speed: f64,
}

impl HorizontalProfile {
    pub fn new(accel_time: f64, decel_time: f64, max_speed: f64) -> Self {
        Self {
            accel_time,
            decel_time,
            max_speed,
        }
    }

    /// Whether the profile can be used for physics.
    pub fn is_usable(&self) -> bool {
        self.max_speed.is_finite()
            && self.max_speed > 0.0
            && self.accel_time.is_finite()
            && self.decel_time.is_finite()
            && self.accel_time >= 0.0
            && self.decel_time >= 0.0
    }
}

impl Default for HorizontalProfile {
    fn default() -> Self {
        Self::new(2.0, 2.0, 500.0)
    }
}

/// Vertical (lift/sink) motion profile.
///
/// A lift runs slow over the wet/dry slow distance, fast through the
/// middle, then slow over the slow-end distance. A sink runs fast first
/// and slow over the slow distance at the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalProfile {
    /// Full vertical stroke (mm).
    pub total_distance: f64,
    /// Slow-zone distance at a wet station (mm).
    pub slow_distance_wet: f64,
    /// Slow-zone distance at a dry station (mm).
    pub slow_distance_dry: f64,
    /// Slow distance at the top of a lift (mm).
    pub slow_end_distance: f64,
    /// Slow speed (mm/s).
    pub slow_speed: f64,
    /// Fast speed (mm/s).
    pub fast_speed: f64,
}

impl VerticalProfile {
    pub fn is_usable(&self) -> bool {
        self.slow_speed.is_finite()
            && self.fast_speed.is_finite()
            && self.slow_speed > 0.0
            && self.fast_speed > 0.0
    }
}

impl Default for VerticalProfile {
    fn default() -> Self {
        Self {
            total_distance: 1500.0,
            slow_distance_wet: 300.0,
            slow_distance_dry: 100.0,
            slow_end_distance: 100.0,
            slow_speed: 50.0,
            fast_speed: 200.0,
        }
    }
}

/// A transporter (hoist).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transporter {
    /// Transporter identifier.
    pub id: u32,
    /// Operating ranges, one per line segment.
    pub ranges: Vec<OperatingRange>,
    #[serde(default)]
    pub horizontal: HorizontalProfile,
    #[serde(default)]
    pub vertical: VerticalProfile,
    /// Home station; the hoist starts and ends here.
    pub start_station: u32,
    /// Minimum separation from other hoists (mm).
    #[serde(default)]
    pub avoid_distance: f64,
}

impl Transporter {
    /// Creates a transporter serving `[min_station, max_station]`.
    pub fn new(id: u32, min_station: u32, max_station: u32) -> Self {
        Self {
            id,
            ranges: vec![OperatingRange::new(min_station, max_station)],
            horizontal: HorizontalProfile::default(),
            vertical: VerticalProfile::default(),
            start_station: min_station,
            avoid_distance: 0.0,
        }
    }

    /// Replaces the operating ranges.
    pub fn with_ranges(mut self, ranges: Vec<OperatingRange>) -> Self {
        self.ranges = ranges;
        self
    }

    pub fn with_horizontal(mut self, profile: HorizontalProfile) -> Self {
        self.horizontal = profile;
        self
    }

    pub fn with_vertical(mut self, profile: VerticalProfile) -> Self {
        self.vertical = profile;
        self
    }

    pub fn with_start_station(mut self, station: u32) -> Self {
        self.start_station = station;
        self
    }

    pub fn with_avoid_distance(mut self, distance: f64) -> Self {
        self.avoid_distance = distance;
        self
    }

    /// Whether this transporter can lift at `from` and sink at `to`
    /// within a single operating range.
    pub fn covers(&self, from: u32, to: u32) -> bool {
        self.ranges.iter().any(|r| r.can_lift(from) && r.can_sink(to))
    }

    /// Whether the station lies anywhere in the transporter's reach.
    pub fn reaches(&self, station: u32) -> bool {
        let (lo, hi) = self.span();
        station >= lo && station <= hi
    }

    /// Lowest and highest station over all ranges.
    ///
    /// Returns `(u32::MAX, 0)` for a transporter without ranges.
    pub fn span(&self) -> (u32, u32) {
        self.ranges.iter().fold((u32::MAX, 0), |(lo, hi), r| {
            let (a, b) = r.span();
            (lo.min(a), hi.max(b))
        })
    }
}

/// First transporter, in declared priority order, that covers the pair.
pub fn capable_transporter(transporters: &[Transporter], from: u32, to: u32) -> Option<&Transporter> {
    transporters.iter().find(|t| t.covers(from, to))
}
