//! Station model.
//!
//! A station is a fixed processing slot on the line. Stations are ordered
//! by id along the line; `position` gives the physical coordinate used
//! for hoist travel. Stations sharing a `group` are interchangeable.

use serde::{Deserialize, Serialize};

/// Wet or dry station type.
///
/// Determines the slow-dip distance used by lift/sink timing and whether
/// a drain time applies after lifting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationKind {
    /// Liquid bath; lifting includes a drain time.
    #[default]
    Wet,
    /// Dry position (loading, unloading, drying oven).
    Dry,
}

/// A treatment station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    /// Station number (line order).
    pub id: u32,
    /// Coordinate along the line (mm).
    pub position: f64,
    /// Wet/dry classification.
    #[serde(default)]
    pub kind: StationKind,
    /// Fixed device delay added to every lift and sink (s).
    #[serde(default)]
    pub device_delay: f64,
    /// Drain time after lifting (s). Only used for wet stations.
    #[serde(default)]
    pub drain_time: f64,
    /// Parallel group id; 0 when the station belongs to no group.
    #[serde(default)]
    pub group: u32,
}

impl Station {
    /// Creates an ungrouped wet station at the given position.
    pub fn new(id: u32, position: f64) -> Self {
        Self {
            id,
            position,
            kind: StationKind::Wet,
            device_delay: 0.0,
            drain_time: 0.0,
            group: 0,
        }
    }

    /// Sets the station type.
    pub fn with_kind(mut self, kind: StationKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the device delay (s).
    pub fn with_device_delay(mut self, delay: f64) -> Self {
        self.device_delay = delay;
        self
    }

    /// Sets the drain time (s).
    pub fn with_drain_time(mut self, drain: f64) -> Self {
        self.drain_time = drain;
        self
    }

    /// Sets the parallel group.
    pub fn with_group(mut self, group: u32) -> Self {
        self.group = group;
        self
    }

    /// Whether this is a wet station.
    #[inline]
    pub fn is_wet(&self) -> bool {
        self.kind == StationKind::Wet
    }

    /// Drain time that actually applies (zero for dry stations).
    #[inline]
    pub fn effective_drain_time(&self) -> f64 {
        if self.is_wet() {
            self.drain_time.max(0.0)
        } else {
            0.0
        }
    }

    /// Horizontal distance to another station (mm).
    #[inline]
    pub fn distance_to(&self, other: &Station) -> f64 {
        (self.position - other.position).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_builder() {
        let st = Station::new(10, 1200.0)
            .with_device_delay(2.0)
            .with_drain_time(5.0)
            .with_group(3);

        assert_eq!(st.id, 10);
        assert_eq!(st.group, 3);
        assert!(st.is_wet());
        assert_eq!(st.effective_drain_time(), 5.0);
    }

    #[test]
    fn test_json_defaults_match_new() {
        let parsed: Station = serde_json::from_str(r#"{"id": 10, "position": 1200.0}"#).unwrap();
        let built = Station::new(10, 1200.0);
        assert_eq!(parsed.group, built.group);
        assert_eq!(parsed.kind, built.kind);
        assert_eq!(parsed.device_delay, built.device_delay);
        assert_eq!(parsed.drain_time, built.drain_time);
    }

    #[test]
    fn test_dry_station_has_no_drain() {
        let st = Station::new(11, 0.0)
            .with_kind(StationKind::Dry)
            .with_drain_time(5.0);
        assert_eq!(st.effective_drain_time(), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Station::new(1, 100.0);
        let b = Station::new(2, 1600.0);
        assert_eq!(a.distance_to(&b), 1500.0);
        assert_eq!(b.distance_to(&a), 1500.0);
    }

    #[test]
    fn test_kind_serde_lowercase() {
        let json = serde_json::to_string(&StationKind::Dry).unwrap();
        assert_eq!(json, "\"dry\"");
    }
}
