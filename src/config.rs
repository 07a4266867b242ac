//! Pipeline settings.
//!
//! All settings have defaults, so an empty JSON object is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub scheduler: SchedulerConfig,
    pub physics: PhysicsConfig,
    pub avoidance: AvoidanceConfig,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Which scheduling strategy to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Constraint model solved by a [`CpSolver`](crate::cp::CpSolver).
    #[default]
    Constraint,
    /// Order / stretch / resolve heuristic.
    Greedy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub strategy: StrategyKind,
    /// Wall-clock budget per solver run (ms).
    pub time_limit_ms: u64,
    /// Local-search iteration cap for free-order solving.
    pub max_iterations: usize,
    /// Seed of the order search.
    pub seed: u64,
}

impl SchedulerConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Constraint,
            time_limit_ms: 10_000,
            max_iterations: 2_000,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Duration used when a motion profile is unusable (s).
    pub fallback_duration: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            fallback_duration: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidanceConfig {
    pub enabled: bool,
    /// Idles must be strictly longer than this to be split (s).
    pub min_idle_for_avoid: f64,
    /// Explicit shared-zone bounds per transporter pair, keyed `"a-b"`
    /// with `a < b`.
    pub common_zones: HashMap<String, (u32, u32)>,
    /// Seconds per mm used when the hoist profile is unusable.
    pub fallback_secs_per_mm: f64,
}

impl AvoidanceConfig {
    /// Explicit zone for a transporter pair, in either order.
    pub fn zone_for(&self, a: u32, b: u32) -> Option<(u32, u32)> {
        let key = format!("{}-{}", a.min(b), a.max(b));
        self.common_zones.get(&key).copied()
    }

    pub fn with_zone(mut self, a: u32, b: u32, bounds: (u32, u32)) -> Self {
        self.common_zones
            .insert(format!("{}-{}", a.min(b), a.max(b)), bounds);
        self
    }
}

impl Default for AvoidanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_idle_for_avoid: 65.0,
            common_zones: HashMap::new(),
            fallback_secs_per_mm: 0.01,
        }
    }
}
