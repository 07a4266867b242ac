//! Precomputed transfer and move durations.
//!
//! Maps (transporter, from_station, to_station) → seconds. Used when the
//! line operator has measured durations that should override the physics
//! estimates.
//!
//! Two tables are kept:
//! - **transfers**: full loaded transfer (lift + travel + sink), used by
//!   the stage scheduler.
//! - **moves**: horizontal travel only, used by movement synthesis for the
//!   empty approach move.
//!
//! Only positive values are honoured; zero or negative entries behave as
//! if absent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One measured duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferEntry {
    pub transporter: u32,
    pub from: u32,
    pub to: u32,
    /// Duration (s).
    pub seconds: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TransferTableRepr {
    #[serde(default)]
    transfers: Vec<TransferEntry>,
    #[serde(default)]
    moves: Vec<TransferEntry>,
}

/// Lookup of measured transfer and move durations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "TransferTableRepr", into = "TransferTableRepr")]
pub struct TransferTable {
    transfers: HashMap<(u32, u32, u32), f64>,
    moves: HashMap<(u32, u32, u32), f64>,
}

impl From<TransferTableRepr> for TransferTable {
    fn from(repr: TransferTableRepr) -> Self {
        let mut table = Self::new();
        for e in repr.transfers {
            table.set_transfer(e.transporter, e.from, e.to, e.seconds);
        }
        for e in repr.moves {
            table.set_move(e.transporter, e.from, e.to, e.seconds);
        }
        table
    }
}

impl From<TransferTable> for TransferTableRepr {
    fn from(table: TransferTable) -> Self {
        let to_entries = |map: HashMap<(u32, u32, u32), f64>| {
            let mut entries: Vec<TransferEntry> = map
                .into_iter()
                .map(|((transporter, from, to), seconds)| TransferEntry {
                    transporter,
                    from,
                    to,
                    seconds,
                })
                .collect();
            entries.sort_by_key(|e| (e.transporter, e.from, e.to));
            entries
        };
        Self {
            transfers: to_entries(table.transfers),
            moves: to_entries(table.moves),
        }
    }
}

impl TransferTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a loaded transfer duration.
    pub fn set_transfer(&mut self, transporter: u32, from: u32, to: u32, seconds: f64) {
        self.transfers.insert((transporter, from, to), seconds);
    }

    /// Defines an empty horizontal move duration.
    pub fn set_move(&mut self, transporter: u32, from: u32, to: u32, seconds: f64) {
        self.moves.insert((transporter, from, to), seconds);
    }

    /// Builder: adds a transfer and returns self.
    pub fn with_transfer(mut self, transporter: u32, from: u32, to: u32, seconds: f64) -> Self {
        self.set_transfer(transporter, from, to, seconds);
        self
    }

    /// Builder: adds a move and returns self.
    pub fn with_move(mut self, transporter: u32, from: u32, to: u32, seconds: f64) -> Self {
        self.set_move(transporter, from, to, seconds);
        self
    }

    /// Measured loaded transfer, if present and positive.
    pub fn transfer(&self, transporter: u32, from: u32, to: u32) -> Option<f64> {
        positive(self.transfers.get(&(transporter, from, to)))
    }

    /// Measured empty move, if present and positive.
    pub fn movement(&self, transporter: u32, from: u32, to: u32) -> Option<f64> {
        positive(self.moves.get(&(transporter, from, to)))
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.transfers.len() + self.moves.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty() && self.moves.is_empty()
    }
}

fn positive(value: Option<&f64>) -> Option<f64> {
    value.copied().filter(|v| v.is_finite() && *v > 0.0)
}
