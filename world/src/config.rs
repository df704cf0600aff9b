//! Tunable arena parameters shared by the world and its systems.

use std::time::Duration;

use grid_arena_core::IntentKind;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

const DEFAULT_COLUMNS: u32 = 8;
const DEFAULT_ROWS: u32 = 4;
const DEFAULT_TILE_LENGTH: f32 = 1.0;

/// Parameters that shape a single arena session.
///
/// Every field has a default so partial TOML documents are accepted. Durations
/// are written in milliseconds (`cracked_duration_ms = 4000`).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArenaConfig {
    /// Number of cell columns.
    pub columns: u32,
    /// Number of cell rows.
    pub rows: u32,
    /// Side length of a cell in world units.
    pub tile_length: f32,
    /// Time a cracked cell needs to repair itself.
    #[serde(rename = "cracked_duration_ms", deserialize_with = "millis")]
    pub cracked_duration: Duration,
    /// Time a broken cell needs to repair itself.
    #[serde(rename = "broken_duration_ms", deserialize_with = "millis")]
    pub broken_duration: Duration,
    /// Interpolation time of a voluntary step.
    #[serde(rename = "step_duration_ms", deserialize_with = "millis")]
    pub step_duration: Duration,
    /// Interpolation time of a pull.
    #[serde(rename = "pull_duration_ms", deserialize_with = "millis")]
    pub pull_duration: Duration,
    /// Interpolation time of a knockback.
    #[serde(rename = "knockback_duration_ms", deserialize_with = "millis")]
    pub knockback_duration: Duration,
    /// Time a stunned agent stays immobilised.
    #[serde(rename = "stun_duration_ms", deserialize_with = "millis")]
    pub stun_duration: Duration,
    /// Longest time a batch waits for agents to settle before resolving anyway.
    #[serde(rename = "quiescence_max_wait_ms", deserialize_with = "millis")]
    pub quiescence_max_wait: Duration,
}

impl ArenaConfig {
    /// Interpolation time used for the provided kind of displacement.
    #[must_use]
    pub fn motion_duration(&self, kind: IntentKind) -> Duration {
        match kind {
            IntentKind::Step => self.step_duration,
            IntentKind::Knockback => self.knockback_duration,
            IntentKind::Pull => self.pull_duration,
        }
    }

    /// Checks the relationships between fields that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns == 0 || self.rows == 0 {
            return Err(ConfigError::EmptyGrid {
                columns: self.columns,
                rows: self.rows,
            });
        }
        if !(self.tile_length.is_finite() && self.tile_length > 0.0) {
            return Err(ConfigError::InvalidTileLength(self.tile_length));
        }
        if self.broken_duration <= self.cracked_duration {
            return Err(ConfigError::RepairOrdering {
                cracked: self.cracked_duration,
                broken: self.broken_duration,
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
            tile_length: DEFAULT_TILE_LENGTH,
            cracked_duration: Duration::from_secs(5),
            broken_duration: Duration::from_secs(10),
            step_duration: Duration::from_millis(250),
            pull_duration: Duration::from_millis(300),
            knockback_duration: Duration::from_millis(200),
            stun_duration: Duration::from_secs(1),
            quiescence_max_wait: Duration::from_millis(1500),
        }
    }
}

/// Reasons an [`ArenaConfig`] is refused.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// One of the grid dimensions is zero.
    #[error("grid must have at least one cell, got {columns}x{rows}")]
    EmptyGrid {
        /// Configured columns.
        columns: u32,
        /// Configured rows.
        rows: u32,
    },
    /// The tile length is not a positive finite number.
    #[error("tile length must be positive, got {0}")]
    InvalidTileLength(f32),
    /// Broken cells must take longer to repair than cracked ones.
    #[error("broken repair ({broken:?}) must outlast cracked repair ({cracked:?})")]
    RepairOrdering {
        /// Configured cracked duration.
        cracked: Duration,
        /// Configured broken duration.
        broken: Duration,
    },
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}
