use serde::{Deserialize, Serialize};

use crate::{mult, CellCount, Coord, GameError, Result};

const MAX_ROWS: Coord = 16;
const MAX_COLS: Coord = 12;
const MINE_RATIO_STEP: f64 = 0.02;
const MAX_MINE_RATIO: f64 = 0.24;

/// Board parameters for one difficulty level.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub rows: Coord,
    pub cols: Coord,
    pub mine_ratio: f64,
}

impl LevelConfig {
    /// Fixed starting configuration. Portrait-leaning: more rows than columns.
    pub const fn initial() -> Self {
        Self {
            rows: 10,
            cols: 8,
            mine_ratio: 0.12,
        }
    }

    /// The next, harder configuration. Each dimension grows by at most one
    /// per step and saturates at its cap; columns only catch up on steps
    /// where the grown row count is even, keeping the board tall. The mine
    /// ratio climbs in fixed increments up to its cap, so the sequence never
    /// shrinks and never becomes unbuildable.
    pub fn next(self) -> Self {
        let rows = if self.rows < MAX_ROWS {
            self.rows + 1
        } else {
            self.rows
        };
        let cols = if self.cols < MAX_COLS && rows % 2 == 0 {
            self.cols + 1
        } else {
            self.cols
        };
        let mine_ratio = round_to_percent(self.mine_ratio + MINE_RATIO_STEP).min(MAX_MINE_RATIO);
        Self {
            rows,
            cols,
            mine_ratio,
        }
    }

    pub const fn total_cells(&self) -> CellCount {
        mult(self.rows, self.cols)
    }

    /// Mines for this configuration: `floor(rows * cols * mine_ratio)`,
    /// clamped to at least one.
    pub fn mine_count(&self) -> CellCount {
        let raw = (f64::from(self.total_cells()) * self.mine_ratio).floor() as CellCount;
        raw.max(1)
    }

    /// A buildable configuration has positive dimensions and leaves at least
    /// one safe cell. The level step keeps every produced configuration
    /// buildable; a violation is a caller bug, not a runtime condition.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 || self.mine_count() >= self.total_cells() {
            Err(GameError::TooManyMines)
        } else {
            Ok(())
        }
    }
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self::initial()
    }
}

/// Keeps the accumulated ratio at two decimals, as the step increments are.
fn round_to_percent(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
