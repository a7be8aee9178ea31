use std::ops::{BitOr, Index, IndexMut};

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use cell::*;
pub use engine::*;
pub use error::*;
pub use generator::*;
pub use levels::*;
pub use session::*;
pub use types::*;

mod cell;
mod engine;
mod error;
mod generator;
mod levels;
mod session;
mod types;

/// Where the mines are. The player-visible cell grid lives in [`GameBoard`];
/// this mask is the ground truth that every adjacency query derives from, so
/// a mine relocation is reflected everywhere without a recompute pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Minefield {
    mine_mask: Array2<bool>,
    mine_count: CellCount,
}

impl Minefield {
    pub fn from_mine_mask(mine_mask: Array2<bool>) -> Self {
        let mine_count = mine_mask
            .iter()
            .filter(|&&is_mine| is_mine)
            .count()
            .try_into()
            .unwrap();
        Self {
            mine_mask,
            mine_count,
        }
    }

    pub fn from_mine_coords(size: Coord2, mine_coords: &[Coord2]) -> Result<Self> {
        let mut mine_mask: Array2<bool> = Array2::default(size.to_nd_index());

        for &coords in mine_coords {
            if coords.0 >= size.0 || coords.1 >= size.1 {
                return Err(GameError::InvalidCoords);
            }
            mine_mask[coords.to_nd_index()] = true;
        }

        Ok(Self::from_mine_mask(mine_mask))
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        let size = self.size();
        if coords.0 < size.0 && coords.1 < size.1 {
            Ok(coords)
        } else {
            Err(GameError::InvalidCoords)
        }
    }

    pub fn size(&self) -> Coord2 {
        let dim = self.mine_mask.dim();
        (dim.0.try_into().unwrap(), dim.1.try_into().unwrap())
    }

    pub fn total_cells(&self) -> CellCount {
        self.mine_mask.len().try_into().unwrap()
    }

    /// Cells the player has to reveal for a win.
    pub fn safe_cell_count(&self) -> CellCount {
        self.total_cells() - self.mine_count
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    pub fn contains_mine(&self, coords: Coord2) -> bool {
        self[coords]
    }

    /// Mines among the up-to-8 grid neighbors of `coords`. Meaningless for a
    /// mine cell itself and never displayed for one.
    pub fn adjacent_mine_count(&self, coords: Coord2) -> u8 {
        self.iter_neighbors(coords)
            .filter(|&pos| self[pos])
            .count()
            .try_into()
            .unwrap()
    }

    /// Moves the mine at `from` to a uniformly sampled non-mine cell.
    /// Backs the safe-first-click rule; the mine never lands back on `from`.
    pub fn relocate_mine(&mut self, from: Coord2, rng: &mut impl Rng) {
        debug_assert!(self[from], "relocate_mine called on a mine-free cell");

        let (rows, cols) = self.size();
        self[from] = false;
        loop {
            let to = (rng.random_range(0..rows), rng.random_range(0..cols));
            if to != from && !self[to] {
                self[to] = true;
                log::debug!("first-click mine moved from {from:?} to {to:?}");
                break;
            }
        }
    }

    pub(crate) fn iter_neighbors(&self, coords: Coord2) -> impl Iterator<Item = Coord2> + use<> {
        neighbors(coords, self.size())
    }
}

impl Index<Coord2> for Minefield {
    type Output = bool;

    fn index(&self, coords: Coord2) -> &Self::Output {
        &self.mine_mask[coords.to_nd_index()]
    }
}

impl IndexMut<Coord2> for Minefield {
    fn index_mut(&mut self, coords: Coord2) -> &mut Self::Output {
        &mut self.mine_mask[coords.to_nd_index()]
    }
}

/// Outcome of a flag toggle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlagOutcome {
    Unchanged,
    Toggled,
}

impl FlagOutcome {
    pub const fn has_update(self) -> bool {
        matches!(self, Self::Toggled)
    }
}

/// Outcome of opening one or more cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    Unchanged,
    Opened,
    Exploded,
    Won,
}

impl OpenOutcome {
    pub const fn has_update(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Merge for multi-cell opens (chords): an explosion anywhere dominates,
/// then a win, then any plain reveal.
impl BitOr for OpenOutcome {
    type Output = OpenOutcome;

    fn bitor(self, rhs: Self) -> Self::Output {
        use OpenOutcome::*;
        match (self, rhs) {
            (Exploded, _) | (_, Exploded) => Exploded,
            (Won, _) | (_, Won) => Won,
            (Opened, _) | (_, Opened) => Opened,
            (Unchanged, Unchanged) => Unchanged,
        }
    }
}
