use std::collections::VecDeque;

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    CellCount, CellState, CellUpdate, CellView, Coord2, FlagOutcome, GameError, Minefield,
    OpenOutcome, Result, ToNdIndex,
};

/// One level's board: the mine layout plus the player-visible cell grid and
/// the reveal/flag/chord protocol that mutates it.
///
/// Every mutation appends a [`CellUpdate`] to the caller's buffer so a
/// rendering layer can repaint exactly the cells that changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameBoard {
    minefield: Minefield,
    grid: Array2<CellState>,
    revealed_count: CellCount,
    flagged_count: CellCount,
    exploded: Option<Coord2>,
}

impl GameBoard {
    pub fn new(minefield: Minefield) -> Self {
        let size = minefield.size();
        Self {
            minefield,
            grid: Array2::default(size.to_nd_index()),
            revealed_count: 0,
            flagged_count: 0,
            exploded: None,
        }
    }

    pub fn size(&self) -> Coord2 {
        self.minefield.size()
    }

    pub fn total_mines(&self) -> CellCount {
        self.minefield.mine_count()
    }

    pub fn revealed_count(&self) -> CellCount {
        self.revealed_count
    }

    pub fn flagged_count(&self) -> CellCount {
        self.flagged_count
    }

    /// Mines not yet accounted for by a flag; negative when overflagged.
    pub fn mines_left(&self) -> i32 {
        i32::from(self.minefield.mine_count()) - i32::from(self.flagged_count)
    }

    pub fn cell(&self, coords: Coord2) -> CellState {
        self.grid[coords.to_nd_index()]
    }

    pub fn has_mine_at(&self, coords: Coord2) -> bool {
        self.minefield.contains_mine(coords)
    }

    /// The mine that ended the game, if any.
    pub fn exploded(&self) -> Option<Coord2> {
        self.exploded
    }

    /// Win is exactly every non-mine cell revealed.
    pub fn is_won(&self) -> bool {
        self.revealed_count == self.minefield.safe_cell_count()
    }

    pub fn view(&self, coords: Coord2) -> CellView {
        match self.cell(coords) {
            CellState::Hidden => CellView::Hidden,
            CellState::Flagged => CellView::Flagged,
            CellState::Open(_) if self.minefield.contains_mine(coords) => CellView::Mine,
            CellState::Open(count) => CellView::Open(count),
        }
    }

    /// Hidden -> Flagged and back. A no-op on revealed cells.
    pub fn toggle_flag(
        &mut self,
        coords: Coord2,
        updates: &mut Vec<CellUpdate>,
    ) -> Result<FlagOutcome> {
        let coords = self.minefield.validate_coords(coords)?;
        self.check_live()?;

        Ok(match self.cell(coords) {
            CellState::Hidden => {
                self.set_cell(coords, CellState::Flagged, updates);
                self.flagged_count += 1;
                FlagOutcome::Toggled
            }
            CellState::Flagged => {
                self.set_cell(coords, CellState::Hidden, updates);
                self.flagged_count -= 1;
                FlagOutcome::Toggled
            }
            CellState::Open(_) => FlagOutcome::Unchanged,
        })
    }

    /// Opens a hidden cell. The very first open of a board can never hit a
    /// mine: the mine is relocated before the reveal is evaluated.
    pub fn open(
        &mut self,
        coords: Coord2,
        rng: &mut impl Rng,
        updates: &mut Vec<CellUpdate>,
    ) -> Result<OpenOutcome> {
        let coords = self.minefield.validate_coords(coords)?;
        self.check_live()?;

        if !self.cell(coords).is_hidden() {
            return Ok(OpenOutcome::Unchanged);
        }

        if self.revealed_count == 0 && self.minefield.contains_mine(coords) {
            self.minefield.relocate_mine(coords, rng);
        }

        Ok(self.open_cell(coords, updates))
    }

    /// Opens every hidden, unflagged neighbor of a satisfied numbered cell:
    /// legal only when the cell shows a nonzero count equal to its flagged
    /// neighbors. Anything else is a no-op. A wrongly placed flag can make a
    /// chord open a mine, which loses the game.
    pub fn chord(&mut self, coords: Coord2, updates: &mut Vec<CellUpdate>) -> Result<OpenOutcome> {
        let coords = self.minefield.validate_coords(coords)?;
        self.check_live()?;

        match self.cell(coords) {
            CellState::Open(count)
                if count > 0 && count == self.count_flagged_neighbors(coords) =>
            {
                Ok(self
                    .minefield
                    .iter_neighbors(coords)
                    .map(|neighbor| self.open_cell(neighbor, updates))
                    .reduce(std::ops::BitOr::bitor)
                    .unwrap_or(OpenOutcome::Unchanged))
            }
            _ => Ok(OpenOutcome::Unchanged),
        }
    }

    /// Flips every mine face-up for the loss display.
    pub fn reveal_mines(&mut self, updates: &mut Vec<CellUpdate>) {
        let (rows, cols) = self.size();
        for row in 0..rows {
            for col in 0..cols {
                let coords = (row, col);
                if self.minefield.contains_mine(coords) && !self.cell(coords).is_open() {
                    if self.cell(coords) == CellState::Flagged {
                        self.flagged_count -= 1;
                    }
                    self.set_cell(coords, CellState::Open(0), updates);
                }
            }
        }
    }

    /// Reveal of one cell plus the zero-region flood fill. Flagged and
    /// already-open cells are skipped, so each cell is opened at most once
    /// and the fill terminates after at most `rows * cols` visits.
    fn open_cell(&mut self, coords: Coord2, updates: &mut Vec<CellUpdate>) -> OpenOutcome {
        if !self.cell(coords).is_hidden() {
            return OpenOutcome::Unchanged;
        }

        if self.minefield.contains_mine(coords) {
            self.exploded = Some(coords);
            self.set_cell(coords, CellState::Open(0), updates);
            return OpenOutcome::Exploded;
        }

        let count = self.reveal_safe(coords, updates);

        if count == 0 {
            // Worklist instead of recursion: deep zero regions must not be
            // bounded by the call stack.
            let mut to_visit: VecDeque<Coord2> = self.hidden_safe_neighbors(coords).collect();

            while let Some(visit) = to_visit.pop_front() {
                if !self.cell(visit).is_hidden() {
                    continue;
                }
                if self.reveal_safe(visit, updates) == 0 {
                    to_visit.extend(self.hidden_safe_neighbors(visit));
                }
            }
        }

        if self.is_won() {
            OpenOutcome::Won
        } else {
            OpenOutcome::Opened
        }
    }

    /// Marks a known-safe cell open and reports its adjacency count.
    fn reveal_safe(&mut self, coords: Coord2, updates: &mut Vec<CellUpdate>) -> u8 {
        let count = self.minefield.adjacent_mine_count(coords);
        self.set_cell(coords, CellState::Open(count), updates);
        self.revealed_count += 1;
        count
    }

    fn hidden_safe_neighbors(&self, coords: Coord2) -> impl Iterator<Item = Coord2> + use<> {
        let candidates: Vec<_> = self
            .minefield
            .iter_neighbors(coords)
            .filter(|&pos| self.cell(pos).is_hidden() && !self.minefield.contains_mine(pos))
            .collect();
        candidates.into_iter()
    }

    fn count_flagged_neighbors(&self, coords: Coord2) -> u8 {
        self.minefield
            .iter_neighbors(coords)
            .filter(|&pos| self.cell(pos) == CellState::Flagged)
            .count()
            .try_into()
            .unwrap()
    }

    fn set_cell(&mut self, coords: Coord2, state: CellState, updates: &mut Vec<CellUpdate>) {
        self.grid[coords.to_nd_index()] = state;
        updates.push(CellUpdate {
            coords,
            view: self.view(coords),
        });
    }

    fn check_live(&self) -> Result<()> {
        if self.exploded.is_some() || self.is_won() {
            Err(GameError::AlreadyEnded)
        } else {
            Ok(())
        }
    }
}
