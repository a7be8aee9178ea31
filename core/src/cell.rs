use serde::{Deserialize, Serialize};

use crate::Coord2;

/// Per-cell state as stored on the board. `Open` carries the adjacent mine
/// count; a cell is never both open and flagged by construction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    #[default]
    Hidden,
    Flagged,
    Open(u8),
}

impl CellState {
    pub const fn is_hidden(self) -> bool {
        matches!(self, Self::Hidden)
    }

    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open(_))
    }
}

/// Visual state carried by change notifications. Unlike [`CellState`] this
/// distinguishes an opened mine; whether a cell holds a mine otherwise stays
/// in the [`Minefield`](crate::Minefield) mask.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellView {
    Hidden,
    Flagged,
    Open(u8),
    Mine,
}

/// One cell mutation, in the order it happened.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellUpdate {
    pub coords: Coord2,
    pub view: CellView,
}
