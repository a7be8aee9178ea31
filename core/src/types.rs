/// Single grid axis value, used for row and column indices.
pub type Coord = u8;

/// Count type wide enough for `rows * cols` on the largest board.
pub type CellCount = u16;

/// Grid position as `(row, col)`, origin at the top-left `(0, 0)`.
pub type Coord2 = (Coord, Coord);

pub trait ToNdIndex {
    type Output;
    fn to_nd_index(self) -> Self::Output;
}

impl ToNdIndex for Coord2 {
    type Output = [usize; 2];

    fn to_nd_index(self) -> Self::Output {
        [self.0.into(), self.1.into()]
    }
}

pub const fn mult(a: Coord, b: Coord) -> CellCount {
    (a as CellCount).saturating_mul(b as CellCount)
}

const DISPLACEMENTS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// The up-to-8 in-bounds neighbors of `center` on a `bounds.0 x bounds.1`
/// grid. Edge neighbors are simply absent, the grid does not wrap.
pub fn neighbors(center: Coord2, bounds: Coord2) -> impl Iterator<Item = Coord2> {
    DISPLACEMENTS.into_iter().filter_map(move |(dr, dc)| {
        let row = center.0.checked_add_signed(dr)?;
        let col = center.1.checked_add_signed(dc)?;
        (row < bounds.0 && col < bounds.1).then_some((row, col))
    })
}
