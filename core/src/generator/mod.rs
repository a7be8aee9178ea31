use crate::{LevelConfig, Minefield};

pub use random::*;

mod random;

/// Strategy for producing the mine layout of a fresh board.
pub trait MinefieldGenerator {
    fn generate(self, config: LevelConfig) -> Minefield;
}
