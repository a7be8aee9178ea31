use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::MinefieldGenerator;
use crate::{CellCount, LevelConfig, Minefield, ToNdIndex};

/// Purely random placement, reproducible for a given seed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RandomMinefieldGenerator {
    seed: u64,
}

impl RandomMinefieldGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl MinefieldGenerator for RandomMinefieldGenerator {
    fn generate(self, config: LevelConfig) -> Minefield {
        let mut rng = SmallRng::seed_from_u64(self.seed);
        generate_with(&mut rng, config)
    }
}

/// Places exactly `config.mine_count()` mines by sampling a `(row, col)` and
/// retrying on collision. Terminates because a valid configuration keeps the
/// mine count strictly below the cell count.
pub fn generate_with(rng: &mut impl Rng, config: LevelConfig) -> Minefield {
    config
        .validate()
        .expect("level policy must keep configurations buildable");

    let wanted = config.mine_count();
    let mut mine_mask: Array2<bool> =
        Array2::default([usize::from(config.rows), usize::from(config.cols)]);

    let mut placed: CellCount = 0;
    while placed < wanted {
        let coords = (
            rng.random_range(0..config.rows),
            rng.random_range(0..config.cols),
        );
        let slot = &mut mine_mask[coords.to_nd_index()];
        if !*slot {
            *slot = true;
            placed += 1;
        }
    }

    Minefield::from_mine_mask(mine_mask)
}
