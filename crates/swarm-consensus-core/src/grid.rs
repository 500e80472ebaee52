//! Colour field the swarm forages over.
//!
//! Cells are drawn i.i.d. from a categorical distribution; the grid is never
//! edited in place, only regenerated wholesale when the distribution changes.

use crate::config::SimConfigError;
use crate::constants::{DISTRIBUTION_SUM_TOLERANCE, MAX_COLOURS};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

/// Colour identifier. Real colours are `1..=K`; 0 is reserved for "no colour / uncommitted".
pub type Colour = u8;

/// Validated probability vector over colours; index `i` holds the probability of colour `i + 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct ColourDistribution {
    probabilities: Vec<f64>,
    sampler: WeightedIndex<f64>,
}

impl ColourDistribution {
    pub fn new(probabilities: Vec<f64>) -> Result<Self, SimConfigError> {
        if probabilities.is_empty() {
            return Err(SimConfigError::EmptyColourDistribution);
        }
        if probabilities.len() > MAX_COLOURS {
            return Err(SimConfigError::TooManyColours {
                max: MAX_COLOURS,
                actual: probabilities.len(),
            });
        }
        if !probabilities
            .iter()
            .all(|p| p.is_finite() && (0.0..=1.0).contains(p))
        {
            return Err(SimConfigError::InvalidColourProbability);
        }
        let sum: f64 = probabilities.iter().sum();
        if (sum - 1.0).abs() > DISTRIBUTION_SUM_TOLERANCE {
            return Err(SimConfigError::ColourDistributionSum { sum });
        }
        let sampler = WeightedIndex::new(&probabilities)
            .map_err(|_| SimConfigError::InvalidColourProbability)?;
        Ok(Self {
            probabilities,
            sampler,
        })
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn colour_count(&self) -> usize {
        self.probabilities.len()
    }

    /// Probability of `colour`, or 0 for ids outside `1..=K`.
    pub fn probability(&self, colour: Colour) -> f64 {
        (colour as usize)
            .checked_sub(1)
            .and_then(|idx| self.probabilities.get(idx))
            .copied()
            .unwrap_or(0.0)
    }

    /// Colour with the highest probability; the lowest id wins ties.
    pub fn majority_colour(&self) -> Colour {
        let mut best = 0;
        for (idx, &p) in self.probabilities.iter().enumerate() {
            if p > self.probabilities[best] {
                best = idx;
            }
        }
        (best + 1) as Colour
    }

    /// Same distribution with `colour` holding `share` of the mass. The rest is
    /// spread over the other colours in proportion to their current weights
    /// (evenly if they currently hold none).
    pub fn with_share(&self, colour: Colour, share: f64) -> Result<Self, SimConfigError> {
        let k = self.colour_count();
        let target_idx = (colour as usize)
            .checked_sub(1)
            .filter(|idx| *idx < k)
            .ok_or(SimConfigError::InvalidColourProbability)?;
        if k == 1 {
            return Ok(self.clone());
        }
        let share = share.clamp(0.0, 1.0);
        let rest_before = 1.0 - self.probabilities[target_idx];
        let rest_after = 1.0 - share;
        let probabilities = self
            .probabilities
            .iter()
            .enumerate()
            .map(|(idx, &p)| {
                if idx == target_idx {
                    share
                } else if rest_before > 0.0 {
                    p / rest_before * rest_after
                } else {
                    rest_after / (k - 1) as f64
                }
            })
            .collect();
        Self::new(probabilities)
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Colour {
        (self.sampler.sample(rng) + 1) as Colour
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    /// Row-major: cell `(col, row)` lives at `row * width + col`.
    cells: Vec<Colour>,
}

impl Grid {
    /// Draw every cell independently from `distribution`.
    pub fn generate<R: Rng + ?Sized>(
        width: usize,
        height: usize,
        distribution: &ColourDistribution,
        rng: &mut R,
    ) -> Result<Self, SimConfigError> {
        if width == 0 || height == 0 {
            return Err(SimConfigError::InvalidGridSize);
        }
        let cells = (0..width * height)
            .map(|_| distribution.sample(rng))
            .collect();
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Exclusive upper bounds of continuous positions, `[width, height]`.
    pub fn bounds(&self) -> [f64; 2] {
        [self.width as f64, self.height as f64]
    }

    pub fn cells(&self) -> &[Colour] {
        &self.cells
    }

    pub fn cell(&self, col: usize, row: usize) -> Option<Colour> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.cells[row * self.width + col])
    }

    /// Rows from top (`row = 0`) to bottom, for renderers.
    pub fn rows(&self) -> impl Iterator<Item = &[Colour]> {
        self.cells.chunks_exact(self.width)
    }

    /// Colour of the cell containing `position`. Coordinates are clamped into
    /// the grid so rounding on the far edge still reads the last cell.
    pub fn colour_at(&self, position: [f64; 2]) -> Colour {
        let (col, row) = self.cell_index(position);
        self.cells[row * self.width + col]
    }

    /// Fraction of cells holding each colour; index `i` is colour `i + 1`.
    pub fn colour_proportions(&self, colours: usize) -> Vec<f64> {
        let mut counts = vec![0usize; colours];
        for &c in &self.cells {
            if let Some(slot) = (c as usize).checked_sub(1).and_then(|i| counts.get_mut(i)) {
                *slot += 1;
            }
        }
        let total = self.cells.len() as f64;
        counts.into_iter().map(|n| n as f64 / total).collect()
    }

    fn cell_index(&self, position: [f64; 2]) -> (usize, usize) {
        // `as usize` saturates negatives and NaN to 0.
        let col = (position[0].floor() as usize).min(self.width - 1);
        let row = (position[1].floor() as usize).min(self.height - 1);
        (col, row)
    }
}
