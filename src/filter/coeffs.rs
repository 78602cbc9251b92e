use crate::filter::coords::SUB_CELL_RES;

pub const NUM_NEIGHBOR_COEFFS: usize = 4;

/// Blend weights for the 2x2 pixel neighbourhood around a transform point.
/// Weights sum to at most 255 so a multiply-accumulate over four 8-bit
/// channels fits a `u32` and renormalizes with a single `>> 8`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoeffArray {
    pub weights: [u32; NUM_NEIGHBOR_COEFFS],
    /// True when the transform point lands exactly on a pixel: only the
    /// first weight is set, so callers can skip the neighbour fetch.
    pub is_on_cell: bool,
}

/// Precomputed bilinear-style weights for every sub-cell position. Built
/// once at startup and shared read-only by every frame.
pub struct FilterCoefficients {
    table: Vec<CoeffArray>,
}

impl FilterCoefficients {
    pub fn new() -> Self {
        let dim = SUB_CELL_RES as usize;
        let mut table = vec![CoeffArray::default(); dim * dim];
        for cx in 0..dim {
            for cy in 0..dim {
                table[cx * dim + cy] = Self::neighbor_coeffs(cx as u32, cy as u32);
            }
        }
        Self { table }
    }

    pub fn get(&self, coeff_x: usize, coeff_y: usize) -> CoeffArray {
        debug_assert!(coeff_x < SUB_CELL_RES as usize && coeff_y < SUB_CELL_RES as usize);
        self.table[coeff_x * SUB_CELL_RES as usize + coeff_y]
    }

    fn neighbor_coeffs(coeff_x: u32, coeff_y: u32) -> CoeffArray {
        if coeff_x == 0 && coeff_y == 0 {
            // Exactly on a pixel: all the weight goes to the top-left
            // neighbour.
            return CoeffArray {
                weights: [255, 0, 0, 0],
                is_on_cell: true,
            };
        }

        let dim = SUB_CELL_RES as u32;
        let diff_x = dim - coeff_x;
        let diff_y = dim - coeff_y;

        // The four products sum to dim*dim = 256; knock one off each nonzero
        // weight so the total stays within 255.
        let trim = |w: u32| w.saturating_sub(1);
        CoeffArray {
            weights: [
                trim(diff_x * diff_y),
                trim(coeff_x * diff_y),
                trim(diff_x * coeff_y),
                trim(coeff_x * coeff_y),
            ],
            is_on_cell: false,
        }
    }
}

impl Default for FilterCoefficients {
    fn default() -> Self {
        Self::new()
    }
}
