mod buffers;
mod coeffs;
mod coords;

pub use buffers::{
    BufferState, SourcePointInfo, ZoomFilterBuffers, ZoomPointFn, MAX_TRAN_LERP,
};
pub use coeffs::{CoeffArray, FilterCoefficients, NUM_NEIGHBOR_COEFFS};
pub use coords::{
    screen_to_tran, tran_to_coeff_index, tran_to_screen, CoordConverter, NormalizedCoords,
    TranPoint, MAX_NORMALIZED_COORD, MIN_NORMALIZED_COORD, SUB_CELL_RES,
};
