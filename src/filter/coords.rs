use std::ops::{Add, Mul, Sub};

/// Max absolute value of a normalized coordinate.
///
/// IMPORTANT: displacement functions implicitly depend on this being 2.0;
/// the fixed-point constants below are derived from the same grid.
pub const MAX_NORMALIZED_COORD: f32 = 2.0;
pub const MIN_NORMALIZED_COORD: f32 = -MAX_NORMALIZED_COORD;
pub const NORMALIZED_COORD_WIDTH: f32 = MAX_NORMALIZED_COORD - MIN_NORMALIZED_COORD;

/// Sub-cell grid resolution of transform space. One screen pixel spans
/// `SUB_CELL_RES` transform units, so the low-order bits of a transform
/// coordinate index the coefficient table directly.
pub const SUB_CELL_RES: i32 = 16;
pub const SUB_CELL_DIV_SHIFT: u32 = 4;
pub const SUB_CELL_MOD_MASK: i32 = 0xF;

/// A coordinate in the normalized space displacement functions work in:
/// a symmetric range centred on the image midpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalizedCoords {
    pub x: f32,
    pub y: f32,
}

impl NormalizedCoords {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn sq_distance_from_origin(self) -> f32 {
        self.x * self.x + self.y * self.y
    }
}

impl Add for NormalizedCoords {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for NormalizedCoords {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for NormalizedCoords {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// An integer point in fixed-point transform space: screen pixels scaled by
/// `SUB_CELL_RES`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TranPoint {
    pub x: i32,
    pub y: i32,
}

/// Screen pixel coordinates recovered from a `TranPoint` (high bits).
pub fn tran_to_screen(p: TranPoint) -> (i32, i32) {
    (p.x >> SUB_CELL_DIV_SHIFT, p.y >> SUB_CELL_DIV_SHIFT)
}

/// Low-order bits of a transform coordinate, used as a coefficient-table
/// index.
pub fn tran_to_coeff_index(tran_coord: i32) -> usize {
    (tran_coord & SUB_CELL_MOD_MASK) as usize
}

pub fn screen_to_tran(x: i32, y: i32) -> TranPoint {
    TranPoint {
        x: x << SUB_CELL_DIV_SHIFT,
        y: y << SUB_CELL_DIV_SHIFT,
    }
}

/// Pure linear map between screen pixels and normalized coordinates, plus
/// the quantizing step down to transform space. Built once per session from
/// the image dimensions; every component shares the same instance so the
/// conversions stay bit-for-bit consistent.
#[derive(Clone, Copy, Debug)]
pub struct CoordConverter {
    ratio_screen_to_normalized: f32,
    ratio_normalized_to_screen: f32,
}

impl CoordConverter {
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 1 && height > 1, "image must be at least 2x2");
        let span = (width - 1) as f32;
        Self {
            ratio_screen_to_normalized: NORMALIZED_COORD_WIDTH / span,
            ratio_normalized_to_screen: span / NORMALIZED_COORD_WIDTH,
        }
    }

    pub fn screen_to_normalized(&self, x: i32, y: i32) -> NormalizedCoords {
        NormalizedCoords::new(
            MIN_NORMALIZED_COORD + self.ratio_screen_to_normalized * x as f32,
            MIN_NORMALIZED_COORD + self.ratio_screen_to_normalized * y as f32,
        )
    }

    pub fn normalized_to_tran(&self, coords: NormalizedCoords) -> TranPoint {
        // IMPORTANT: round to nearest. Truncating here leaves a faint cross
        // artifact at the centre of the image.
        let screen_x = (coords.x - MIN_NORMALIZED_COORD) * self.ratio_normalized_to_screen;
        let screen_y = (coords.y - MIN_NORMALIZED_COORD) * self.ratio_normalized_to_screen;
        TranPoint {
            x: (screen_x * SUB_CELL_RES as f32).round() as i32,
            y: (screen_y * SUB_CELL_RES as f32).round() as i32,
        }
    }
}
