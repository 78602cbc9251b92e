use crate::filter::coeffs::{CoeffArray, FilterCoefficients};
use crate::filter::coords::{
    screen_to_tran, tran_to_coeff_index, tran_to_screen, CoordConverter, NormalizedCoords,
    TranPoint,
};
use rayon::prelude::*;
use std::sync::Arc;

/// A displacement function: where in normalized space a destination pixel
/// should fetch its colour from. Supplied by external effect-selection
/// logic; must be total and pure.
pub type ZoomPointFn = Arc<dyn Fn(NormalizedCoords) -> NormalizedCoords + Send + Sync>;

/// Max value of the lerp factor. A power of two so the fixed-point lerp is
/// exact at both ends of the blend (factor 0 reads the source buffer
/// bit-for-bit, factor max reads the destination buffer bit-for-bit).
pub const MAX_TRAN_LERP: i32 = 1 << 16;
const TRAN_LERP_SHIFT: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferState {
    /// No build in progress; the destination buffer holds the most recently
    /// completed field and is safe to lerp toward.
    Ready,
    /// The scratch buffer is being filled in stripes.
    Building,
}

/// Per-pixel answer for the renderer: which source pixel to read, the
/// neighbourhood blend weights, and whether the lerped coordinate had to be
/// clamped back into bounds.
#[derive(Clone, Copy, Debug)]
pub struct SourcePointInfo {
    pub screen_x: i32,
    pub screen_y: i32,
    pub coeffs: CoeffArray,
    pub is_clipped: bool,
}

/// The source/destination/scratch transform buffers plus the lerp factor
/// that blends them. Owned by `ZoomFilterBuffers`; nothing here is aware of
/// displacement functions or striping.
struct TransformBuffers {
    buffer_size: usize,
    max_tran: TranPoint,
    srce: Vec<TranPoint>,
    dest: Vec<TranPoint>,
    temp: Vec<TranPoint>,
    lerp_factor: i32,
}

impl TransformBuffers {
    fn new(width: usize, height: usize) -> Self {
        let buffer_size = width * height;
        Self {
            buffer_size,
            max_tran: screen_to_tran(width as i32 - 1, height as i32 - 1),
            srce: vec![TranPoint::default(); buffer_size],
            dest: vec![TranPoint::default(); buffer_size],
            temp: vec![TranPoint::default(); buffer_size],
            lerp_factor: 0,
        }
    }

    fn set_srce_to_identity(&mut self, width: usize) {
        for (i, p) in self.srce.iter_mut().enumerate() {
            let x = (i % width) as i32;
            let y = (i / width) as i32;
            *p = screen_to_tran(x, y);
        }
    }

    fn copy_temp_to_dest(&mut self) {
        self.dest.copy_from_slice(&self.temp);
    }

    /// Save the field a viewer is currently seeing into the source buffer.
    /// Mid-blend this is the lerped field, not the raw destination, so a
    /// settings change never jumps.
    fn copy_dest_to_srce(&mut self) {
        if self.lerp_factor == 0 {
            // srce is already what is on screen.
        } else if self.lerp_factor == MAX_TRAN_LERP {
            self.srce.copy_from_slice(&self.dest);
        } else {
            for i in 0..self.buffer_size {
                self.srce[i] = self.unclamped_lerp_point(i);
            }
        }
    }

    fn unclamped_lerp_point(&self, pos: usize) -> TranPoint {
        TranPoint {
            x: tran_lerp(self.srce[pos].x, self.dest[pos].x, self.lerp_factor),
            y: tran_lerp(self.srce[pos].y, self.dest[pos].y, self.lerp_factor),
        }
    }

    fn blended_point(&self, pos: usize) -> (TranPoint, bool) {
        let p = self.unclamped_lerp_point(pos);
        let mut clipped = false;
        let x = clamp_coord(p.x, self.max_tran.x, &mut clipped);
        let y = clamp_coord(p.y, self.max_tran.y, &mut clipped);
        (TranPoint { x, y }, clipped)
    }
}

fn tran_lerp(srce: i32, dest: i32, t: i32) -> i32 {
    srce + ((i64::from(t) * i64::from(dest - srce)) >> TRAN_LERP_SHIFT) as i32
}

fn clamp_coord(v: i32, max: i32, clipped: &mut bool) -> i32 {
    if v < 0 {
        *clipped = true;
        0
    } else if v > max {
        *clipped = true;
        max
    } else {
        v
    }
}

/// The displacement-field engine. Populates transform buffers from a
/// displacement function, a horizontal stripe at a time so the cost spreads
/// across frames, and blends the last settled field toward the newest
/// completed one by an integer lerp factor.
///
/// All mutation happens on the producer thread; the row loop inside a
/// stripe is the only internal parallelism.
pub struct ZoomFilterBuffers {
    width: usize,
    height: usize,
    converter: CoordConverter,
    coeffs: FilterCoefficients,
    zoom_fn: ZoomPointFn,
    pending_zoom_fn: Option<ZoomPointFn>,
    bufs: TransformBuffers,
    stripe_height: usize,
    stripe_y_start: usize,
    state: BufferState,
}

impl ZoomFilterBuffers {
    pub fn new(width: usize, height: usize, stripe_height: usize, zoom_fn: ZoomPointFn) -> Self {
        assert!(stripe_height > 0, "stripe height must be positive");
        Self {
            width,
            height,
            converter: CoordConverter::new(width, height),
            coeffs: FilterCoefficients::new(),
            zoom_fn,
            pending_zoom_fn: None,
            bufs: TransformBuffers::new(width, height),
            stripe_height,
            stripe_y_start: 0,
            state: BufferState::Ready,
        }
    }

    /// One-time initialisation: the source buffer becomes the identity
    /// mapping and the destination buffer is filled in a single pass with
    /// the current displacement function.
    pub fn start(&mut self) {
        self.bufs.set_srce_to_identity(self.width);
        self.stripe_y_start = 0;
        self.fill_stripe(self.height);
        self.stripe_y_start = 0;
        self.bufs.copy_temp_to_dest();
        self.bufs.lerp_factor = 0;
        self.state = BufferState::Ready;
    }

    /// Ask for a new displacement function. Picked up at the next tick with
    /// no build in progress, never applied to a half-built buffer; if called
    /// again before then, only the most recent request survives.
    pub fn request_new_settings(&mut self, zoom_fn: ZoomPointFn) {
        self.pending_zoom_fn = Some(zoom_fn);
    }

    pub fn have_settings_changed(&self) -> bool {
        self.pending_zoom_fn.is_some()
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn converter(&self) -> &CoordConverter {
        &self.converter
    }

    /// Next unprocessed row of the build in progress.
    pub fn stripe_y_start(&self) -> usize {
        self.stripe_y_start
    }

    pub fn lerp_factor(&self) -> i32 {
        self.bufs.lerp_factor
    }

    pub fn set_lerp_factor(&mut self, lerp_factor: i32) {
        assert!(
            (0..=MAX_TRAN_LERP).contains(&lerp_factor),
            "lerp factor out of range: {lerp_factor}"
        );
        self.bufs.lerp_factor = lerp_factor;
    }

    /// Per-frame tick, called once by the producer for every frame it
    /// computes. Advances the blend toward the destination field (saturating
    /// at max), then either progresses a build in progress by one stripe or
    /// starts the build for a pending settings change.
    pub fn update(&mut self, lerp_increment: i32) {
        debug_assert!(lerp_increment >= 0);
        self.bufs.lerp_factor = (self.bufs.lerp_factor + lerp_increment).min(MAX_TRAN_LERP);
        match self.state {
            BufferState::Building => {
                self.advance_stripe(self.stripe_height);
            }
            BufferState::Ready => {
                if let Some(zoom_fn) = self.pending_zoom_fn.take() {
                    self.zoom_fn = zoom_fn;
                    self.stripe_y_start = 0;
                    self.state = BufferState::Building;
                }
            }
        }
    }

    /// Fill the next `stripe_height` rows of the scratch buffer with the
    /// current displacement function. When the stripe cursor wraps, the
    /// field the viewer is seeing (mid-blend or not) is saved as the new
    /// source buffer, the completed scratch becomes the new destination, and
    /// the blend restarts from zero, so the handoff never jumps.
    pub fn advance_stripe(&mut self, stripe_height: usize) {
        debug_assert!(stripe_height > 0);
        debug_assert_eq!(self.state, BufferState::Building);
        self.fill_stripe(stripe_height);
        if self.stripe_y_start >= self.height {
            self.stripe_y_start = 0;
            self.bufs.copy_dest_to_srce();
            self.bufs.copy_temp_to_dest();
            self.bufs.lerp_factor = 0;
            self.state = BufferState::Ready;
        }
    }

    fn fill_stripe(&mut self, stripe_height: usize) {
        let y_start = self.stripe_y_start;
        let y_end = (y_start + stripe_height).min(self.height);
        if y_start >= y_end {
            return;
        }

        let width = self.width;
        let converter = self.converter;
        let zoom_fn = &self.zoom_fn;

        // Rows are independent: each one only reads the shared converter and
        // displacement function.
        self.bufs.temp[y_start * width..y_end * width]
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(row_idx, row)| {
                let y = (y_start + row_idx) as i32;
                for (x, out) in row.iter_mut().enumerate() {
                    let coords = converter.screen_to_normalized(x as i32, y);
                    let zoomed = (zoom_fn)(coords);
                    *out = converter.normalized_to_tran(zoomed);
                }
            });

        self.stripe_y_start = y_end;
    }

    /// The motion-blended transform point for one destination pixel,
    /// clamped into image bounds. Safe to call in any engine state.
    pub fn blended_sample(&self, pos: usize) -> (TranPoint, bool) {
        debug_assert!(pos < self.width * self.height);
        self.bufs.blended_point(pos)
    }

    /// Everything the renderer needs to fetch one destination pixel's
    /// colour: the source pixel, the neighbourhood weights, and the clip
    /// flag for substituting a fallback colour.
    pub fn source_point_info(&self, pos: usize) -> SourcePointInfo {
        let (tran_point, is_clipped) = self.blended_sample(pos);
        let (screen_x, screen_y) = tran_to_screen(tran_point);
        let coeffs = self.coeffs.get(
            tran_to_coeff_index(tran_point.x),
            tran_to_coeff_index(tran_point.y),
        );
        SourcePointInfo {
            screen_x,
            screen_y,
            coeffs,
            is_clipped,
        }
    }
}
