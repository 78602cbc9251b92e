use crate::filter::{NormalizedCoords, ZoomPointFn};
use std::sync::Arc;

/// No displacement: every pixel reads itself.
pub fn identity() -> ZoomPointFn {
    Arc::new(|coords| coords)
}

/// Pull every pixel toward (strength > 0) or away from (strength < 0) the
/// image centre.
pub fn pull_zoom(strength: f32) -> ZoomPointFn {
    Arc::new(move |coords: NormalizedCoords| coords * (1.0 - strength))
}

/// Sinusoidal ripple riding on a gentle inward zoom.
pub fn wave(freq: f32, amplitude: f32) -> ZoomPointFn {
    Arc::new(move |coords: NormalizedCoords| {
        let dist = coords.sq_distance_from_origin().sqrt();
        let offset = amplitude * (freq * dist).sin();
        coords * (1.0 - 0.02 - offset)
    })
}

/// Rotate each pixel about the centre by an angle growing with its radius.
pub fn swirl(twist: f32) -> ZoomPointFn {
    Arc::new(move |coords: NormalizedCoords| {
        let dist = coords.sq_distance_from_origin().sqrt();
        let angle = twist * dist;
        let (sin, cos) = angle.sin_cos();
        let zoomed = coords * 0.97;
        NormalizedCoords::new(
            zoomed.x * cos - zoomed.y * sin,
            zoomed.x * sin + zoomed.y * cos,
        )
    })
}

/// Picks the next displacement function when the orchestrator decides to
/// switch effects. Holds its own RNG so there is no process-wide random
/// state; construct once at startup and thread it through.
pub struct EffectPicker {
    rng: fastrand::Rng,
    last_kind: usize,
}

impl EffectPicker {
    const NUM_KINDS: usize = 3;

    pub fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            last_kind: usize::MAX,
        }
    }

    /// A fresh displacement function, never of the same kind twice in a
    /// row, with parameters scaled by how loud the audio currently is.
    pub fn pick(&mut self, intensity: f32) -> ZoomPointFn {
        let intensity = intensity.clamp(0.0, 1.0);
        let mut kind = self.rng.usize(0..Self::NUM_KINDS);
        if kind == self.last_kind {
            kind = (kind + 1) % Self::NUM_KINDS;
        }
        self.last_kind = kind;

        match kind {
            0 => {
                let strength = 0.01 + 0.05 * intensity + self.rng.f32() * 0.02;
                pull_zoom(strength)
            }
            1 => {
                let freq = 4.0 + self.rng.f32() * 10.0;
                let amplitude = 0.005 + 0.02 * intensity;
                wave(freq, amplitude)
            }
            _ => {
                let sign = if self.rng.bool() { 1.0 } else { -1.0 };
                let twist = sign * (0.1 + 0.5 * intensity + self.rng.f32() * 0.2);
                swirl(twist)
            }
        }
    }
}
