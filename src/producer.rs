use crate::audio::{SampleBatch, BATCH_SAMPLE_LEN};
use crate::effects::EffectPicker;
use crate::filter::{SourcePointInfo, ZoomFilterBuffers, MAX_TRAN_LERP};
use crate::pipeline::SlotProducerConsumer;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const BYTES_PER_PIXEL: usize = 4;

/// Colour substituted when the blended transform point had to be clamped.
const CLIP_FALLBACK: [u8; 4] = [0, 0, 0, 255];

/// Reusable per-slot RGBA frame storage, shared between the producer (which
/// fills exactly one slot at a time) and the render side (which reads a
/// different, already-published slot).
pub type SlotFrames = Arc<Vec<Mutex<Vec<u8>>>>;

pub fn make_slot_frames(num_slots: usize, width: usize, height: usize) -> SlotFrames {
    Arc::new(
        (0..num_slots)
            .map(|_| Mutex::new(vec![0u8; width * height * BYTES_PER_PIXEL]))
            .collect(),
    )
}

/// Drives one full frame per audio batch: ticks the displacement engine,
/// warps the previous frame's pixels through the blended field, and paints
/// the audio waveform on top as the feedback stimulus.
///
/// Owned by the producer thread; nothing here is shared except the slot
/// frames and the effect-switch flag.
pub struct FrameProducer {
    width: usize,
    height: usize,
    engine: ZoomFilterBuffers,
    effects: EffectPicker,
    slots: SlotFrames,
    prev_frame: Vec<u8>,
    base_lerp_increment: i32,
    frames_between_switches: u64,
    frames_since_switch: u64,
    force_switch: Arc<AtomicBool>,
    smoothed_volume: f32,
}

impl FrameProducer {
    pub fn new(
        mut engine: ZoomFilterBuffers,
        effects: EffectPicker,
        slots: SlotFrames,
        base_lerp_increment: i32,
        frames_between_switches: u64,
        force_switch: Arc<AtomicBool>,
    ) -> Self {
        assert!(base_lerp_increment > 0);
        let width = engine.width();
        let height = engine.height();
        engine.start();
        let mut prev_frame = vec![0u8; width * height * BYTES_PER_PIXEL];
        for px in prev_frame.chunks_exact_mut(BYTES_PER_PIXEL) {
            px[3] = 255;
        }
        Self {
            width,
            height,
            engine,
            effects,
            slots,
            prev_frame,
            base_lerp_increment,
            frames_between_switches,
            frames_since_switch: 0,
            force_switch,
            smoothed_volume: 0.0,
        }
    }

    pub fn engine(&self) -> &ZoomFilterBuffers {
        &self.engine
    }

    /// Producer thread entry point: loops until the pipeline shuts down.
    pub fn run(mut self, pipeline: Arc<SlotProducerConsumer<SampleBatch>>) {
        loop {
            let keep_going = pipeline.produce(|slot, batch| self.produce_frame(slot, &batch));
            if !keep_going {
                break;
            }
        }
    }

    /// Compute one complete frame into `slot`. Runs outside the pipeline
    /// lock; the slot is published to the consumer only after this returns.
    pub fn produce_frame(&mut self, slot: usize, batch: &SampleBatch) {
        let volume = batch.volume();
        self.smoothed_volume = 0.8 * self.smoothed_volume + 0.2 * volume;

        self.frames_since_switch += 1;
        let switch_due = self.frames_between_switches > 0
            && self.frames_since_switch >= self.frames_between_switches;
        if self.force_switch.swap(false, Ordering::AcqRel) || switch_due {
            let zoom_fn = self.effects.pick(self.smoothed_volume * 4.0);
            self.engine.request_new_settings(zoom_fn);
            self.frames_since_switch = 0;
        }

        // Louder audio settles a newly built field faster.
        let drive = 1.0 + 8.0 * self.smoothed_volume;
        let increment =
            ((self.base_lerp_increment as f32 * drive) as i32).clamp(1, MAX_TRAN_LERP);
        self.engine.update(increment);

        let mut frame = self.slots[slot].lock().unwrap();
        debug_assert_eq!(frame.len(), self.prev_frame.len());
        warp_frame(&self.engine, &self.prev_frame, &mut frame);
        if volume > 1e-4 {
            draw_stimulus(&mut frame, self.width, self.height, batch, self.smoothed_volume);
        }
        self.prev_frame.copy_from_slice(&frame);
    }
}

/// Remap every destination pixel of `out` from `prev` through the engine's
/// blended displacement field, neighbour-weighted by the coefficient table.
fn warp_frame(engine: &ZoomFilterBuffers, prev: &[u8], out: &mut [u8]) {
    let width = engine.width();
    let height = engine.height();

    out.par_chunks_mut(width * BYTES_PER_PIXEL)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                let info = engine.source_point_info(y * width + x);
                let color = if info.is_clipped {
                    CLIP_FALLBACK
                } else {
                    fetch_neighbor_blend(prev, width, height, &info)
                };
                row[x * BYTES_PER_PIXEL..(x + 1) * BYTES_PER_PIXEL].copy_from_slice(&color);
            }
        });
}

fn fetch_neighbor_blend(
    prev: &[u8],
    width: usize,
    height: usize,
    info: &SourcePointInfo,
) -> [u8; 4] {
    let x0 = info.screen_x as usize;
    let y0 = info.screen_y as usize;
    debug_assert!(x0 < width && y0 < height);

    if info.coeffs.is_on_cell {
        let i = (y0 * width + x0) * BYTES_PER_PIXEL;
        return [prev[i], prev[i + 1], prev[i + 2], 255];
    }

    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let idx = [
        (y0 * width + x0) * BYTES_PER_PIXEL,
        (y0 * width + x1) * BYTES_PER_PIXEL,
        (y1 * width + x0) * BYTES_PER_PIXEL,
        (y1 * width + x1) * BYTES_PER_PIXEL,
    ];

    let mut acc = [0u32; 3];
    for (w, i) in info.coeffs.weights.iter().zip(idx) {
        acc[0] += w * u32::from(prev[i]);
        acc[1] += w * u32::from(prev[i + 1]);
        acc[2] += w * u32::from(prev[i + 2]);
    }
    // Weights sum to at most 255, so >> 8 renormalizes.
    [
        (acc[0] >> 8) as u8,
        (acc[1] >> 8) as u8,
        (acc[2] >> 8) as u8,
        255,
    ]
}

/// Paint the audio waveform into the frame so the warp has something to
/// feed back on. Channel colours diverge so stereo motion reads visually.
fn draw_stimulus(frame: &mut [u8], width: usize, height: usize, batch: &SampleBatch, level: f32) {
    let gain = (0.35 + 3.0 * level).min(1.0);
    let colors: [[f32; 3]; 2] = [[80.0, 255.0, 200.0], [255.0, 90.0, 230.0]];

    for (ch, samples) in batch.channels.iter().enumerate() {
        let color = colors[ch % colors.len()];
        for (i, sample) in samples.iter().enumerate() {
            let x = i * width / BATCH_SAMPLE_LEN;
            let offset = (sample.clamp(-1.0, 1.0) * height as f32 * 0.3) as i32;
            let y = (height as i32 / 2 + offset).clamp(0, height as i32 - 1) as usize;
            let p = (y * width + x) * BYTES_PER_PIXEL;
            frame[p] = frame[p].max((color[0] * gain) as u8);
            frame[p + 1] = frame[p + 1].max((color[1] * gain) as u8);
            frame[p + 2] = frame[p + 2].max((color[2] * gain) as u8);
            frame[p + 3] = 255;
        }
    }
}
