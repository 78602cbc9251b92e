use crate::pipeline::SlotProducerConsumer;
use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat};
use ringbuf::traits::{Consumer as _, Producer as _, Split as _};
use ringbuf::HeapRb;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const NUM_SAMPLE_CHANNELS: usize = 2;
pub const BATCH_SAMPLE_LEN: usize = 512;

/// One fixed-length multichannel batch of audio samples, queued between
/// capture and the frame producer.
#[derive(Clone)]
pub struct SampleBatch {
    pub channels: [[f32; BATCH_SAMPLE_LEN]; NUM_SAMPLE_CHANNELS],
}

impl Default for SampleBatch {
    fn default() -> Self {
        Self {
            channels: [[0.0; BATCH_SAMPLE_LEN]; NUM_SAMPLE_CHANNELS],
        }
    }
}

impl SampleBatch {
    /// Build a batch from a mono run of samples, mirrored to every channel.
    pub fn from_mono(samples: &[f32; BATCH_SAMPLE_LEN]) -> Self {
        let mut batch = Self::default();
        for channel in batch.channels.iter_mut() {
            channel.copy_from_slice(samples);
        }
        batch
    }

    /// Mean absolute amplitude across all channels, in [0, 1] for sanely
    /// captured audio.
    pub fn volume(&self) -> f32 {
        let mut acc = 0.0f32;
        for channel in &self.channels {
            for s in channel {
                acc += s.abs();
            }
        }
        acc / (NUM_SAMPLE_CHANNELS * BATCH_SAMPLE_LEN) as f32
    }
}

pub fn list_input_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let devices = host.input_devices().context("enumerate input devices")?;

    let mut out = io::stdout();
    writeln!(out, "Input devices:")?;
    for dev in devices {
        let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
        writeln!(out, "  - {}", name)?;
    }
    Ok(())
}

/// Captures microphone audio with cpal and feeds fixed-length batches into
/// the frame pipeline's resource queue. Batches that arrive while the queue
/// is full are dropped and counted, never blocked on.
pub struct AudioSystem {
    _stream: cpal::Stream,
    stop: Arc<AtomicBool>,
    batcher_handle: Option<thread::JoinHandle<()>>,
    dropped_batches: Arc<AtomicU64>,
    pub sample_rate_hz: u32,
}

impl AudioSystem {
    pub fn new(
        device_query: Option<&str>,
        pipeline: Arc<SlotProducerConsumer<SampleBatch>>,
    ) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = select_input_device(&host, device_query)?;
        let supported = device
            .default_input_config()
            .context("get default input config")?;
        let sample_rate_hz = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.clone().into();

        let rb_capacity = (sample_rate_hz as usize).saturating_mul(2);
        let rb = HeapRb::<f32>::new(rb_capacity);
        let (mut prod, mut cons) = rb.split();

        let stop = Arc::new(AtomicBool::new(false));
        let dropped_batches = Arc::new(AtomicU64::new(0));
        let stop_for_thread = Arc::clone(&stop);
        let dropped_for_thread = Arc::clone(&dropped_batches);

        let err_fn = |err| eprintln!("audio stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            fmt => return Err(anyhow!("unsupported sample format: {fmt:?}")),
        };

        stream.play().context("start input stream")?;

        let batcher_handle = thread::spawn(move || {
            batcher_loop(&mut cons, &pipeline, &stop_for_thread, &dropped_for_thread)
        });

        Ok(Self {
            _stream: stream,
            stop,
            batcher_handle: Some(batcher_handle),
            dropped_batches,
            sample_rate_hz,
        })
    }

    pub fn dropped_batches(&self) -> u64 {
        self.dropped_batches.load(Ordering::Relaxed)
    }
}

impl Drop for AudioSystem {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.batcher_handle.take() {
            let _ = h.join();
        }
    }
}

/// Assemble mono capture samples into fixed-length batches and hand them to
/// the pipeline; a full input queue means the batch is dropped and counted.
fn batcher_loop(
    cons: &mut ringbuf::HeapCons<f32>,
    pipeline: &SlotProducerConsumer<SampleBatch>,
    stop: &AtomicBool,
    dropped: &AtomicU64,
) {
    let mut pending = [0.0f32; BATCH_SAMPLE_LEN];
    let mut filled = 0usize;

    while !stop.load(Ordering::Relaxed) {
        let mut progressed = false;
        while let Some(sample) = cons.try_pop() {
            pending[filled] = sample;
            filled += 1;
            progressed = true;
            if filled == BATCH_SAMPLE_LEN {
                filled = 0;
                if !pipeline.add_resource(SampleBatch::from_mono(&pending)) {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        if !progressed {
            thread::sleep(Duration::from_millis(2));
        }
    }
}

fn select_input_device(
    host: &cpal::Host,
    device_query: Option<&str>,
) -> anyhow::Result<cpal::Device> {
    let devices = host
        .input_devices()
        .context("enumerate input devices")?
        .collect::<Vec<_>>();

    let want = device_query.map(|s| s.to_lowercase());
    if let Some(want) = want.as_deref() {
        if let Some(dev) = devices.iter().find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(want))
                .unwrap_or(false)
        }) {
            return Ok(dev.clone());
        }
        return Err(anyhow!("no input device matching: {want}"));
    }

    host.default_input_device()
        .ok_or_else(|| anyhow!("no default input device found"))
}

fn push_interleaved<T: Sample<Float = f32> + Copy>(
    data: &[T],
    channels: usize,
    prod: &mut ringbuf::HeapProd<f32>,
) {
    for frame in data.chunks(channels) {
        let mut acc = 0.0f32;
        for s in frame {
            acc += (*s).to_float_sample();
        }
        let mono = acc / channels as f32;
        let _ = prod.try_push(mono);
    }
}
