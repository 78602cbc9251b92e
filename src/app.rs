use crate::audio::{AudioSystem, BATCH_SAMPLE_LEN};
use crate::config::Config;
use crate::effects::EffectPicker;
use crate::filter::{ZoomFilterBuffers, MAX_TRAN_LERP};
use crate::pipeline::SlotProducerConsumer;
use crate::producer::{make_slot_frames, FrameProducer};
use crate::render::{Frame, HalfBlockRenderer, Renderer};
use crate::terminal::TerminalGuard;
use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::fmt::Write as _;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

struct FpsCounter {
    window_start: Instant,
    frames_in_window: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames_in_window: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames_in_window += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.frames_in_window as f32 / elapsed.as_secs_f32();
            self.frames_in_window = 0;
            self.window_start = Instant::now();
        }
    }
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    anyhow::ensure!(cfg.slots > 0, "--slots must be positive");
    anyhow::ensure!(cfg.queue_capacity > 0, "--queue-capacity must be positive");
    anyhow::ensure!(cfg.stripes > 0, "--stripes must be positive");
    anyhow::ensure!(
        (1..=MAX_TRAN_LERP).contains(&cfg.lerp_increment),
        "--lerp-increment must be in 1..={MAX_TRAN_LERP}"
    );

    let _term = TerminalGuard::new()?;
    let mut out = BufWriter::new(TerminalGuard::stdout());

    let (cols, rows) = crossterm::terminal::size().context("get terminal size")?;
    if cols < 4 || rows < 2 {
        return Err(anyhow::anyhow!(
            "terminal too small (need at least 4x2, got {cols}x{rows})"
        ));
    }

    let width = cfg.width.unwrap_or(cols as usize).clamp(2, cols as usize);
    let mut height = cfg
        .height
        .unwrap_or((rows.saturating_sub(1) as usize) * 2)
        .max(2);
    // The half-block renderer needs an even pixel height.
    height &= !1;
    let visual_rows = (height / 2) as u16;

    let pipeline = Arc::new(SlotProducerConsumer::new(cfg.slots, cfg.queue_capacity));
    let audio = AudioSystem::new(cfg.device.as_deref(), Arc::clone(&pipeline))
        .context("start audio capture")?;

    let batches_per_sec = (audio.sample_rate_hz as f32 / BATCH_SAMPLE_LEN as f32).max(1.0);
    let frames_between_switches = if cfg.effect_seconds > 0.0 {
        (cfg.effect_seconds * batches_per_sec) as u64
    } else {
        0
    };

    let seed = if cfg.seed != 0 {
        cfg.seed
    } else {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    };
    let mut effects = EffectPicker::new(seed);
    let initial_effect = effects.pick(0.5);

    let stripe_height = (height / cfg.stripes).max(1);
    let engine = ZoomFilterBuffers::new(width, height, stripe_height, initial_effect);
    let slots = make_slot_frames(cfg.slots, width, height);
    let force_switch = Arc::new(AtomicBool::new(false));

    let producer = FrameProducer::new(
        engine,
        effects,
        Arc::clone(&slots),
        cfg.lerp_increment,
        frames_between_switches,
        Arc::clone(&force_switch),
    );
    let producer_pipeline = Arc::clone(&pipeline);
    let producer_handle = thread::spawn(move || producer.run(producer_pipeline));

    let mut renderer = HalfBlockRenderer::new();
    let frame_interval = Duration::from_secs_f32(1.0 / cfg.fps.max(1) as f32);
    let consumer_wait = Duration::from_millis(cfg.consumer_wait_ms);
    let mut fps = FpsCounter::new();
    let mut hud = String::new();
    let mut running = true;

    while running {
        let tick_start = Instant::now();

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => running = false,
                    KeyCode::Char(' ') | KeyCode::Char('n') => {
                        force_switch.store(true, Ordering::Release);
                    }
                    _ => {}
                }
            }
        }
        if !running {
            break;
        }

        let stats = pipeline.stats();
        hud.clear();
        let _ = write!(
            hud,
            "{:5.1} fps | produce {:4.1}ms | in-flight {} | timeouts {} | dropped {}",
            fps.fps,
            stats.mean_produce_micros as f32 / 1000.0,
            stats.in_use_slots,
            stats.consumer_timeouts,
            audio.dropped_batches(),
        );

        let mut render_result: anyhow::Result<()> = Ok(());
        let consumed = pipeline.consume_without_release(consumer_wait, |slot| {
            let pixels = slots[slot].lock().unwrap();
            let frame = Frame {
                term_cols: cols,
                visual_rows,
                pixel_width: width,
                pixel_height: height,
                pixels_rgba: &pixels,
                hud: &hud,
                sync_updates: cfg.sync_updates,
            };
            render_result = renderer.render(&frame, &mut out);
        });
        if let Some(slot) = consumed {
            pipeline.release_after_consume(slot);
            fps.tick();
        }
        render_result?;
        // On timeout the previous frame simply stays on screen; the counter
        // already recorded it.

        let elapsed = tick_start.elapsed();
        if elapsed < frame_interval {
            thread::sleep(frame_interval - elapsed);
        }
    }

    pipeline.stop();
    let _ = producer_handle.join();
    Ok(())
}
