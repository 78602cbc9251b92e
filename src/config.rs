use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "zoom-visualizer",
    version,
    about = "Audio-reactive zoom-warp terminal visualizer"
)]
pub struct Config {
    /// Image width in pixels; defaults to the terminal width.
    #[arg(long)]
    pub width: Option<usize>,

    /// Image height in pixels; defaults to twice the terminal's visual rows.
    #[arg(long)]
    pub height: Option<usize>,

    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Number of frames the consumer may have in flight.
    #[arg(long, default_value_t = 3)]
    pub slots: usize,

    /// Bounded capacity of the audio-batch input queue.
    #[arg(long, default_value_t = 16)]
    pub queue_capacity: usize,

    /// Stripes a full displacement-field build is split into; each produced
    /// frame advances one stripe.
    #[arg(long, default_value_t = 16)]
    pub stripes: usize,

    /// Base per-frame lerp advance, out of 65536.
    #[arg(long, default_value_t = 768)]
    pub lerp_increment: i32,

    /// How long the render loop waits for a finished frame before reusing
    /// the previous one.
    #[arg(long, default_value_t = 50)]
    pub consumer_wait_ms: u64,

    /// Seconds between automatic effect switches (0 disables).
    #[arg(long, default_value_t = 12.0)]
    pub effect_seconds: f32,

    /// Seed for effect-parameter randomness.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    /// Substring match against input device names.
    #[arg(long)]
    pub device: Option<String>,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,
}
