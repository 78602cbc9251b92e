mod halfblock;

pub use halfblock::HalfBlockRenderer;

use std::io::Write;

/// A completed frame as handed to the terminal consumer, plus the HUD line
/// painted under it.
pub struct Frame<'a> {
    pub term_cols: u16,
    pub visual_rows: u16,
    pub pixel_width: usize,
    pub pixel_height: usize,
    pub pixels_rgba: &'a [u8],
    pub hud: &'a str,
    pub sync_updates: bool,
}

pub trait Renderer {
    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()>;
}
