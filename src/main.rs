use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cfg = zoom_visualizer::config::Config::parse();
    if cfg.list_devices {
        zoom_visualizer::audio::list_input_devices()?;
        return Ok(());
    }

    zoom_visualizer::app::run(cfg)
}
