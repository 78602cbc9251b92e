pub mod app;
pub mod audio;
pub mod config;
pub mod effects;
pub mod filter;
pub mod pipeline;
pub mod producer;
pub mod render;
pub mod terminal;
