//! CLI module for Haggle

pub mod app;
pub mod commands;
pub mod render;

pub use app::{load_config, resolve_item, write_catalog, write_config, HaggleApp, PlayOptions};
pub use commands::{CatalogArgs, Cli, Commands, ConfigArgs, SessionArgs};
pub use render::TerminalPresenter;
