mod cli;
mod watcher;

pub use agquota_core::config::Settings;
pub use cli::{Command, Config};
pub use watcher::SettingsWatch;
