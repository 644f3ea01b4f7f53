//! Command implementations for the CLI.

mod config;
mod headless;
mod simulate;

pub use config::cmd_config;
pub use headless::cmd_headless;
pub use simulate::cmd_simulate;
