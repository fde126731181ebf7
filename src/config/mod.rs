#[cfg(feature = "cli")]
pub mod cli;
pub mod connections;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{Cli, Command};
pub use connections::{Connection, ConnectionRegistry};
pub use toml_config::EtlConfig;
