//! Configuration sources feeding the extraction engine.

mod builder;
mod env;
mod error;
mod file;
mod resolve;
mod source;

pub use builder::Config;
pub use env::EnvSource;
pub use error::ConfigError;
pub use file::{read_config_file, FileSource, Format};
pub use source::{ConfigEntry, ConfigSource, ValueSource};
