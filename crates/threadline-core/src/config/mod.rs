//! Configuration management

mod env_loader;
mod file_loader;
mod loader;
mod logging;
mod model;

pub use env_loader::{ENV_PREFIX, load_from_env, load_from_vars};
pub use file_loader::load_from_file;
pub use loader::{ConfigLoader, ConfigSource, default_config_path};
pub use logging::LoggingConfig;
pub use model::{ClientConfig, ConfigOverlay, ProgressLabels, TypewriterConfig};
