//! Configuration management for tapkit.

pub mod paths;
pub mod settings;

pub use paths::Paths;
pub use settings::Config;
