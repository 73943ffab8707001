//! Taskforge - compile declarative tool descriptors into runnable, versioned task plugins

pub mod config;
pub mod descriptor;
pub mod error;
pub mod generator;
pub mod plugins;

pub use config::ForgeConfig;
pub use error::{ForgeError, Result};
