//! Configuration module

mod engine;

pub use engine::{EngineConfig, CONFIG_FILE};
