//! Anna core — thought model, error taxonomy, configuration

pub mod config;
pub mod error;
pub mod thought;

pub use config::{
    AnnaConfig, BufferConfig, LmConfig, MemoryConfig, SchedulerConfig, ToolsConfig,
};
pub use error::{Error, ErrorKind, Result};
pub use thought::{Metadata, Priority, Thought, ThoughtId, ThoughtSource};
