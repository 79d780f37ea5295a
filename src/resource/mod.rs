//! Where stylesheets come from.
//!
//! Components never open files themselves: a [`ResourceProvider`] turns the stylesheet
//! reference from the configuration into bytes.
//!
//! - [`InMemoryResourceProvider`]: resources registered up front, for tests and embedding
//! - [`FilesystemResourceProvider`]: files below a base directory

mod filesystem;
mod memory;

pub use filesystem::FilesystemResourceProvider;
pub use memory::InMemoryResourceProvider;

use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Failed to load resource '{path}': {message}")]
    LoadFailed { path: String, message: String },
}

/// Loaded resource bytes, shared without copying.
pub type SharedResourceData = Arc<Vec<u8>>;

pub trait ResourceProvider: Send + Sync + Debug {
    /// Loads the resource stored under `path`.
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError>;

    fn exists(&self, path: &str) -> bool;

    /// Human-readable name for log messages.
    fn name(&self) -> &'static str;
}
