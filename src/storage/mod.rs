//! Storage backend abstraction.
//!
//! Provides a pluggable storage layer that can be backed by:
//! - Local filesystem (default)
//! - S3-compatible object storage (AWS S3, MinIO, R2, etc.)
//! - Process memory

mod backend;
mod config;
mod local;
mod memory;
mod s3;

pub use backend::{validate_location, StorageBackend, StorageError, StorageResult};
pub use config::{StorageConfig, StorageType};
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use s3::{S3Config, S3Storage};
