//! Core types for the legalrag service
//!
//! This crate provides the foundational pieces shared by the storage, server
//! and CLI crates:
//!
//! - **Configuration**: backend and server settings loaded from TOML and env
//! - **Collection descriptor**: the fixed schema object the service requires
//! - **Error handling**: the error taxonomy used to abort startup

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod collection;
pub mod config;
pub mod error;

// Re-export main types for convenience
pub use collection::{CollectionDescriptor, JUSTICE_COLLECTION, JUSTICE_VECTORIZER_MODEL};
pub use config::{BackendConfig, Config, ServerConfig};
pub use error::{Error, ErrorKind, Result, ResultExt};
