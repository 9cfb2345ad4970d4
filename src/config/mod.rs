// src/config/mod.rs

//! `Sentinel.toml` loading and validation.
//!
//! [`model::RawConfigFile`] mirrors the file; [`model::SentinelConfig`] is
//! the validated, typed form the rest of the crate uses.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{RawConfigFile, SentinelConfig, WatchSettings};
