// src/config/mod.rs

//! Configuration loading and validation for composewatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`): the project config and
//!   the per-application `application.toml` manifest.
//! - Load files from disk and merge CLI overrides (`loader.rs`).
//! - Validate basic invariants (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_from_path, load_manifest, resolve_settings, settings_from_parts};
pub use model::{
    APPLICATION_MANIFEST, ApplicationManifest, DEFAULT_DESTINATION_FOLDER, RawApplicationManifest,
    RawProjectConfig, Settings, TaskManifest, Timing,
};
pub use validate::{validate_manifest, validate_settings};
