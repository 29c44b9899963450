//! Shared types, error model, and configuration for htmlcombine.
//!
//! This crate is the foundation depended on by all other htmlcombine crates.
//! It provides:
//! - [`CombineError`]: the unified error type
//! - Domain types ([`GroupId`], [`ParticipantId`], [`Assets`], [`ReferenceRecord`])
//! - Configuration ([`AppConfig`], [`CombineOptions`], config loading)
//! - Build manifests ([`BuildManifest`], manifest loading)

pub mod config;
pub mod error;
pub mod manifest;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CombineOptions, DEFAULT_LEGACY_TEST, DefaultsConfig, config_dir, config_file_path,
    init_config, init_config_in, load_config, load_config_from,
};
pub use error::{CombineError, Result};
pub use manifest::{BuildManifest, CombineSection, PipelineSpec, load_manifest, parse_manifest};
pub use types::{Assets, AttrValue, GroupId, ParticipantId, ReferenceRecord};
