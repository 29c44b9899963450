//! Legacy classification and module/nomodule tag rewriting.
//!
//! This crate provides:
//! - [`classifier`]: decides whether a reference targets legacy runtimes
//! - [`rewriter`]: tags finalized references with `type="module"` or `nomodule`

pub mod classifier;
pub mod rewriter;

pub use classifier::{LegacyClassifier, LegacyRule};
pub use rewriter::{
    MODULE_TYPE_ATTR, MODULE_TYPE_VALUE, NOMODULE_ATTR, rewrite, rewrite_with,
};
