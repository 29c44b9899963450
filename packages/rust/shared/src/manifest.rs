//! Build manifest: the set of pipelines one `htmlcombine run` drives.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, CombineOptions};
use crate::error::{CombineError, Result};
use crate::types::GroupId;

/// Root structure of a manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Pipelines in declaration order.
    #[serde(default)]
    pub pipelines: Vec<PipelineSpec>,
}

/// One `[[pipelines]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Unique pipeline name, used in logs and errors.
    pub name: String,
    /// Document this pipeline writes (e.g. `index.html`).
    #[serde(default = "default_output")]
    pub output: String,
    /// Script references this pipeline emits on its own.
    #[serde(default)]
    pub scripts: Vec<String>,
    /// Abort before reaching the draft-output stage.
    #[serde(default)]
    pub fail: bool,
    /// Combine plugin settings for this pipeline.
    #[serde(default)]
    pub combine: CombineSection,
}

fn default_output() -> String {
    "index.html".into()
}

/// `[pipelines.combine]` section. Unset keys fall back to the app config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombineSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alter_tags: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barrier_timeout_ms: Option<u64>,
}

impl CombineSection {
    /// Resolve against app-level defaults.
    pub fn resolve(&self, config: &AppConfig) -> CombineOptions {
        let base = CombineOptions::from(config);
        CombineOptions {
            group_id: GroupId::from(self.group.clone()),
            alter_tags: self.alter_tags.unwrap_or(base.alter_tags),
            legacy_test: self.legacy_test.clone().unwrap_or(base.legacy_test),
            legacy_prefix: self.legacy_prefix.clone(),
            legacy_suffix: self.legacy_suffix.clone(),
            barrier_timeout: self
                .barrier_timeout_ms
                .map(Duration::from_millis)
                .or(base.barrier_timeout),
        }
    }
}

impl BuildManifest {
    /// Reject manifests that cannot be run.
    pub fn validate(&self) -> Result<()> {
        if self.pipelines.is_empty() {
            return Err(CombineError::validation("manifest declares no pipelines"));
        }

        let mut seen = HashSet::new();
        for pipeline in &self.pipelines {
            if pipeline.name.trim().is_empty() {
                return Err(CombineError::validation("pipeline name must not be empty"));
            }
            if !seen.insert(pipeline.name.as_str()) {
                return Err(CombineError::validation(format!(
                    "duplicate pipeline name '{}'",
                    pipeline.name
                )));
            }
        }

        Ok(())
    }
}

/// Parse a manifest from TOML text.
pub fn parse_manifest(content: &str) -> Result<BuildManifest> {
    let manifest: BuildManifest = toml::from_str(content)
        .map_err(|e| CombineError::validation(format!("invalid manifest: {e}")))?;
    manifest.validate()?;
    Ok(manifest)
}

/// Load and validate a manifest file.
pub fn load_manifest(path: &Path) -> Result<BuildManifest> {
    let content = std::fs::read_to_string(path).map_err(|e| CombineError::io(path, e))?;
    tracing::debug!(?path, "loaded build manifest");
    parse_manifest(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PIPELINES: &str = r#"
[[pipelines]]
name = "modern"
output = "index.html"
scripts = ["bundle.js"]
[pipelines.combine]
alter_tags = true

[[pipelines]]
name = "legacy"
output = "legacy.html"
scripts = ["legacy-bundle.js"]
[pipelines.combine]
group = "site"
legacy_prefix = "legacy-"
barrier_timeout_ms = 200
"#;

    #[test]
    fn parses_pipelines() {
        let manifest = parse_manifest(TWO_PIPELINES).expect("parse");
        assert_eq!(manifest.pipelines.len(), 2);
        assert_eq!(manifest.pipelines[0].scripts, vec!["bundle.js"]);
        assert!(!manifest.pipelines[1].fail);
    }

    #[test]
    fn combine_section_resolves_over_defaults() {
        let manifest = parse_manifest(TWO_PIPELINES).expect("parse");
        let mut config = AppConfig::default();
        config.defaults.barrier_timeout_ms = Some(1000);

        let modern = manifest.pipelines[0].combine.resolve(&config);
        assert_eq!(modern.group_id, GroupId::Default);
        assert!(modern.alter_tags);
        assert_eq!(modern.barrier_timeout, Some(Duration::from_millis(1000)));

        let legacy = manifest.pipelines[1].combine.resolve(&config);
        assert_eq!(legacy.group_id, GroupId::named("site"));
        assert!(!legacy.alter_tags);
        assert_eq!(legacy.legacy_prefix.as_deref(), Some("legacy-"));
        assert_eq!(legacy.barrier_timeout, Some(Duration::from_millis(200)));
    }

    #[test]
    fn output_defaults_to_index() {
        let manifest = parse_manifest("[[pipelines]]\nname = \"solo\"\n").expect("parse");
        assert_eq!(manifest.pipelines[0].output, "index.html");
        assert!(manifest.pipelines[0].scripts.is_empty());
    }

    #[test]
    fn rejects_empty_manifest() {
        let err = parse_manifest("").unwrap_err();
        assert!(err.to_string().contains("no pipelines"));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = parse_manifest("[[pipelines]]\nname = \"a\"\n[[pipelines]]\nname = \"a\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("duplicate pipeline name 'a'"));
    }

    #[test]
    fn demo_manifest_validates() {
        let manifest = load_manifest(Path::new("../../../demos/basic/build.toml"))
            .expect("load demo manifest");
        assert_eq!(manifest.pipelines.len(), 2);
        assert_eq!(manifest.pipelines[1].output, "legacy.html");
        assert_eq!(manifest.pipelines[1].combine.alter_tags, Some(true));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = load_manifest(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, CombineError::Io { .. }));
    }
}
