//! Legacy classification of output references.
//!
//! Two policies exist. The deprecated substring policy (`legacy_prefix` /
//! `legacy_suffix`) wins whenever either string is set; otherwise the
//! `legacy_test` regular expression decides.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use htmlcombine_shared::{CombineError, CombineOptions, DEFAULT_LEGACY_TEST, Result};

/// The rule a [`LegacyClassifier`] applies.
#[derive(Debug, Clone)]
pub enum LegacyRule {
    /// Case-insensitive containment of either string. Stored lowercased.
    Substrings {
        prefix: Option<String>,
        suffix: Option<String>,
    },
    /// Regular expression test against the reference source.
    Pattern(Regex),
}

/// Decides whether a reference targets legacy runtimes.
#[derive(Debug, Clone)]
pub struct LegacyClassifier {
    rule: LegacyRule,
}

impl LegacyClassifier {
    /// Build a classifier from plugin options, compiling `legacy_test` if it is used.
    pub fn new(opts: &CombineOptions) -> Result<Self> {
        let prefix = non_empty(opts.legacy_prefix.as_deref());
        let suffix = non_empty(opts.legacy_suffix.as_deref());

        if prefix.is_some() || suffix.is_some() {
            debug!(?prefix, ?suffix, "using deprecated legacy prefix/suffix policy");
            return Ok(Self::from_substrings(prefix, suffix));
        }

        Self::from_pattern(&opts.legacy_test)
    }

    /// Classifier using the regular-expression policy.
    pub fn from_pattern(pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern).map_err(|e| {
            CombineError::config(format!("invalid legacy_test '{pattern}': {e}"))
        })?;
        Ok(Self {
            rule: LegacyRule::Pattern(re),
        })
    }

    /// Classifier using the deprecated substring policy.
    pub fn from_substrings(prefix: Option<&str>, suffix: Option<&str>) -> Self {
        Self {
            rule: LegacyRule::Substrings {
                prefix: prefix.map(str::to_lowercase),
                suffix: suffix.map(str::to_lowercase),
            },
        }
    }

    pub fn rule(&self) -> &LegacyRule {
        &self.rule
    }

    /// `true` if `source` should be served to legacy runtimes only.
    pub fn is_legacy(&self, source: &str) -> bool {
        match &self.rule {
            LegacyRule::Substrings { prefix, suffix } => {
                let src = source.to_lowercase();
                prefix.as_deref().is_some_and(|p| src.contains(p))
                    || suffix.as_deref().is_some_and(|s| src.contains(s))
            }
            LegacyRule::Pattern(re) => re.is_match(source),
        }
    }
}

impl Default for LegacyClassifier {
    fn default() -> Self {
        static DEFAULT_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(DEFAULT_LEGACY_TEST).expect("valid regex"));

        Self {
            rule: LegacyRule::Pattern(DEFAULT_RE.clone()),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matches_case_insensitively() {
        let classifier = LegacyClassifier::from_substrings(Some("legacy"), None);
        assert!(classifier.is_legacy("legacy.bundle.js"));
        assert!(classifier.is_legacy("LEGACY.bundle.js"));
        assert!(!classifier.is_legacy("main.bundle.js"));
    }

    #[test]
    fn uppercase_suffix_still_matches() {
        let classifier = LegacyClassifier::from_substrings(None, Some(".ES5.js"));
        assert!(classifier.is_legacy("app.es5.js"));
        assert!(!classifier.is_legacy("app.js"));
    }

    #[test]
    fn default_pattern_is_case_insensitive() {
        let classifier = LegacyClassifier::default();
        assert!(classifier.is_legacy("legacy-bundle.js"));
        assert!(classifier.is_legacy("vendor.Legacy.js"));
        assert!(!classifier.is_legacy("bundle.js"));
    }

    #[test]
    fn substrings_take_precedence_over_pattern() {
        let opts = CombineOptions {
            legacy_test: "never-matches-anything".into(),
            legacy_suffix: Some("-old.js".into()),
            ..CombineOptions::default()
        };
        let classifier = LegacyClassifier::new(&opts).expect("classifier");
        assert!(matches!(classifier.rule(), LegacyRule::Substrings { .. }));
        assert!(classifier.is_legacy("app-old.js"));
        assert!(!classifier.is_legacy("legacy.js"));
    }

    #[test]
    fn empty_substrings_fall_back_to_pattern() {
        let opts = CombineOptions {
            legacy_prefix: Some(String::new()),
            ..CombineOptions::default()
        };
        let classifier = LegacyClassifier::new(&opts).expect("classifier");
        assert!(matches!(classifier.rule(), LegacyRule::Pattern(_)));
        assert!(classifier.is_legacy("LEGACY.js"));
    }

    #[test]
    fn custom_pattern() {
        let opts = CombineOptions {
            legacy_test: r"\.es5\.js$".into(),
            ..CombineOptions::default()
        };
        let classifier = LegacyClassifier::new(&opts).expect("classifier");
        assert!(classifier.is_legacy("main.es5.js"));
        assert!(!classifier.is_legacy("main.es5.js.map"));
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = LegacyClassifier::from_pattern("legacy(").unwrap_err();
        assert!(matches!(err, CombineError::Config { .. }));
        assert!(err.to_string().contains("invalid legacy_test"));
    }
}
