//! Module / nomodule tagging of finalized references.

use tracing::{debug, instrument};

use htmlcombine_shared::{AttrValue, ReferenceRecord};

use crate::classifier::LegacyClassifier;

/// Attribute added to references served to module-capable runtimes.
pub const MODULE_TYPE_ATTR: &str = "type";

/// Value of [`MODULE_TYPE_ATTR`].
pub const MODULE_TYPE_VALUE: &str = "module";

/// Attribute added to legacy references.
pub const NOMODULE_ATTR: &str = "nomodule";

/// Return a rewritten copy of `references`.
///
/// Legacy references gain `nomodule = true`, everything else gains
/// `type = "module"`. Existing attributes are kept; a key that already exists
/// is overwritten in place.
pub fn rewrite<F>(references: &[ReferenceRecord], classify: F) -> Vec<ReferenceRecord>
where
    F: Fn(&ReferenceRecord) -> bool,
{
    references
        .iter()
        .map(|reference| {
            let mut tagged = reference.clone();
            if classify(reference) {
                tagged
                    .attributes
                    .insert(NOMODULE_ATTR.to_string(), AttrValue::Bool(true));
            } else {
                tagged.attributes.insert(
                    MODULE_TYPE_ATTR.to_string(),
                    AttrValue::Text(MODULE_TYPE_VALUE.to_string()),
                );
            }
            tagged
        })
        .collect()
}

/// [`rewrite`] driven by a [`LegacyClassifier`] over each reference's source.
#[instrument(skip_all, fields(count = references.len()))]
pub fn rewrite_with(
    references: &[ReferenceRecord],
    classifier: &LegacyClassifier,
) -> Vec<ReferenceRecord> {
    let rewritten = rewrite(references, |r| classifier.is_legacy(&r.source));

    let legacy = rewritten
        .iter()
        .filter(|r| r.attributes.contains_key(NOMODULE_ATTR))
        .count();
    debug!(legacy, modern = rewritten.len() - legacy, "tags rewritten");

    rewritten
}
