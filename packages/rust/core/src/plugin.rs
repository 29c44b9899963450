//! The combine plugin: one instance per build pipeline, wired to the host's
//! lifecycle signals.

use std::sync::Arc;

use tracing::{debug, instrument};

use htmlcombine_shared::{CombineError, CombineOptions, ReferenceRecord, Result};
use htmlcombine_tags::{LegacyClassifier, rewrite_with};

use crate::barrier::Participant;
use crate::host::{BuildHost, DraftOutput};
use crate::registry::Coordinator;

/// Combines this pipeline's references with its group's and optionally tags
/// them as module / nomodule.
///
/// Never share one instance between two pipelines: the second
/// [`CombinePlugin::on_pipeline_start`] fails with
/// [`CombineError::DuplicateParticipant`].
#[derive(Debug)]
pub struct CombinePlugin {
    participant: Participant,
    options: CombineOptions,
    classifier: LegacyClassifier,
}

impl CombinePlugin {
    /// Construct the plugin. The group is resolved here, synchronously; an
    /// invalid `legacy_test` is rejected here as well.
    pub fn new(
        coordinator: &Coordinator,
        label: impl Into<String>,
        options: CombineOptions,
    ) -> Result<Self> {
        let classifier = LegacyClassifier::new(&options)?;
        let participant = Participant::new(coordinator, label, &options.group_id)
            .with_timeout(options.barrier_timeout);

        Ok(Self {
            participant,
            options,
            classifier,
        })
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn options(&self) -> &CombineOptions {
        &self.options
    }

    pub fn classifier(&self) -> &LegacyClassifier {
        &self.classifier
    }

    pub fn alters_tags(&self) -> bool {
        self.options.alter_tags
    }

    /// Check that `host` delivers every signal this plugin relies on.
    pub fn attach(&self, host: &dyn BuildHost) -> Result<()> {
        let hooks = host.hooks();
        if !hooks.pipeline_start {
            return Err(CombineError::unsupported_host(host.name(), "pipeline-start"));
        }
        if !hooks.draft_output {
            return Err(CombineError::unsupported_host(host.name(), "draft-output"));
        }
        if self.options.alter_tags && !hooks.finalize_tags {
            return Err(CombineError::unsupported_host(host.name(), "finalize-tags"));
        }

        debug!(
            host = host.name(),
            pipeline = self.participant.label(),
            alter_tags = self.options.alter_tags,
            "plugin attached"
        );
        Ok(())
    }

    /// Signal A: register this pipeline in its group.
    pub fn on_pipeline_start(&self) -> Result<()> {
        self.participant.register()
    }

    /// Signal B: contribute the draft's references, wait for the group, and
    /// replace the draft's references with the merged union. On error the
    /// draft is left untouched.
    #[instrument(
        skip_all,
        fields(pipeline = %self.participant.label(), group = %self.options.group_id)
    )]
    pub async fn on_draft_output(&self, draft: &mut DraftOutput) -> Result<()> {
        let merged = self.participant.contribute(draft.assets.clone()).await?;
        draft.assets = Arc::unwrap_or_clone(merged);

        debug!(references = draft.assets.js.len(), "draft output combined");
        Ok(())
    }

    /// Signal C: tag references as module / nomodule. Returns the input
    /// unchanged unless `alter_tags` is set.
    pub fn on_finalize_tags(&self, references: Vec<ReferenceRecord>) -> Vec<ReferenceRecord> {
        if !self.options.alter_tags {
            return references;
        }
        rewrite_with(&references, &self.classifier)
    }
}
