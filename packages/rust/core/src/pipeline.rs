//! Multi-pipeline build driver: manifest → plugins → concurrent pipelines → documents.
//!
//! This plays the part of the host build system. Every pipeline gets its own
//! [`CombinePlugin`]; all of them are started (and therefore registered)
//! before any pipeline reaches its draft output, the same order a real host
//! follows when it launches child builds up front.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinError;
use tracing::{info, instrument, warn};

use htmlcombine_shared::{
    AppConfig, Assets, BuildManifest, CombineError, GroupId, PipelineSpec, ReferenceRecord, Result,
};

use crate::host::{BuildHost, DraftOutput, HostHooks};
use crate::plugin::CombinePlugin;
use crate::registry::{Coordinator, GroupStatus};

/// One finished pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    /// Pipeline name from the manifest.
    pub name: String,
    /// Document the pipeline writes.
    pub output: String,
    /// Group the pipeline combined with.
    pub group: GroupId,
    /// Final references, after combining and tagging.
    pub references: Vec<ReferenceRecord>,
    /// Wall time from draft output to finalized tags.
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Result of running every pipeline of a manifest.
#[derive(Debug)]
pub struct BuildResult {
    /// Successful pipelines, in manifest order.
    pub outputs: Vec<PipelineOutput>,
    /// Failed pipelines (name, error message), in manifest order.
    pub failures: Vec<(String, String)>,
    /// Group membership at the end of the build.
    pub groups: Vec<GroupStatus>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a pipeline reaches its draft output and starts waiting.
    fn pipeline_waiting(&self, name: &str, group: &GroupId);
    /// Called when a pipeline produced its document.
    fn pipeline_finished(&self, output: &PipelineOutput);
    /// Called when a pipeline failed.
    fn pipeline_failed(&self, name: &str, error: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn pipeline_waiting(&self, _name: &str, _group: &GroupId) {}
    fn pipeline_finished(&self, _output: &PipelineOutput) {}
    fn pipeline_failed(&self, _name: &str, _error: &str) {}
}

/// The in-process host delivering every lifecycle signal.
pub struct ManifestHost;

impl BuildHost for ManifestHost {
    fn name(&self) -> &str {
        "htmlcombine"
    }

    fn hooks(&self) -> HostHooks {
        HostHooks::ALL
    }
}

/// Build one plugin per pipeline and attach it to `host`.
///
/// Fails on the first misconfigured pipeline (invalid legacy pattern,
/// unsupported host).
pub fn prepare_plugins(
    coordinator: &Coordinator,
    manifest: &BuildManifest,
    config: &AppConfig,
    host: &dyn BuildHost,
) -> Result<Vec<CombinePlugin>> {
    manifest
        .pipelines
        .iter()
        .map(|spec| {
            let options = spec.combine.resolve(config);
            let plugin = CombinePlugin::new(coordinator, spec.name.clone(), options)?;
            plugin.attach(host)?;
            Ok(plugin)
        })
        .collect()
}

/// Run every pipeline of `manifest` concurrently.
///
/// Pipeline failures are collected in [`BuildResult::failures`]; only setup
/// errors abort the whole build.
#[instrument(skip_all, fields(pipelines = manifest.pipelines.len()))]
pub async fn run_build(
    manifest: &BuildManifest,
    config: &AppConfig,
    progress: Arc<dyn ProgressReporter>,
) -> Result<BuildResult> {
    let start = Instant::now();
    let coordinator = Coordinator::new();

    let plugins = prepare_plugins(&coordinator, manifest, config, &ManifestHost)?;

    // Signal A for every pipeline before any of them can reach signal B.
    for plugin in &plugins {
        plugin.on_pipeline_start()?;
    }

    info!(
        groups = coordinator.group_ids().len(),
        "all pipelines started"
    );

    let mut names = Vec::with_capacity(plugins.len());
    let mut handles = Vec::with_capacity(plugins.len());
    for (plugin, spec) in plugins.into_iter().zip(manifest.pipelines.iter().cloned()) {
        let progress = Arc::clone(&progress);
        names.push(spec.name.clone());
        handles.push(tokio::spawn(async move {
            run_pipeline(&plugin, &spec, progress.as_ref()).await
        }));
    }

    let joined = futures::future::join_all(handles).await;
    let (outputs, failures) = collect_outcomes(names, joined, progress.as_ref());

    let result = BuildResult {
        outputs,
        failures,
        groups: coordinator.status(),
        elapsed: start.elapsed(),
    };

    info!(
        succeeded = result.outputs.len(),
        failed = result.failures.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "build complete"
    );

    Ok(result)
}

/// Split joined pipeline tasks into outputs and `(name, error)` failures,
/// reporting each one. `names` and `joined` are in manifest order.
fn collect_outcomes(
    names: Vec<String>,
    joined: Vec<std::result::Result<Result<PipelineOutput>, JoinError>>,
    progress: &dyn ProgressReporter,
) -> (Vec<PipelineOutput>, Vec<(String, String)>) {
    let mut outputs = Vec::new();
    let mut failures = Vec::new();

    for (name, joined) in names.into_iter().zip(joined) {
        let error = match joined {
            Ok(Ok(output)) => {
                progress.pipeline_finished(&output);
                outputs.push(output);
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("pipeline task failed: {e}"),
        };

        warn!(pipeline = %name, error = %error, "pipeline failed");
        progress.pipeline_failed(&name, &error);
        failures.push((name, error));
    }

    (outputs, failures)
}

/// Drive one pipeline from draft output to finalized tags.
async fn run_pipeline(
    plugin: &CombinePlugin,
    spec: &PipelineSpec,
    progress: &dyn ProgressReporter,
) -> Result<PipelineOutput> {
    if spec.fail {
        // The pipeline aborts before its draft output; its group is stranded.
        return Err(CombineError::PipelineAborted {
            pipeline: spec.name.clone(),
        });
    }

    let start = Instant::now();
    let group = plugin.options().group_id.clone();

    let mut draft = DraftOutput::new(Assets::new(spec.scripts.iter().cloned()));
    progress.pipeline_waiting(&spec.name, &group);
    plugin.on_draft_output(&mut draft).await?;

    let references = draft
        .assets
        .js
        .into_iter()
        .map(ReferenceRecord::new)
        .collect();
    let references = plugin.on_finalize_tags(references);

    Ok(PipelineOutput {
        name: spec.name.clone(),
        output: spec.output.clone(),
        group,
        references,
        elapsed: start.elapsed(),
    })
}
