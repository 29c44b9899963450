//! Cross-pipeline coordination for htmlcombine.
//!
//! Independent build pipelines meet at a per-group rendezvous barrier, trade
//! their partial reference lists, and each continue with the deduplicated
//! union. The crate provides:
//! - [`merge`](mod@merge): deduplicating merge of contributions
//! - [`registry`]: the [`Coordinator`] owning every group of one invocation
//! - [`barrier`]: register / contribute / wait, and the [`Participant`] handle
//! - [`host`] and [`plugin`]: the lifecycle glue a host build system drives
//! - [`pipeline`]: an in-process host that runs a whole build manifest

pub mod barrier;
pub mod host;
pub mod merge;
pub mod pipeline;
pub mod plugin;
pub mod registry;

pub use barrier::Participant;
pub use host::{BuildHost, DraftOutput, HostHooks};
pub use merge::merge;
pub use pipeline::{
    BuildResult, ManifestHost, PipelineOutput, ProgressReporter, SilentProgress, prepare_plugins,
    run_build,
};
pub use plugin::CombinePlugin;
pub use registry::{Coordinator, Group, GroupStatus};
