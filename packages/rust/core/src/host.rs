//! What the combine plugin needs from the host build system.

use htmlcombine_shared::Assets;

/// Lifecycle signals a host can deliver to the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostHooks {
    /// "A build pipeline has begun."
    pub pipeline_start: bool,
    /// "Draft output is ready and may be mutated asynchronously."
    pub draft_output: bool,
    /// "Output tags are about to be finalized."
    pub finalize_tags: bool,
}

impl HostHooks {
    /// A host that delivers every signal.
    pub const ALL: Self = Self {
        pipeline_start: true,
        draft_output: true,
        finalize_tags: true,
    };
}

/// The host build system driving a pipeline.
pub trait BuildHost: Send + Sync {
    /// Human-readable host name for error messages.
    fn name(&self) -> &str;

    /// Which lifecycle signals this host delivers.
    fn hooks(&self) -> HostHooks;
}

/// The document generator's draft, handed to the draft-output hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftOutput {
    /// References the generator is about to emit.
    pub assets: Assets,
}

impl DraftOutput {
    pub fn new(assets: Assets) -> Self {
        Self { assets }
    }
}
