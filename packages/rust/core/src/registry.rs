//! Group registry: the coordination context shared by every participant of
//! one build invocation.
//!
//! A [`Coordinator`] is created when the invocation starts and dropped when it
//! ends. Groups are created lazily and live as long as the coordinator.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use htmlcombine_shared::{Assets, GroupId, ParticipantId};

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Owns every [`Group`] of one build invocation.
#[derive(Debug, Default)]
pub struct Coordinator {
    groups: Mutex<IndexMap<GroupId, Arc<Group>>>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the group for `id`, creating it on first use.
    ///
    /// Lookup and creation happen under one lock, so racing callers always
    /// end up with the same instance.
    pub fn group(&self, id: &GroupId) -> Arc<Group> {
        let mut groups = self.groups.lock();
        if let Some(group) = groups.get(id) {
            return Arc::clone(group);
        }

        debug!(group = %id, "creating coordination group");
        let group = Arc::new(Group::new(id.clone()));
        groups.insert(id.clone(), Arc::clone(&group));
        group
    }

    /// Groups created so far, in creation order.
    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.lock().keys().cloned().collect()
    }

    /// Status of every group, in creation order.
    pub fn status(&self) -> Vec<GroupStatus> {
        let groups: Vec<Arc<Group>> = self.groups.lock().values().cloned().collect();
        groups.iter().map(|g| g.status()).collect()
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// One pending-contribution slot.
#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) label: String,
    pub(crate) contribution: Option<Assets>,
}

/// Slots keyed by participant, in registration order, plus the merged
/// result of every completed round.
#[derive(Debug, Default)]
pub(crate) struct GroupState {
    pub(crate) slots: IndexMap<ParticipantId, Slot>,
    /// Indexed by round number. The open round is `rounds.len()`.
    pub(crate) rounds: Vec<Arc<Assets>>,
}

impl GroupState {
    pub(crate) fn open_round(&self) -> usize {
        self.rounds.len()
    }

    pub(crate) fn is_complete(&self) -> bool {
        !self.slots.is_empty() && self.slots.values().all(|s| s.contribution.is_some())
    }

    pub(crate) fn pending_labels(&self) -> Vec<String> {
        self.slots
            .values()
            .filter(|s| s.contribution.is_none())
            .map(|s| s.label.clone())
            .collect()
    }
}

/// A set of participants whose contributions are merged together.
///
/// The barrier operations (`register`, `contribute`) live in
/// [`crate::barrier`].
#[derive(Debug)]
pub struct Group {
    pub(crate) id: GroupId,
    pub(crate) state: Mutex<GroupState>,
    /// Number of completed rounds.
    pub(crate) completion: watch::Sender<usize>,
}

impl Group {
    fn new(id: GroupId) -> Self {
        let (completion, _) = watch::channel(0);
        Self {
            id,
            state: Mutex::new(GroupState::default()),
            completion,
        }
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    /// Snapshot of membership and progress.
    pub fn status(&self) -> GroupStatus {
        let state = self.state.lock();
        let pending = state.pending_labels();
        GroupStatus {
            group: self.id.clone(),
            registered: state.slots.len(),
            contributed: state.slots.len() - pending.len(),
            pending,
        }
    }
}

/// Membership and progress of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupStatus {
    pub group: GroupId,
    pub registered: usize,
    pub contributed: usize,
    /// Labels of participants that have not contributed yet.
    pub pending: Vec<String>,
}
