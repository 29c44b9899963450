//! Rendezvous barrier: register, contribute once, wait for the whole group.
//!
//! Membership is live. A participant that registers while others are already
//! waiting is awaited too, and the merged result covers every slot present
//! when the last empty one is filled.
//!
//! Completions are numbered rounds. A contribution belongs to the round open
//! when its slot is written and resolves to that round's result, even if a
//! later registration has already opened the next round.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use htmlcombine_shared::{Assets, CombineError, GroupId, ParticipantId, Result};

use crate::merge::merge;
use crate::registry::{Coordinator, Group, Slot};

// ---------------------------------------------------------------------------
// Group operations
// ---------------------------------------------------------------------------

impl Group {
    /// Create an empty slot for `participant`.
    ///
    /// Fails with [`CombineError::DuplicateParticipant`] if it already has one.
    pub fn register(&self, participant: ParticipantId, label: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.slots.contains_key(&participant) {
            return Err(CombineError::DuplicateParticipant {
                participant: label.to_string(),
                group: self.id.to_string(),
            });
        }

        state.slots.insert(
            participant,
            Slot {
                label: label.to_string(),
                contribution: None,
            },
        );

        debug!(
            group = %self.id,
            participant = label,
            registered = state.slots.len(),
            round = state.open_round(),
            "participant registered"
        );
        Ok(())
    }

    /// Write `partial` into `participant`'s slot, then wait until every slot
    /// present in the group is filled. Resolves to the merged contributions in
    /// registration order.
    ///
    /// With `timeout` set, a wait that outlasts it fails with
    /// [`CombineError::StrandedBarrier`].
    pub async fn contribute(
        &self,
        participant: ParticipantId,
        label: &str,
        partial: Assets,
        timeout: Option<Duration>,
    ) -> Result<Arc<Assets>> {
        // Subscribe before writing so the completion cannot slip past us.
        let mut rx = self.completion.subscribe();
        let round = self.write_slot(participant, label, partial)?;

        let wait = rx.wait_for(|completed| *completed > round);
        let observed = match timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(outcome) => outcome.is_ok(),
                Err(_) => {
                    let err = self.stranded(limit);
                    warn!(group = %self.id, error = %err, "barrier wait timed out");
                    return Err(err);
                }
            },
            None => wait.await.is_ok(),
        };

        // The watch borrow is released above; the state lock is taken below.
        let merged = if observed {
            self.state.lock().rounds.get(round).cloned()
        } else {
            None
        };
        merged.ok_or_else(|| self.stranded(Duration::ZERO))
    }

    /// Fill the slot and return the round it belongs to. Publishes the round
    /// when this was the last empty slot.
    fn write_slot(
        &self,
        participant: ParticipantId,
        label: &str,
        partial: Assets,
    ) -> Result<usize> {
        let mut state = self.state.lock();
        let round = state.open_round();
        let slot = state
            .slots
            .get_mut(&participant)
            .ok_or_else(|| CombineError::UnknownParticipant {
                participant: label.to_string(),
                group: self.id.to_string(),
            })?;

        if slot.contribution.is_some() {
            return Err(CombineError::AlreadyContributed {
                participant: slot.label.clone(),
                group: self.id.to_string(),
            });
        }

        debug!(
            group = %self.id,
            participant = %slot.label,
            references = partial.js.len(),
            round,
            "contribution written"
        );
        slot.contribution = Some(partial);

        if state.is_complete() {
            let merged = merge(state.slots.values().filter_map(|s| s.contribution.as_ref()));
            info!(
                group = %self.id,
                participants = state.slots.len(),
                references = merged.js.len(),
                round,
                "barrier complete"
            );
            state.rounds.push(Arc::new(merged));
            self.completion.send_replace(state.rounds.len());
        }

        Ok(round)
    }

    fn stranded(&self, waited: Duration) -> CombineError {
        CombineError::StrandedBarrier {
            group: self.id.to_string(),
            pending: self.state.lock().pending_labels(),
            waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// One coordination handle, bound to exactly one build pipeline.
///
/// Identity comes from a generated [`ParticipantId`]; the type is deliberately
/// not `Clone`.
#[derive(Debug)]
pub struct Participant {
    id: ParticipantId,
    label: String,
    group: Arc<Group>,
    timeout: Option<Duration>,
}

impl Participant {
    /// Create a handle and resolve its group immediately.
    pub fn new(coordinator: &Coordinator, label: impl Into<String>, group_id: &GroupId) -> Self {
        Self {
            id: ParticipantId::new(),
            label: label.into(),
            group: coordinator.group(group_id),
            timeout: None,
        }
    }

    /// Fail the wait with [`CombineError::StrandedBarrier`] after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn group(&self) -> &Arc<Group> {
        &self.group
    }

    /// Register into the group. Must happen before [`Participant::contribute`].
    pub fn register(&self) -> Result<()> {
        self.group.register(self.id, &self.label)
    }

    /// Contribute and wait for the rest of the group.
    pub async fn contribute(&self, partial: Assets) -> Result<Arc<Assets>> {
        self.group
            .contribute(self.id, &self.label, partial, self.timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// How long to wait when asserting that a future is still pending.
    const PENDING_PROBE: Duration = Duration::from_millis(50);

    fn participant(coordinator: &Coordinator, label: &str) -> Participant {
        let p = Participant::new(coordinator, label, &GroupId::Default);
        p.register().expect("register");
        p
    }

    #[tokio::test]
    async fn two_participants_receive_same_union() {
        let coordinator = Coordinator::new();
        let a = participant(&coordinator, "a");
        let b = participant(&coordinator, "b");

        let (ra, rb) = tokio::join!(
            a.contribute(Assets::new(["a.js", "b.js"])),
            b.contribute(Assets::new(["b.js", "c.js"])),
        );

        let ra = ra.expect("a resolves");
        let rb = rb.expect("b resolves");
        assert_eq!(*ra, Assets::new(["a.js", "b.js", "c.js"]));
        assert!(Arc::ptr_eq(&ra, &rb));
    }

    #[tokio::test]
    async fn merge_follows_registration_order() {
        let coordinator = Coordinator::new();
        let first = participant(&coordinator, "first");
        let second = participant(&coordinator, "second");

        // Second contributes first; first-registered still leads the merge.
        let (rs, rf) = tokio::join!(
            second.contribute(Assets::new(["s.js", "shared.js"])),
            first.contribute(Assets::new(["shared.js", "f.js"])),
        );

        assert_eq!(*rf.unwrap(), Assets::new(["shared.js", "f.js", "s.js"]));
        assert_eq!(*rs.unwrap(), Assets::new(["shared.js", "f.js", "s.js"]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn does_not_resolve_while_a_contribution_is_outstanding() {
        let coordinator = Coordinator::new();
        let a = Arc::new(participant(&coordinator, "a"));
        let b = participant(&coordinator, "b");
        let c = participant(&coordinator, "c");

        let waiting_a = {
            let a = Arc::clone(&a);
            tokio::spawn(async move { a.contribute(Assets::new(["a.js"])).await })
        };
        let waiting_b = tokio::spawn(async move { b.contribute(Assets::new(["b.js"])).await });

        tokio::time::sleep(PENDING_PROBE).await;
        assert!(!waiting_a.is_finished());
        assert!(!waiting_b.is_finished());
        assert_eq!(a.group().status().pending, vec!["c".to_string()]);

        let rc = c.contribute(Assets::new(["c.js"])).await.expect("c resolves");
        let ra = waiting_a.await.unwrap().expect("a resolves");
        let rb = waiting_b.await.unwrap().expect("b resolves");

        let expected = Assets::new(["a.js", "b.js", "c.js"]);
        assert_eq!(*ra, expected);
        assert_eq!(*rb, expected);
        assert_eq!(*rc, expected);
    }

    #[tokio::test]
    async fn late_registration_is_awaited() {
        let coordinator = Coordinator::new();
        let early = participant(&coordinator, "early");
        let middle = participant(&coordinator, "middle");

        let early_wait = early.contribute(Assets::new(["early.js"]));
        tokio::pin!(early_wait);
        assert!(
            tokio::time::timeout(PENDING_PROBE, &mut early_wait)
                .await
                .is_err()
        );

        // Joins after `early` is already waiting.
        let late = participant(&coordinator, "late");

        let middle_wait = middle.contribute(Assets::new(["middle.js"]));
        tokio::pin!(middle_wait);
        assert!(
            tokio::time::timeout(PENDING_PROBE, &mut middle_wait)
                .await
                .is_err()
        );

        let (re, rm, rl) = tokio::join!(
            early_wait,
            middle_wait,
            late.contribute(Assets::new(["late.js", "early.js"])),
        );

        let expected = Assets::new(["early.js", "middle.js", "late.js"]);
        assert_eq!(*re.unwrap(), expected);
        assert_eq!(*rm.unwrap(), expected);
        assert_eq!(*rl.unwrap(), expected);
    }

    #[tokio::test]
    async fn groups_do_not_block_each_other() {
        let coordinator = Coordinator::new();
        let one = Participant::new(&coordinator, "one", &GroupId::named("g1"));
        let two = Participant::new(&coordinator, "two", &GroupId::named("g2"));
        let idle = Participant::new(&coordinator, "idle", &GroupId::named("g2"));
        one.register().unwrap();
        two.register().unwrap();
        idle.register().unwrap();

        let merged = tokio::time::timeout(
            Duration::from_secs(1),
            one.contribute(Assets::new(["one.js"])),
        )
        .await
        .expect("g1 completes without g2")
        .expect("g1 resolves");
        assert_eq!(*merged, Assets::new(["one.js"]));

        let g2 = two.contribute(Assets::new(["two.js"]));
        assert!(tokio::time::timeout(PENDING_PROBE, g2).await.is_err());
    }

    #[test]
    fn registering_twice_fails() {
        let coordinator = Coordinator::new();
        let p = participant(&coordinator, "reused");

        let err = p.register().unwrap_err();
        assert!(matches!(err, CombineError::DuplicateParticipant { .. }));
        assert!(err.to_string().contains("'reused'"));
        assert_eq!(p.group().status().registered, 1);
    }

    #[tokio::test]
    async fn contributing_twice_fails() {
        let coordinator = Coordinator::new();
        let p = participant(&coordinator, "solo");

        p.contribute(Assets::new(["a.js"])).await.expect("first");
        let err = p.contribute(Assets::new(["b.js"])).await.unwrap_err();
        assert!(matches!(err, CombineError::AlreadyContributed { .. }));
    }

    #[tokio::test]
    async fn contributing_unregistered_fails() {
        let coordinator = Coordinator::new();
        let p = Participant::new(&coordinator, "ghost", &GroupId::Default);

        let err = p.contribute(Assets::default()).await.unwrap_err();
        assert!(matches!(err, CombineError::UnknownParticipant { .. }));
        assert!(err.to_string().contains("participant 'ghost'"));
    }

    #[tokio::test]
    async fn single_participant_resolves_immediately() {
        let coordinator = Coordinator::new();
        let p = participant(&coordinator, "solo");

        let merged = p.contribute(Assets::new(["a.js", "a.js"])).await.unwrap();
        assert_eq!(*merged, Assets::new(["a.js"]));
    }

    #[tokio::test]
    async fn timeout_reports_stranded_participants() {
        let coordinator = Coordinator::new();
        let waiting = Participant::new(&coordinator, "modern", &GroupId::Default)
            .with_timeout(Some(Duration::from_millis(30)));
        waiting.register().unwrap();
        let _crashed = participant(&coordinator, "legacy");

        let err = waiting
            .contribute(Assets::new(["bundle.js"]))
            .await
            .unwrap_err();

        match err {
            CombineError::StrandedBarrier {
                group,
                pending,
                waited_ms,
            } => {
                assert_eq!(group, "<default>");
                assert_eq!(pending, vec!["legacy".to_string()]);
                assert_eq!(waited_ms, 30);
            }
            other => panic!("expected StrandedBarrier, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn registration_after_completion_opens_the_next_round() {
        let coordinator = Coordinator::new();
        let first = participant(&coordinator, "first");
        let round_one = first.contribute(Assets::new(["first.js"])).await.unwrap();

        let group = Arc::clone(first.group());
        assert_eq!(*group.completion.borrow(), 1);

        let second = participant(&coordinator, "second");
        assert_eq!(*group.completion.borrow(), 1);
        assert_eq!(group.status().pending, vec!["second".to_string()]);

        let merged = second.contribute(Assets::new(["second.js"])).await.unwrap();
        assert_eq!(*merged, Assets::new(["first.js", "second.js"]));
        assert_eq!(*round_one, Assets::new(["first.js"]));
        assert_eq!(*group.completion.borrow(), 2);
    }

    #[tokio::test]
    async fn completed_round_survives_a_later_registration() {
        let coordinator = Coordinator::new();
        let a = participant(&coordinator, "a");
        let b = participant(&coordinator, "b");

        // `a` writes its slot and starts waiting.
        let a_wait = a.contribute(Assets::new(["a.js"]));
        tokio::pin!(a_wait);
        assert!(
            tokio::time::timeout(PENDING_PROBE, &mut a_wait)
                .await
                .is_err()
        );

        let rb = b.contribute(Assets::new(["b.js"])).await.expect("b resolves");
        assert_eq!(*rb, Assets::new(["a.js", "b.js"]));

        // `c` joins and completes the next round before `a` is polled again.
        let c = participant(&coordinator, "c");
        let rc = c.contribute(Assets::new(["c.js"])).await.expect("c resolves");
        assert_eq!(*rc, Assets::new(["a.js", "b.js", "c.js"]));

        let ra = tokio::time::timeout(Duration::from_secs(1), a_wait)
            .await
            .expect("a is not stranded by the late joiner")
            .expect("a resolves");
        assert!(Arc::ptr_eq(&ra, &rb));
    }

    #[tokio::test]
    async fn late_joiner_does_not_block_the_finished_round() {
        let coordinator = Coordinator::new();
        let a = participant(&coordinator, "a");
        let b = participant(&coordinator, "b");

        let a_wait = a.contribute(Assets::new(["a.js"]));
        tokio::pin!(a_wait);
        assert!(
            tokio::time::timeout(PENDING_PROBE, &mut a_wait)
                .await
                .is_err()
        );
        let rb = b.contribute(Assets::new(["b.js"])).await.unwrap();

        let _late = participant(&coordinator, "late");

        let ra = tokio::time::timeout(PENDING_PROBE, a_wait)
            .await
            .expect("a resolves without the late joiner")
            .unwrap();
        assert_eq!(ra.js, rb.js);
        assert_eq!(a.group().status().pending, vec!["late".to_string()]);
    }
}
