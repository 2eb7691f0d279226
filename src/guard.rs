use crate::api::{VoteCounters, VoteDirection, VoteOutcome};
use crate::db::{LedgerEntry, StoreError, VoteStore, VoteTx};
use crate::vote::{Transition, VoteError, VoteKey, VoteState};
use log::{debug, error, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries for reading a ledger entry, the first one included.
    pub read_attempts: u32,
    pub backoff_base: Duration,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            read_attempts: 3,
            backoff_base: Duration::from_millis(20),
        }
    }
}
impl RetryPolicy {
    pub fn delay(&self, retry: u32) -> Duration {
        self.backoff_base.saturating_mul(1 << retry.min(16))
    }
}

type Decide = fn(VoteState, VoteDirection) -> Transition;

/// Applies votes so that concurrent requests for the same voter and target
/// leave exactly one live ledger entry and one net contribution to the
/// counters.
///
/// Every attempt runs inside one store transaction. When creating an entry
/// loses against a concurrent writer the attempt is rolled back and the vote
/// is decided again against the entry that won. A second lost race is
/// reported as [`VoteError::ConcurrencyConflict`].
#[derive(Clone)]
pub struct VoteGuard {
    store: Arc<dyn VoteStore + Send + Sync>,
    policy: RetryPolicy,
}

impl VoteGuard {
    pub fn new(store: Arc<dyn VoteStore + Send + Sync>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn apply_vote(
        &self,
        key: &VoteKey,
        requested: VoteDirection,
    ) -> Result<VoteOutcome, VoteError> {
        match self.attempt(key, requested, Transition::decide).await {
            Err(VoteError::Store(StoreError::ConstraintViolation { constraint_key })) => {
                warn!(
                    "{} lost a race on {} for {} {}, reconciling",
                    key.voter, constraint_key, key.target_type, key.target
                );
            }
            outcome => return outcome,
        }
        match self.attempt(key, requested, Transition::reconcile).await {
            Err(VoteError::Store(StoreError::ConstraintViolation { constraint_key })) => {
                error!(
                    "{} lost a second race on {} for {} {}",
                    key.voter, constraint_key, key.target_type, key.target
                );
                Err(VoteError::ConcurrencyConflict(constraint_key))
            }
            outcome => outcome,
        }
    }

    /// One transaction. The transaction is closed before this returns so a
    /// following attempt never waits on it.
    async fn attempt(
        &self,
        key: &VoteKey,
        requested: VoteDirection,
        decide: Decide,
    ) -> Result<VoteOutcome, VoteError> {
        let mut tx = self.store.begin().await?;
        let outcome = self.run(tx.as_mut(), key, requested, decide).await;
        if outcome.is_err() {
            if let Err(e) = tx.rollback().await {
                debug!("Rollback of vote by {} not needed: {}", key.voter, e);
            }
        }
        outcome
    }

    async fn run(
        &self,
        tx: &mut dyn VoteTx,
        key: &VoteKey,
        requested: VoteDirection,
        decide: Decide,
    ) -> Result<VoteOutcome, VoteError> {
        let counters = tx
            .get_counters(key.target_type, key.target)
            .await?
            .ok_or(VoteError::TargetNotFound {
                target_type: key.target_type,
                target: key.target,
            })?;
        let entry = self.read_entry(tx, key).await?;
        let current = VoteState::from(entry.as_ref().map(|e| e.direction));
        let transition = decide(current, requested);
        debug!(
            "Vote {} by {} on {} {}: {:?}",
            requested, key.voter, key.target_type, key.target, transition
        );
        let counters = self.write(tx, key, transition, entry, counters).await?;
        tx.commit().await?;
        Ok(VoteOutcome {
            direction: transition.resulting_state().direction(),
            counters,
        })
    }

    async fn read_entry(
        &self,
        tx: &mut dyn VoteTx,
        key: &VoteKey,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let mut retry = 0;
        loop {
            match tx.get_entry(key).await {
                Err(e) if e.is_transient() && retry + 1 < self.policy.read_attempts => {
                    let delay = self.policy.delay(retry);
                    warn!(
                        "Reading vote of {} on {} {} failed: {}, retrying in {:?}",
                        key.voter, key.target_type, key.target, e, delay
                    );
                    sleep(delay).await;
                    retry += 1;
                }
                result => return result,
            }
        }
    }

    async fn write(
        &self,
        tx: &mut dyn VoteTx,
        key: &VoteKey,
        transition: Transition,
        entry: Option<LedgerEntry>,
        counters: VoteCounters,
    ) -> Result<VoteCounters, StoreError> {
        match (transition, entry) {
            (Transition::Unchanged(_), _) => return Ok(counters),
            (Transition::Create(direction), None) => {
                tx.create_entry(key, direction).await?;
            }
            (Transition::Remove(_), Some(entry)) => tx.remove_entry(&entry).await?,
            (Transition::Change { to, .. }, Some(mut entry)) => {
                entry.direction = to;
                tx.update_entry(&entry).await?;
            }
            (transition, entry) => {
                unreachable!("{:?} decided against entry {:?}", transition, entry)
            }
        }
        tx.apply_delta(key.target_type, key.target, transition.delta())
            .await
    }
}
