//! In-memory vote store with fault injection for exercising `VoteGuard`.

use crate::api::{RowId, TargetType, VoteCounters, VoteDirection};
use crate::db::{CounterStore, LedgerEntry, LedgerStore, StoreError, VoteStore, VoteTx};
use crate::vote::{CounterDelta, Transition, VoteKey, VoteState};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    entries: Vec<LedgerEntry>,
    counters: HashMap<(TargetType, RowId), VoteCounters>,
    next_id: RowId,
}
impl MemoryState {
    fn live(&self, key: &VoteKey) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| !e.deleted && e.key == *key)
    }
    fn insert(&mut self, key: &VoteKey, direction: VoteDirection) -> LedgerEntry {
        self.next_id += 1;
        let now = Utc::now();
        let entry = LedgerEntry {
            id: self.next_id,
            key: key.clone(),
            direction,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.entries.push(entry.clone());
        entry
    }
    fn entry_mut(&mut self, id: RowId) -> Result<&mut LedgerEntry, StoreError> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }
}

#[derive(Debug, Default)]
struct Faults {
    failing_reads: u32,
    conflicting_creates: u32,
    race: Option<(VoteKey, VoteDirection)>,
}

/// Transactions are serialised by one lock and see a private copy of the
/// state, which replaces the shared one on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<AsyncMutex<MemoryState>>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryStore {
    pub async fn add_target(&self, target_type: TargetType, target: RowId, counters: VoteCounters) {
        self.state
            .lock()
            .await
            .counters
            .insert((target_type, target), counters);
    }
    pub async fn counters(&self, target_type: TargetType, target: RowId) -> Option<VoteCounters> {
        self.state
            .lock()
            .await
            .counters
            .get(&(target_type, target))
            .copied()
    }
    pub async fn live_entries(&self, key: &VoteKey) -> usize {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .filter(|e| !e.deleted && e.key == *key)
            .count()
    }
    /// The next `reads` entry reads fail as transient.
    pub fn fail_reads(&self, reads: u32) {
        self.faults.lock().unwrap().failing_reads = reads;
    }
    /// The next `creates` entry creations fail as if another writer had won.
    pub fn conflict_on_create(&self, creates: u32) {
        self.faults.lock().unwrap().conflicting_creates = creates;
    }
    /// A competing request for `key` commits `direction` just before the
    /// next creation for `key`, which then hits the unique constraint.
    pub fn race_next_create(&self, key: &VoteKey, direction: VoteDirection) {
        self.faults.lock().unwrap().race = Some((key.clone(), direction));
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn VoteTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx {
            committed: Some(guard),
            staged,
            faults: self.faults.clone(),
        }))
    }
}

pub struct MemoryTx {
    committed: Option<OwnedMutexGuard<MemoryState>>,
    staged: MemoryState,
    faults: Arc<Mutex<Faults>>,
}
impl MemoryTx {
    fn open(&mut self) -> Result<&mut OwnedMutexGuard<MemoryState>, StoreError> {
        self.committed.as_mut().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl LedgerStore for MemoryTx {
    async fn get_entry(&mut self, key: &VoteKey) -> Result<Option<LedgerEntry>, StoreError> {
        self.open()?;
        {
            let mut faults = self.faults.lock().unwrap();
            if faults.failing_reads > 0 {
                faults.failing_reads -= 1;
                return Err(StoreError::Transient("database is locked".into()));
            }
        }
        Ok(self.staged.live(key).cloned())
    }
    async fn create_entry(
        &mut self,
        key: &VoteKey,
        direction: VoteDirection,
    ) -> Result<LedgerEntry, StoreError> {
        let violation = || StoreError::ConstraintViolation {
            constraint_key: "votes_live_key".into(),
        };
        let race = {
            let mut faults = self.faults.lock().unwrap();
            if faults.conflicting_creates > 0 {
                faults.conflicting_creates -= 1;
                return Err(violation());
            }
            match faults.race.take() {
                Some((raced, competitor)) if raced == *key => Some(competitor),
                other => {
                    faults.race = other;
                    None
                }
            }
        };
        if let Some(competitor) = race {
            let committed = self.open()?;
            let current = VoteState::from(committed.live(key).map(|e| e.direction));
            let transition = Transition::decide(current, competitor);
            committed.insert(key, competitor);
            let counters = committed
                .counters
                .entry((key.target_type, key.target))
                .or_default();
            *counters = counters.apply(transition.delta());
            return Err(violation());
        }
        self.open()?;
        if self.staged.live(key).is_some() {
            return Err(violation());
        }
        Ok(self.staged.insert(key, direction))
    }
    async fn update_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        self.open()?;
        let stored = self.staged.entry_mut(entry.id)?;
        stored.direction = entry.direction;
        stored.updated_at = Utc::now();
        Ok(())
    }
    async fn remove_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        self.open()?;
        let stored = self.staged.entry_mut(entry.id)?;
        stored.deleted = true;
        stored.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MemoryTx {
    async fn get_counters(
        &mut self,
        target_type: TargetType,
        target: RowId,
    ) -> Result<Option<VoteCounters>, StoreError> {
        self.open()?;
        Ok(self.staged.counters.get(&(target_type, target)).copied())
    }
    async fn apply_delta(
        &mut self,
        target_type: TargetType,
        target: RowId,
        delta: CounterDelta,
    ) -> Result<VoteCounters, StoreError> {
        self.open()?;
        let counters = self
            .staged
            .counters
            .get_mut(&(target_type, target))
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        *counters = counters.apply(delta);
        Ok(*counters)
    }
}

#[async_trait]
impl VoteTx for MemoryTx {
    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut committed = self.committed.take().ok_or(StoreError::Closed)?;
        *committed = std::mem::take(&mut self.staged);
        Ok(())
    }
    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.committed.take().ok_or(StoreError::Closed)?;
        Ok(())
    }
}
