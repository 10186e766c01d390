// Copyright (C) 2026  Compute Coordinator Contributors
//
// This file is part of the Compute Coordinator.
//
// The Compute Coordinator is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::clock::UnixSeconds;
use crate::error::{CoordinatorError, Result};
use crate::model::{Attempt, ClientId, Job, JobId, JobState, Miner, MinerId, Receipt};

use super::{JobPage, Store};

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, Job>,
    jobs_by_state: HashMap<JobState, BTreeSet<(UnixSeconds, JobId)>>,
    idempotency: HashMap<(ClientId, String), JobId>,

    miners: HashMap<MinerId, Miner>,
    heartbeat_index: BTreeSet<(UnixSeconds, MinerId)>,

    receipts: HashMap<JobId, Vec<Receipt>>,
    attempts: HashMap<JobId, Vec<Attempt>>,
}

/// In-memory `Store` implementation. All mutation goes through one
/// `RwLock<State>` write guard per operation, so a job's state transition
/// and its secondary-index update are atomic with respect to every other
/// caller — this is this implementation's stand-in for row-level locking.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn reindex_job_state(state: &mut State, job_id: JobId, old: Option<(JobState, UnixSeconds)>, new: (JobState, UnixSeconds)) {
        if let Some((old_state, old_requested_at)) = old {
            if old_state != new.0 {
                if let Some(set) = state.jobs_by_state.get_mut(&old_state) {
                    set.remove(&(old_requested_at, job_id));
                }
            }
        }
        state
            .jobs_by_state
            .entry(new.0)
            .or_default()
            .insert((new.1, job_id));
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_job(&self, job: Job) -> Result<()> {
        let mut state = self.inner.write().await;
        let job_id = job.job_id;
        let key = (job.state, job.requested_at);
        if let Some(idem_key) = job.idempotency_key.clone() {
            state
                .idempotency
                .insert((job.client_id.clone(), idem_key), job_id);
        }
        state.jobs.insert(job_id, job);
        Self::reindex_job_state(&mut state, job_id, None, key);
        Ok(())
    }

    async fn get_job(&self, job_id: JobId) -> Result<Job> {
        let state = self.inner.read().await;
        state
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(CoordinatorError::JobNotFound)
    }

    async fn find_idempotent_job(
        &self,
        client_id: &ClientId,
        idempotency_key: &str,
    ) -> Result<Option<JobId>> {
        let state = self.inner.read().await;
        Ok(state
            .idempotency
            .get(&(client_id.clone(), idempotency_key.to_string()))
            .copied())
    }

    async fn update_job(
        &self,
        job_id: JobId,
        f: Box<dyn for<'a> FnOnce(&'a mut Job) -> Result<()> + Send>,
    ) -> Result<Job> {
        let mut state = self.inner.write().await;
        let (old_key, snapshot) = {
            let job = state
                .jobs
                .get_mut(&job_id)
                .ok_or(CoordinatorError::JobNotFound)?;
            let old_key = (job.state, job.requested_at);
            f(job)?;
            #[cfg(debug_assertions)]
            job.check_invariants();
            (old_key, job.clone())
        };
        let new_key = (snapshot.state, snapshot.requested_at);
        Self::reindex_job_state(&mut state, job_id, Some(old_key), new_key);
        Ok(snapshot)
    }

    async fn assign_job(&self, job_id: JobId, miner_id: &MinerId, now: UnixSeconds) -> Result<Job> {
        let mut state = self.inner.write().await;

        {
            let miner = state
                .miners
                .get(miner_id)
                .ok_or(CoordinatorError::JobNotFound)?;
            if miner.status != crate::model::MinerStatus::Online || miner.inflight >= miner.concurrency {
                return Err(CoordinatorError::ConflictState);
            }
        }

        let (old_key, snapshot) = {
            let job = state
                .jobs
                .get_mut(&job_id)
                .ok_or(CoordinatorError::JobNotFound)?;
            if job.state != JobState::Queued {
                return Err(CoordinatorError::ConflictState);
            }
            let old_key = (job.state, job.requested_at);
            job.state = JobState::Running;
            job.assigned_miner_id = Some(miner_id.clone());
            job.started_at = Some(now);
            job.attempts += 1;
            #[cfg(debug_assertions)]
            job.check_invariants();
            (old_key, job.clone())
        };

        if let Some(miner) = state.miners.get_mut(miner_id) {
            miner.inflight += 1;
        }

        let new_key = (snapshot.state, snapshot.requested_at);
        Self::reindex_job_state(&mut state, job_id, Some(old_key), new_key);
        Ok(snapshot)
    }

    async fn release_job(
        &self,
        job_id: JobId,
        miner_id: &MinerId,
        f: Box<dyn for<'a> FnOnce(&'a mut Job) -> Result<()> + Send>,
    ) -> Result<Job> {
        let mut state = self.inner.write().await;

        let (old_key, snapshot) = {
            let job = state
                .jobs
                .get_mut(&job_id)
                .ok_or(CoordinatorError::JobNotFound)?;
            let old_key = (job.state, job.requested_at);
            f(job)?;
            #[cfg(debug_assertions)]
            job.check_invariants();
            (old_key, job.clone())
        };

        if let Some(miner) = state.miners.get_mut(miner_id) {
            miner.inflight = miner.inflight.saturating_sub(1);
        }

        let new_key = (snapshot.state, snapshot.requested_at);
        Self::reindex_job_state(&mut state, job_id, Some(old_key), new_key);
        Ok(snapshot)
    }

    async fn jobs_by_state(&self, job_state: JobState) -> Result<Vec<Job>> {
        let state = self.inner.read().await;
        Ok(state
            .jobs_by_state
            .get(&job_state)
            .into_iter()
            .flatten()
            .filter_map(|(_, id)| state.jobs.get(id).cloned())
            .collect())
    }

    async fn jobs_assigned_to(&self, miner_id: &MinerId, job_state: JobState) -> Result<Vec<Job>> {
        let state = self.inner.read().await;
        Ok(state
            .jobs
            .values()
            .filter(|j| j.state == job_state && j.assigned_miner_id.as_deref() == Some(miner_id.as_str()))
            .cloned()
            .collect())
    }

    async fn jobs_page(&self, job_state: Option<JobState>, limit: usize) -> Result<JobPage> {
        let state = self.inner.read().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| job_state.map_or(true, |s| j.state == s))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| (j.requested_at, j.job_id));
        jobs.truncate(limit);
        Ok(JobPage { jobs })
    }

    async fn upsert_miner(&self, miner: Miner) -> Result<Miner> {
        let mut state = self.inner.write().await;
        state
            .heartbeat_index
            .retain(|(_, id)| id != &miner.miner_id);
        state
            .heartbeat_index
            .insert((miner.heartbeat_at, miner.miner_id.clone()));
        state.miners.insert(miner.miner_id.clone(), miner.clone());
        Ok(miner)
    }

    async fn get_miner(&self, miner_id: &MinerId) -> Result<Miner> {
        self.try_get_miner(miner_id)
            .await?
            .ok_or(CoordinatorError::JobNotFound)
    }

    async fn try_get_miner(&self, miner_id: &MinerId) -> Result<Option<Miner>> {
        let state = self.inner.read().await;
        Ok(state.miners.get(miner_id).cloned())
    }

    async fn update_miner(
        &self,
        miner_id: &MinerId,
        f: Box<dyn for<'a> FnOnce(&'a mut Miner) + Send>,
    ) -> Result<Miner> {
        let mut state = self.inner.write().await;
        let old_heartbeat = state.miners.get(miner_id).map(|m| m.heartbeat_at);
        let miner = state
            .miners
            .get_mut(miner_id)
            .ok_or(CoordinatorError::JobNotFound)?;
        f(miner);
        let snapshot = miner.clone();
        if old_heartbeat != Some(snapshot.heartbeat_at) {
            if let Some(old) = old_heartbeat {
                state.heartbeat_index.remove(&(old, miner_id.clone()));
            }
            state
                .heartbeat_index
                .insert((snapshot.heartbeat_at, miner_id.clone()));
        }
        Ok(snapshot)
    }

    async fn online_miners(&self) -> Result<Vec<Miner>> {
        let state = self.inner.read().await;
        Ok(state
            .miners
            .values()
            .filter(|m| m.status == crate::model::MinerStatus::Online)
            .cloned()
            .collect())
    }

    async fn all_miners(&self) -> Result<Vec<Miner>> {
        let state = self.inner.read().await;
        Ok(state.miners.values().cloned().collect())
    }

    async fn stale_miners(&self, cutoff: UnixSeconds) -> Result<Vec<Miner>> {
        let state = self.inner.read().await;
        Ok(state
            .heartbeat_index
            .iter()
            .take_while(|(hb, _)| *hb < cutoff)
            .filter_map(|(_, id)| state.miners.get(id))
            .filter(|m| m.status != crate::model::MinerStatus::Offline)
            .cloned()
            .collect())
    }

    async fn append_receipt(&self, receipt: Receipt) -> Result<()> {
        let mut state = self.inner.write().await;
        state
            .receipts
            .entry(receipt.payload.job_id)
            .or_default()
            .push(receipt);
        Ok(())
    }

    async fn latest_receipt(&self, job_id: JobId) -> Result<Option<Receipt>> {
        let state = self.inner.read().await;
        Ok(state.receipts.get(&job_id).and_then(|v| v.last().cloned()))
    }

    async fn receipt_history(&self, job_id: JobId) -> Result<Vec<Receipt>> {
        let state = self.inner.read().await;
        Ok(state.receipts.get(&job_id).cloned().unwrap_or_default())
    }

    async fn find_receipt_by_nonce(&self, job_id: JobId, nonce: &str) -> Result<Option<Receipt>> {
        let state = self.inner.read().await;
        Ok(state
            .receipts
            .get(&job_id)
            .and_then(|v| v.iter().find(|r| r.payload.nonce == nonce).cloned()))
    }

    async fn append_attempt(&self, attempt: Attempt) -> Result<()> {
        let mut state = self.inner.write().await;
        state.attempts.entry(attempt.job_id).or_default().push(attempt);
        Ok(())
    }

    async fn close_attempt(
        &self,
        job_id: JobId,
        attempt_number: u32,
        f: Box<dyn for<'a> FnOnce(&'a mut Attempt) + Send>,
    ) -> Result<()> {
        let mut state = self.inner.write().await;
        let attempts = state.attempts.entry(job_id).or_default();
        if let Some(attempt) = attempts
            .iter_mut()
            .find(|a| a.attempt_number == attempt_number)
        {
            f(attempt);
        }
        Ok(())
    }

    async fn attempts_for(&self, job_id: JobId) -> Result<Vec<Attempt>> {
        let state = self.inner.read().await;
        Ok(state.attempts.get(&job_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Constraints, JobState};

    fn sample_job(id: JobId, requested_at: UnixSeconds) -> Job {
        Job {
            job_id: id,
            client_id: "ck-1".to_string(),
            payload: serde_json::json!({"p": 1}),
            constraints: Constraints::default(),
            requested_at,
            expires_at: requested_at + 60,
            started_at: None,
            finished_at: None,
            state: JobState::Queued,
            assigned_miner_id: None,
            attempts: 0,
            result: None,
            result_ref: None,
            error: None,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn jobs_by_state_orders_by_requested_at() {
        let store = MemoryStore::new();
        let a = JobId::new();
        let b = JobId::new();
        store.insert_job(sample_job(b, 200)).await.unwrap();
        store.insert_job(sample_job(a, 100)).await.unwrap();

        let queued = store.jobs_by_state(JobState::Queued).await.unwrap();
        assert_eq!(queued[0].job_id, a);
        assert_eq!(queued[1].job_id, b);
    }

    #[tokio::test]
    async fn update_job_reindexes_on_state_change() {
        let store = MemoryStore::new();
        let id = JobId::new();
        store.insert_job(sample_job(id, 100)).await.unwrap();

        store
            .update_job(
                id,
                Box::new(|job| {
                    job.state = JobState::Canceled;
                    job.finished_at = Some(150);
                    Ok(())
                }),
            )
            .await
            .unwrap();

        assert!(store.jobs_by_state(JobState::Queued).await.unwrap().is_empty());
        assert_eq!(store.jobs_by_state(JobState::Canceled).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_update_leaves_job_untouched() {
        let store = MemoryStore::new();
        let id = JobId::new();
        store.insert_job(sample_job(id, 100)).await.unwrap();

        let result = store
            .update_job(id, Box::new(|_job| Err(CoordinatorError::ConflictState)))
            .await;
        assert!(result.is_err());
        let job = store.get_job(id).await.unwrap();
        assert_eq!(job.state, JobState::Queued);
    }
}
