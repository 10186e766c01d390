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

//! `Store` is the persistence capability interface: a table-shaped,
//! transactionally-updatable home for jobs, miners, receipts and attempts.
//! It is deliberately small — every multi-field mutation is expressed as a
//! closure run under one write acquisition, which is this trait's stand-in
//! for "select ... for update".
//!
//! This repo ships exactly one implementation, [`memory::MemoryStore`],
//! which is also what the test suite exercises directly — no mocks needed.

pub mod memory;

use async_trait::async_trait;

use crate::clock::UnixSeconds;
use crate::error::Result;
use crate::model::{Attempt, ClientId, Job, JobId, JobState, Miner, MinerId, Receipt};

/// A page of jobs for the admin listing endpoint.
pub struct JobPage {
    pub jobs: Vec<Job>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- jobs ---------------------------------------------------------
    async fn insert_job(&self, job: Job) -> Result<()>;
    async fn get_job(&self, job_id: JobId) -> Result<Job>;
    async fn find_idempotent_job(
        &self,
        client_id: &ClientId,
        idempotency_key: &str,
    ) -> Result<Option<JobId>>;

    /// Runs `f` against the stored job under a single write acquisition and
    /// returns the post-mutation snapshot. `f` returning `Err` aborts the
    /// mutation; the stored row is left untouched.
    async fn update_job(
        &self,
        job_id: JobId,
        f: Box<dyn for<'a> FnOnce(&'a mut Job) -> Result<()> + Send>,
    ) -> Result<Job>;

    /// Atomically transitions `job_id` from QUEUED to RUNNING and
    /// increments `miner_id`'s `inflight`, re-checking under the same lock
    /// that the job is still QUEUED and the miner still has spare capacity.
    /// Returns `CONFLICT_STATE` if either precondition no longer holds, so
    /// the matcher can move on to the next candidate.
    async fn assign_job(&self, job_id: JobId, miner_id: &MinerId, now: UnixSeconds) -> Result<Job>;

    /// Atomically mutates `job_id` via `f` and decrements `miner_id`'s
    /// `inflight` (floored at zero) under the same write acquisition.
    /// Covers every RUNNING -> {COMPLETED, FAILED, CANCELED, QUEUED}
    /// transition.
    async fn release_job(
        &self,
        job_id: JobId,
        miner_id: &MinerId,
        f: Box<dyn for<'a> FnOnce(&'a mut Job) -> Result<()> + Send>,
    ) -> Result<Job>;

    /// Jobs in `state`, ordered by `requested_at` ascending with a
    /// `job_id` tie-break.
    async fn jobs_by_state(&self, state: JobState) -> Result<Vec<Job>>;

    async fn jobs_assigned_to(&self, miner_id: &MinerId, state: JobState) -> Result<Vec<Job>>;

    async fn jobs_page(&self, state: Option<JobState>, limit: usize) -> Result<JobPage>;

    // --- miners ---------------------------------------------------------
    async fn upsert_miner(&self, miner: Miner) -> Result<Miner>;
    async fn get_miner(&self, miner_id: &MinerId) -> Result<Miner>;
    async fn try_get_miner(&self, miner_id: &MinerId) -> Result<Option<Miner>>;

    async fn update_miner(
        &self,
        miner_id: &MinerId,
        f: Box<dyn for<'a> FnOnce(&'a mut Miner) + Send>,
    ) -> Result<Miner>;

    async fn online_miners(&self) -> Result<Vec<Miner>>;
    async fn all_miners(&self) -> Result<Vec<Miner>>;

    /// Miners whose `heartbeat_at` is older than `cutoff` and are not
    /// already `OFFLINE`.
    async fn stale_miners(&self, cutoff: UnixSeconds) -> Result<Vec<Miner>>;

    // --- receipts ---------------------------------------------------------
    async fn append_receipt(&self, receipt: Receipt) -> Result<()>;
    async fn latest_receipt(&self, job_id: JobId) -> Result<Option<Receipt>>;
    async fn receipt_history(&self, job_id: JobId) -> Result<Vec<Receipt>>;
    async fn find_receipt_by_nonce(&self, job_id: JobId, nonce: &str) -> Result<Option<Receipt>>;

    // --- attempts ---------------------------------------------------------
    async fn append_attempt(&self, attempt: Attempt) -> Result<()>;
    async fn close_attempt(
        &self,
        job_id: JobId,
        attempt_number: u32,
        f: Box<dyn for<'a> FnOnce(&'a mut Attempt) + Send>,
    ) -> Result<()>;
    async fn attempts_for(&self, job_id: JobId) -> Result<Vec<Attempt>>;
}
