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

//! The job queue owns the state machine: intake validation, idempotency,
//! TTL expiry, cancellation, and re-queueing work orphaned by a lost miner.
//! It never talks to miners directly — that's the matcher's job — but it
//! does own the transitions that move a job in and out of QUEUED.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{CoordinatorError, Result};
use crate::metrics::Metrics;
use crate::model::{AttemptOutcome, Constraints, Job, JobId, JobState, MinerId};
use crate::store::Store;
use crate::waiter::Notifier;

/// Hard ceiling on a submitted payload's serialized size, independent of
/// any particular field; keeps one oversized job from dominating memory.
const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

pub struct JobQueue {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifier: Arc<Notifier>,
    metrics: Arc<Metrics>,
    ttl_min: u64,
    ttl_max: u64,
    max_attempts: u32,
}

impl JobQueue {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        notifier: Arc<Notifier>,
        metrics: Arc<Metrics>,
        ttl_min: u64,
        ttl_max: u64,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            metrics,
            ttl_min,
            ttl_max,
            max_attempts,
        }
    }

    /// Validates, dedupes against `idempotency_key` and enqueues a job.
    /// A retried submission with the same `(client_id, idempotency_key)`
    /// returns the original `job_id` rather than creating a second job,
    /// regardless of whether the payload on the retry matches.
    pub async fn submit(
        &self,
        client_id: String,
        payload: serde_json::Value,
        constraints: Constraints,
        ttl_seconds: u64,
        idempotency_key: Option<String>,
    ) -> Result<JobId> {
        if serde_json::to_vec(&payload)
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX)
            > MAX_PAYLOAD_BYTES
        {
            return Err(CoordinatorError::InvalidPayload {
                reason: "payload exceeds maximum size".to_string(),
            });
        }
        if !(self.ttl_min..=self.ttl_max).contains(&ttl_seconds) {
            return Err(CoordinatorError::TtlOutOfRange {
                min: self.ttl_min,
                max: self.ttl_max,
            });
        }

        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.store.find_idempotent_job(&client_id, key).await? {
                return Ok(existing);
            }
        }

        let now = self.clock.now();
        let job = Job {
            job_id: JobId::new(),
            client_id,
            payload,
            constraints,
            requested_at: now,
            expires_at: now + ttl_seconds,
            started_at: None,
            finished_at: None,
            state: JobState::Queued,
            assigned_miner_id: None,
            attempts: 0,
            result: None,
            result_ref: None,
            error: None,
            idempotency_key,
        };
        let job_id = job.job_id;
        self.store.insert_job(job).await?;
        self.notifier.notify();
        self.metrics.inc_submitted();
        info!(job_id = %job_id, "job submitted");
        Ok(job_id)
    }

    /// Cancels a QUEUED or RUNNING job owned by `client_id`. Canceling a
    /// RUNNING job just marks it CANCELED; the miner's result, if it ever
    /// arrives, is accepted and recorded but no longer changes the job's
    /// outward state. Canceling a job that already reached any terminal
    /// state (CANCELED, EXPIRED, COMPLETED, FAILED) is a no-op that returns
    /// the job as-is, so a client retrying a cancel call never sees an
    /// error for having "won" a race against expiry or completion.
    pub async fn cancel(&self, client_id: &str, job_id: JobId) -> Result<Job> {
        let job = self.store.get_job(job_id).await?;
        if job.client_id != client_id {
            return Err(CoordinatorError::Forbidden);
        }
        if job.state.is_terminal() {
            return Ok(job);
        }

        let now = self.clock.now();
        let attempt_number = job.attempts;
        let result = if let Some(miner_id) = job.assigned_miner_id.clone() {
            let outcome = self
                .store
                .release_job(
                    job_id,
                    &miner_id,
                    Box::new(move |job| {
                        if job.state.is_terminal() {
                            return Err(CoordinatorError::ConflictState);
                        }
                        job.state = JobState::Canceled;
                        job.finished_at = Some(now);
                        job.assigned_miner_id = None;
                        job.started_at = None;
                        Ok(())
                    }),
                )
                .await;
            if outcome.is_ok() {
                self.close_attempt(job_id, attempt_number, now, AttemptOutcome::CanceledWhileRunning)
                    .await;
            }
            outcome
        } else {
            self.store
                .update_job(
                    job_id,
                    Box::new(move |job| {
                        if job.state != JobState::Queued {
                            return Err(CoordinatorError::ConflictState);
                        }
                        job.state = JobState::Canceled;
                        job.finished_at = Some(now);
                        Ok(())
                    }),
                )
                .await
        };
        if result.is_ok() {
            self.metrics.inc_canceled();
        }
        result
    }

    /// Marks a job the caller holds as FAILED with `error`. Only the miner
    /// currently assigned to the job may do this.
    pub async fn fail(&self, miner_id: &str, job_id: JobId, error: String) -> Result<Job> {
        let job = self.store.get_job(job_id).await?;
        if job.state != JobState::Running || job.assigned_miner_id.as_deref() != Some(miner_id) {
            return Err(CoordinatorError::ConflictState);
        }
        let now = self.clock.now();
        let attempt_number = job.attempts;
        let miner_id_owned = miner_id.to_string();
        let result = self
            .store
            .release_job(
                job_id,
                &miner_id_owned,
                Box::new(move |job| {
                    if job.state != JobState::Running {
                        return Err(CoordinatorError::ConflictState);
                    }
                    job.state = JobState::Failed;
                    job.finished_at = Some(now);
                    job.error = Some(error);
                    Ok(())
                }),
            )
            .await;
        if result.is_ok() {
            self.metrics.inc_failed();
            self.close_attempt(job_id, attempt_number, now, AttemptOutcome::Failed).await;
        }
        result
    }

    /// Marks the attempt for `(job_id, attempt_number)` closed with
    /// `outcome`. Best-effort: a missing attempt row (e.g. a job submitted
    /// before this audit trail existed) never blocks the job transition
    /// that triggered it.
    async fn close_attempt(&self, job_id: JobId, attempt_number: u32, ended_at: crate::clock::UnixSeconds, outcome: AttemptOutcome) {
        let result = self
            .store
            .close_attempt(
                job_id,
                attempt_number,
                Box::new(move |attempt| {
                    attempt.ended_at = Some(ended_at);
                    attempt.outcome = outcome;
                }),
            )
            .await;
        if let Err(e) = result {
            warn!(job_id = %job_id, error = %e, "failed to close attempt record");
        }
    }

    /// Expires QUEUED jobs whose `expires_at` has passed. Run periodically
    /// from the same background task that drives the miner reaper.
    pub async fn tick_expiry(&self) -> Result<()> {
        let now = self.clock.now();
        let queued = self.store.jobs_by_state(JobState::Queued).await?;
        for job in queued {
            if job.expires_at > now {
                continue;
            }
            let job_id = job.job_id;
            let outcome = self
                .store
                .update_job(
                    job_id,
                    Box::new(move |job| {
                        if job.state != JobState::Queued {
                            return Err(CoordinatorError::ConflictState);
                        }
                        job.state = JobState::Expired;
                        job.finished_at = Some(now);
                        Ok(())
                    }),
                )
                .await;
            match outcome {
                Ok(_) => self.metrics.inc_expired(),
                Err(e) => warn!(job_id = %job_id, error = %e, "expiry transition skipped"),
            }
        }
        Ok(())
    }

    /// Re-queues every RUNNING job assigned to a miner the reaper just
    /// marked OFFLINE. A job that has already exhausted `max_attempts`
    /// attempts is instead abandoned as FAILED rather than re-queued again.
    pub async fn on_miner_offline(&self, miner_id: &MinerId) -> Result<()> {
        let now = self.clock.now();
        let running = self.store.jobs_assigned_to(miner_id, JobState::Running).await?;
        for job in running {
            let job_id = job.job_id;
            let attempt_number = job.attempts;
            let abandon = job.attempts >= self.max_attempts;
            let result = self
                .store
                .release_job(
                    job_id,
                    miner_id,
                    Box::new(move |job| {
                        if job.state != JobState::Running {
                            return Err(CoordinatorError::ConflictState);
                        }
                        if abandon {
                            job.state = JobState::Failed;
                            job.finished_at = Some(now);
                            job.error = Some("abandoned: exceeded max attempts after miner loss".to_string());
                        } else {
                            job.state = JobState::Queued;
                            job.assigned_miner_id = None;
                            job.started_at = None;
                        }
                        Ok(())
                    }),
                )
                .await;
            match result {
                Ok(_) if !abandon => {
                    self.close_attempt(job_id, attempt_number, now, AttemptOutcome::Requeued).await;
                    self.notifier.notify();
                    info!(job_id = %job_id, miner_id = %miner_id, "job re-queued after miner loss");
                }
                Ok(_) => {
                    self.close_attempt(job_id, attempt_number, now, AttemptOutcome::Failed).await;
                    self.metrics.inc_failed();
                    warn!(job_id = %job_id, miner_id = %miner_id, "job abandoned after repeated miner loss");
                }
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "re-queue on miner loss skipped");
                }
            }
        }
        Ok(())
    }
}

/// Spawns the periodic expiry scan as its own long-running background
/// unit, independent from the miner reaper so a slow expiry scan never
/// delays heartbeat liveness checks. Runs until `shutdown` resolves.
pub fn spawn_expiry_ticker(
    queue: Arc<JobQueue>,
    period: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = queue.tick_expiry().await {
                        warn!(error = %e, "expiry scan failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}
