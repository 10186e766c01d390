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

//! Matches a polling miner against the QUEUED backlog and performs the
//! atomic QUEUED -> RUNNING claim. Selection order is oldest-first
//! (`requested_at`, then `job_id` as a tie-break) so a miner that can
//! satisfy many jobs always takes the one waiting longest.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::clock::Clock;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::model::{Attempt, AttemptOutcome, Job, JobState, MinerId};
use crate::store::Store;
use crate::waiter::Notifier;

pub struct Matcher {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifier: Arc<Notifier>,
    metrics: Arc<Metrics>,
}

impl Matcher {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, notifier: Arc<Notifier>, metrics: Arc<Metrics>) -> Self {
        Self { store, clock, notifier, metrics }
    }

    /// One matching attempt: scans QUEUED jobs oldest-first, tries to claim
    /// the first one the miner is eligible for. Returns `None` immediately
    /// if nothing matches right now; the caller decides whether to long-poll.
    async fn try_match_once(&self, miner_id: &MinerId) -> Result<Option<Job>> {
        let miner = match self.store.try_get_miner(miner_id).await? {
            Some(m) => m,
            None => return Ok(None),
        };
        if miner.inflight >= miner.concurrency {
            return Ok(None);
        }

        let mut candidates = self.store.jobs_by_state(JobState::Queued).await?;
        candidates.sort_by_key(|j| (j.requested_at, j.job_id));

        for candidate in candidates {
            if !miner.is_eligible_for(&candidate.constraints) {
                continue;
            }
            let now = self.clock.now();
            match self.store.assign_job(candidate.job_id, miner_id, now).await {
                Ok(job) => {
                    self.store
                        .append_attempt(Attempt {
                            job_id: job.job_id,
                            attempt_number: job.attempts,
                            miner_id: miner_id.clone(),
                            started_at: now,
                            ended_at: None,
                            outcome: AttemptOutcome::Running,
                        })
                        .await?;
                    info!(job_id = %job.job_id, miner_id = %miner_id, "job assigned");
                    return Ok(Some(job));
                }
                // Another poller (or the reaper) beat us to this job or to
                // the miner's last concurrency slot; try the next candidate.
                Err(crate::error::CoordinatorError::ConflictState) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Long-polls for a job: tries immediately, then parks on the shared
    /// notifier (re-trying on every wake) until `timeout` elapses.
    pub async fn poll(&self, miner_id: &MinerId, timeout: Duration) -> Result<Option<Job>> {
        if let Some(job) = self.try_match_once(miner_id).await? {
            self.metrics.inc_poll_matched();
            return Ok(Some(job));
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                self.metrics.inc_poll_timed_out();
                return Ok(None);
            }
            let waiter = self.notifier.subscribe();
            if !waiter.wait(remaining).await {
                self.metrics.inc_poll_timed_out();
                return Ok(None);
            }
            if let Some(job) = self.try_match_once(miner_id).await? {
                self.metrics.inc_poll_matched();
                return Ok(Some(job));
            }
        }
    }
}
