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

//! Wires every capability (store, clock, notifier, signer) into the set of
//! high-level operations the HTTP handlers call. Kept free of any axum or
//! HTTP types so it can be exercised directly from tests.

use std::sync::Arc;
use std::time::Duration;

use coordinator_config::Settings;

use crate::auth::RateLimiter;
use crate::clock::Clock;
use crate::matcher::Matcher;
use crate::metrics::{AdminStats, Metrics};
use crate::model::{Capabilities, Constraints, Job, JobId, Miner, MinerId, Receipt, ReceiptPayload, SignatureEnvelope};
use crate::queue::JobQueue;
use crate::receipt::ReceiptService;
use crate::registry::MinerRegistry;
use crate::signer::Attester;
use crate::store::{JobPage, Store};
use crate::waiter::Notifier;

pub struct Coordinator {
    pub settings: Settings,
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<Notifier>,
    pub rate_limiter: RateLimiter,
    pub queue: Arc<JobQueue>,
    pub registry: Arc<MinerRegistry>,
    pub matcher: Matcher,
    pub receipts: ReceiptService,
    pub metrics: Arc<Metrics>,
}

impl Coordinator {
    pub fn new(settings: Settings, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        let notifier = Arc::new(Notifier::new());
        let metrics = Arc::new(Metrics::new());
        let queue = Arc::new(JobQueue::new(
            store.clone(),
            clock.clone(),
            notifier.clone(),
            metrics.clone(),
            settings.ttl_min_seconds,
            settings.ttl_max_seconds,
            settings.max_attempts,
        ));
        let registry = Arc::new(MinerRegistry::new(store.clone(), clock.clone()));
        let matcher = Matcher::new(store.clone(), clock.clone(), notifier.clone(), metrics.clone());

        let mut attesters = Vec::new();
        if let Some(seed) = settings.receipt_signing_key {
            attesters.push(Attester::from_seed(seed));
        }
        if let Some(seed) = settings.receipt_attestation_key {
            attesters.push(Attester::from_seed(seed));
        }
        let receipts = ReceiptService::new(store.clone(), clock.clone(), attesters, metrics.clone());

        let rate_limiter = RateLimiter::new(settings.rate_limit_window_seconds, settings.rate_limit_max_requests);

        Self {
            settings,
            store,
            clock,
            notifier,
            rate_limiter,
            queue,
            registry,
            matcher,
            receipts,
            metrics,
        }
    }

    pub async fn submit_job(
        &self,
        client_id: String,
        payload: serde_json::Value,
        constraints: Constraints,
        ttl_seconds: u64,
        idempotency_key: Option<String>,
    ) -> crate::error::Result<JobId> {
        self.queue
            .submit(client_id, payload, constraints, ttl_seconds, idempotency_key)
            .await
    }

    pub async fn get_job(&self, client_id: &str, job_id: JobId) -> crate::error::Result<Job> {
        let job = self.store.get_job(job_id).await?;
        if job.client_id != client_id {
            return Err(crate::error::CoordinatorError::Forbidden);
        }
        Ok(job)
    }

    pub async fn cancel_job(&self, client_id: &str, job_id: JobId) -> crate::error::Result<Job> {
        self.queue.cancel(client_id, job_id).await
    }

    /// Fetches a job owned by `client_id` and classifies its result
    /// readiness: `Ok(job)` only once the job is COMPLETED, `JOB_NOT_READY`
    /// while it's still QUEUED/RUNNING, `CONFLICT_STATE` once it's
    /// terminated any other way (the caller maps that to HTTP 410).
    pub async fn get_result(&self, client_id: &str, job_id: JobId) -> crate::error::Result<Job> {
        let job = self.get_job(client_id, job_id).await?;
        match job.state {
            crate::model::JobState::Completed => Ok(job),
            crate::model::JobState::Queued | crate::model::JobState::Running => {
                Err(crate::error::CoordinatorError::JobNotReady)
            }
            _ => Err(crate::error::CoordinatorError::ConflictState),
        }
    }

    pub async fn fail_job(&self, miner_id: &str, job_id: JobId, error: String) -> crate::error::Result<Job> {
        self.queue.fail(miner_id, job_id, error).await
    }

    pub async fn register_miner(
        &self,
        miner_id: MinerId,
        capabilities: Capabilities,
        concurrency: u32,
        price_per_hour: Option<f64>,
    ) -> crate::error::Result<Miner> {
        self.registry.register(miner_id, capabilities, concurrency, price_per_hour).await
    }

    pub async fn heartbeat_miner(&self, miner_id: &MinerId) -> crate::error::Result<Miner> {
        self.registry.heartbeat(miner_id).await
    }

    pub async fn drain_miner(&self, miner_id: &MinerId) -> crate::error::Result<Miner> {
        self.registry.drain(miner_id).await
    }

    pub async fn poll_for_job(&self, miner_id: &MinerId, timeout: Duration) -> crate::error::Result<Option<Job>> {
        self.matcher.poll(miner_id, timeout).await
    }

    pub async fn submit_receipt(
        &self,
        miner_id: &str,
        payload: ReceiptPayload,
        signature: SignatureEnvelope,
    ) -> crate::error::Result<Receipt> {
        self.receipts.submit(miner_id, payload, signature).await
    }

    pub async fn latest_receipt(&self, job_id: JobId) -> crate::error::Result<Receipt> {
        self.receipts.latest(job_id).await
    }

    pub async fn receipt_history(&self, job_id: JobId) -> crate::error::Result<Vec<Receipt>> {
        self.receipts.history(job_id).await
    }

    pub async fn admin_stats(&self) -> crate::error::Result<AdminStats> {
        crate::metrics::snapshot(&self.store, &self.metrics).await
    }

    pub async fn admin_jobs(&self, state: Option<crate::model::JobState>, limit: usize) -> crate::error::Result<JobPage> {
        self.store.jobs_page(state, limit).await
    }

    pub async fn admin_miners(&self) -> crate::error::Result<Vec<Miner>> {
        self.registry.all().await
    }

    pub fn render_prometheus(&self) -> String {
        self.metrics.render_prometheus()
    }
}
