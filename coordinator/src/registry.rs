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

//! Miner registry: registration, heartbeats, draining and the periodic
//! reaper that marks heartbeat-stale miners `OFFLINE` and re-queues their
//! in-flight work.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::model::{Capabilities, Miner, MinerId, MinerStatus};
use crate::queue::JobQueue;
use crate::store::Store;
use crate::waiter::Notifier;

pub struct MinerRegistry {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl MinerRegistry {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Upserts capabilities; resets `inflight` to zero only for a
    /// brand-new miner, never for a re-registering one, since `inflight`
    /// must stay derived from actually-RUNNING jobs.
    pub async fn register(
        &self,
        miner_id: MinerId,
        capabilities: Capabilities,
        concurrency: u32,
        price_per_hour: Option<f64>,
    ) -> Result<Miner> {
        let now = self.clock.now();
        let existing = self.store.try_get_miner(&miner_id).await?;
        let inflight = existing.as_ref().map_or(0, |m| m.inflight);

        let miner = Miner {
            miner_id: miner_id.clone(),
            capabilities,
            concurrency,
            price_per_hour,
            heartbeat_at: now,
            status: MinerStatus::Online,
            inflight,
        };
        let stored = self.store.upsert_miner(miner).await?;
        info!(miner_id = %miner_id, "miner registered");
        Ok(stored)
    }

    /// Refreshes liveness; OFFLINE -> ONLINE.
    pub async fn heartbeat(&self, miner_id: &MinerId) -> Result<Miner> {
        let now = self.clock.now();
        let miner = self
            .store
            .update_miner(
                miner_id,
                Box::new(move |m| {
                    m.heartbeat_at = now;
                    if m.status == MinerStatus::Offline {
                        m.status = MinerStatus::Online;
                    }
                }),
            )
            .await?;
        Ok(miner)
    }

    /// Stops accepting new work; keeps `inflight` as-is.
    pub async fn drain(&self, miner_id: &MinerId) -> Result<Miner> {
        self.store
            .update_miner(
                miner_id,
                Box::new(|m| {
                    m.status = MinerStatus::Draining;
                }),
            )
            .await
    }

    pub async fn snapshot_online(&self) -> Result<Vec<Miner>> {
        self.store.online_miners().await
    }

    pub async fn all(&self) -> Result<Vec<Miner>> {
        self.store.all_miners().await
    }

    /// One reaper pass: offline any miner whose heartbeat is older than
    /// `heartbeat_timeout`, then re-queue its RUNNING jobs via
    /// `queue.on_miner_offline`.
    pub async fn reap_once(
        &self,
        queue: &JobQueue,
        notifier: &Notifier,
        heartbeat_timeout: u64,
    ) -> Result<()> {
        let now = self.clock.now();
        let cutoff = now.saturating_sub(heartbeat_timeout);
        let stale = self.store.stale_miners(cutoff).await?;

        for miner in stale {
            self.store
                .update_miner(
                    &miner.miner_id,
                    Box::new(|m| {
                        m.status = MinerStatus::Offline;
                    }),
                )
                .await?;
            warn!(miner_id = %miner.miner_id, "miner marked offline by reaper");
            queue.on_miner_offline(&miner.miner_id).await?;
            notifier.notify();
        }
        Ok(())
    }
}

/// Spawns the periodic reaper task as a long-running background unit that
/// shares read access to the store with the HTTP server. Runs until the
/// `shutdown` signal resolves.
pub fn spawn_reaper(
    registry: Arc<MinerRegistry>,
    queue: Arc<JobQueue>,
    notifier: Arc<Notifier>,
    period: Duration,
    heartbeat_timeout: u64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = registry.reap_once(&queue, &notifier, heartbeat_timeout).await {
                        warn!(error = %e, "reaper pass failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}
