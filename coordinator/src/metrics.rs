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

//! Cumulative operational counters and the windowed admin stats view.
//! Counters are plain atomics, consistent with how the rest of this crate
//! avoids pulling in a metrics framework for a handful of numbers; the
//! admin HTTP layer is the only consumer, both as JSON (`/v1/admin/stats`)
//! and as Prometheus text (`/v1/admin/metrics`).

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::model::{JobState, MinerStatus};
use crate::store::Store;

#[derive(Default)]
pub struct Metrics {
    pub jobs_submitted: AtomicU64,
    pub jobs_completed: AtomicU64,
    pub jobs_failed: AtomicU64,
    pub jobs_expired: AtomicU64,
    pub jobs_canceled: AtomicU64,
    pub receipts_signed: AtomicU64,
    pub polls_matched: AtomicU64,
    pub polls_timed_out: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_expired(&self) {
        self.jobs_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_canceled(&self) {
        self.jobs_canceled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_receipts_signed(&self) {
        self.receipts_signed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_poll_matched(&self) {
        self.polls_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_poll_timed_out(&self) {
        self.polls_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Renders every counter as Prometheus exposition text.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        let lines: [(&str, u64); 8] = [
            ("coordinator_jobs_submitted_total", self.jobs_submitted.load(Ordering::Relaxed)),
            ("coordinator_jobs_completed_total", self.jobs_completed.load(Ordering::Relaxed)),
            ("coordinator_jobs_failed_total", self.jobs_failed.load(Ordering::Relaxed)),
            ("coordinator_jobs_expired_total", self.jobs_expired.load(Ordering::Relaxed)),
            ("coordinator_jobs_canceled_total", self.jobs_canceled.load(Ordering::Relaxed)),
            ("coordinator_receipts_signed_total", self.receipts_signed.load(Ordering::Relaxed)),
            ("coordinator_polls_matched_total", self.polls_matched.load(Ordering::Relaxed)),
            ("coordinator_polls_timed_out_total", self.polls_timed_out.load(Ordering::Relaxed)),
        ];
        for (name, value) in lines {
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}

/// The JSON body of `GET /v1/admin/stats`: a snapshot of the store's
/// current shape plus the process-lifetime counters above.
#[derive(Serialize)]
pub struct AdminStats {
    pub queue_depth: usize,
    pub running: usize,
    pub miners_online: usize,
    pub miners_total: usize,
    pub jobs_completed_total: u64,
    pub jobs_failed_total: u64,
    pub success_rate: f64,
}

pub async fn snapshot(store: &Arc<dyn Store>, metrics: &Metrics) -> crate::error::Result<AdminStats> {
    let queued = store.jobs_by_state(JobState::Queued).await?.len();
    let running = store.jobs_by_state(JobState::Running).await?.len();
    let miners = store.all_miners().await?;
    let miners_online = miners.iter().filter(|m| m.status == MinerStatus::Online).count();

    let completed = metrics.jobs_completed.load(Ordering::Relaxed);
    let failed = metrics.jobs_failed.load(Ordering::Relaxed);
    let total = completed + failed;
    let success_rate = if total == 0 { 1.0 } else { completed as f64 / total as f64 };

    Ok(AdminStats {
        queue_depth: queued,
        running,
        miners_online,
        miners_total: miners.len(),
        jobs_completed_total: completed,
        jobs_failed_total: failed,
        success_rate,
    })
}
