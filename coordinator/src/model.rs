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

//! Core data model: jobs, miners, receipts and attempts, plus the small
//! value types shared between them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::UnixSeconds;

pub type ClientId = String;
pub type MinerId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A predicate over miner capabilities that a job requires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Constraints {
    pub gpu_model_prefix: Option<String>,
    pub min_vram_gib: Option<u32>,
    pub required_model_tags: Vec<String>,
    pub region: Option<String>,
    pub max_price_per_hour: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Canceled,
    Expired,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Canceled | Self::Expired
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub client_id: ClientId,
    pub payload: serde_json::Value,
    pub constraints: Constraints,
    pub requested_at: UnixSeconds,
    pub expires_at: UnixSeconds,
    pub started_at: Option<UnixSeconds>,
    pub finished_at: Option<UnixSeconds>,
    pub state: JobState,
    pub assigned_miner_id: Option<MinerId>,
    pub attempts: u32,
    pub result: Option<serde_json::Value>,
    pub result_ref: Option<String>,
    pub error: Option<String>,
    pub idempotency_key: Option<String>,
}

impl Job {
    /// Checks invariants that must hold for every row after any mutation.
    /// Debug-only: a violation here means a caller built an inconsistent
    /// `Job` by hand rather than through the queue's transition helpers.
    #[cfg(debug_assertions)]
    pub fn check_invariants(&self) {
        let assigned_states = matches!(
            self.state,
            JobState::Running | JobState::Completed | JobState::Failed
        );
        debug_assert_eq!(self.assigned_miner_id.is_some(), assigned_states);
        debug_assert_eq!(self.started_at.is_some(), assigned_states);
        debug_assert_eq!(self.finished_at.is_some(), self.state.is_terminal());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MinerStatus {
    Online,
    Draining,
    Offline,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Capabilities {
    pub gpu_model: String,
    pub gpu_memory_gib: u32,
    pub gpu_count: u32,
    pub cuda_version: String,
    pub supported_models: Vec<String>,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Miner {
    pub miner_id: MinerId,
    pub capabilities: Capabilities,
    pub concurrency: u32,
    pub price_per_hour: Option<f64>,
    pub heartbeat_at: UnixSeconds,
    pub status: MinerStatus,
    pub inflight: u32,
}

impl Miner {
    pub fn is_eligible_for(&self, constraints: &Constraints) -> bool {
        if self.status != MinerStatus::Online {
            return false;
        }
        if self.inflight >= self.concurrency {
            return false;
        }
        if let Some(prefix) = &constraints.gpu_model_prefix {
            if !self.capabilities.gpu_model.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(min_vram) = constraints.min_vram_gib {
            if self.capabilities.gpu_memory_gib < min_vram {
                return false;
            }
        }
        if let Some(region) = &constraints.region {
            if &self.capabilities.region != region {
                return false;
            }
        }
        if !constraints.required_model_tags.is_empty() {
            let supported: BTreeSet<&str> = self
                .capabilities
                .supported_models
                .iter()
                .map(String::as_str)
                .collect();
            if !constraints
                .required_model_tags
                .iter()
                .all(|tag| supported.contains(tag.as_str()))
            {
                return false;
            }
        }
        if let Some(max_price) = constraints.max_price_per_hour {
            match self.price_per_hour {
                Some(price) if price <= max_price => {}
                _ => return false,
            }
        }
        true
    }
}

/// Unit type for receipt metering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    GpuSeconds,
    Tokens,
    Requests,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    pub public_key: String,
    pub sig: String,
    pub algo: String,
}

/// The canonical (unsigned) fields of a receipt, i.e. exactly the signing
/// input. Kept separate from [`Receipt`] so canonicalization can never
/// accidentally include the signature fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptPayload {
    pub job_id: JobId,
    pub provider: MinerId,
    pub client: ClientId,
    pub units: f64,
    pub unit_type: UnitType,
    pub model: String,
    pub prompt_hash: String,
    pub started_at: UnixSeconds,
    pub finished_at: UnixSeconds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_sha256: Option<String>,
    pub nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hub_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: String,
    #[serde(flatten)]
    pub payload: ReceiptPayload,
    pub signature: SignatureEnvelope,
    pub attestations: Vec<SignatureEnvelope>,
    pub created_at: UnixSeconds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Running,
    Completed,
    Failed,
    Requeued,
    CanceledWhileRunning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub job_id: JobId,
    pub attempt_number: u32,
    pub miner_id: MinerId,
    pub started_at: UnixSeconds,
    pub ended_at: Option<UnixSeconds>,
    pub outcome: AttemptOutcome,
}
