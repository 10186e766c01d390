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

//! Handlers for the miner-facing surface. A miner's identity is always the
//! principal derived from its API key, never a client-supplied field, so
//! one miner can never register, poll or submit results under another
//! miner's name.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::coordinator::Coordinator;
use crate::model::{Capabilities, Job, JobId, Miner, Receipt, ReceiptPayload, SignatureEnvelope};

use super::envelope::ApiError;
use super::require_miner;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub capabilities: Capabilities,
    pub concurrency: u32,
    #[serde(default)]
    pub price_per_hour: Option<f64>,
}

pub async fn register(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Miner>, ApiError> {
    let miner_id = require_miner(&coordinator, &headers).await?;
    let miner = coordinator
        .register_miner(miner_id, req.capabilities, req.concurrency, req.price_per_hour)
        .await?;
    Ok(Json(miner))
}

#[derive(Deserialize)]
pub struct HeartbeatRequest {
    /// Advisory only: `inflight` is always derived from assigned RUNNING
    /// jobs, never taken from the caller's word for it.
    #[serde(default)]
    pub inflight_hint: Option<u32>,
}

pub async fn heartbeat(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<Miner>, ApiError> {
    let miner_id = require_miner(&coordinator, &headers).await?;
    let _ = req.inflight_hint;
    let miner = coordinator.heartbeat_miner(&miner_id).await?;
    Ok(Json(miner))
}

#[derive(Deserialize)]
pub struct PollRequest {
    #[serde(default)]
    pub max_wait_seconds: u64,
}

#[derive(Serialize)]
pub struct PollResponse {
    pub job: Option<Job>,
}

pub async fn poll(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
    Json(req): Json<PollRequest>,
) -> Result<Json<PollResponse>, ApiError> {
    let miner_id = require_miner(&coordinator, &headers).await?;
    let wait = req.max_wait_seconds.min(coordinator.settings.poll_cap_seconds);
    let job = coordinator.poll_for_job(&miner_id, Duration::from_secs(wait)).await?;
    Ok(Json(PollResponse { job }))
}

#[derive(Deserialize)]
pub struct ReceiptRequest {
    pub payload: ReceiptPayload,
    pub signature: SignatureEnvelope,
}

pub async fn submit_result(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
    Json(req): Json<ReceiptRequest>,
) -> Result<Json<Receipt>, ApiError> {
    let miner_id = require_miner(&coordinator, &headers).await?;
    if req.payload.job_id != job_id {
        return Err(crate::error::CoordinatorError::InvalidPayload {
            reason: "receipt payload job_id does not match the URL".to_string(),
        }
        .into());
    }
    let receipt = coordinator.submit_receipt(&miner_id, req.payload, req.signature).await?;
    Ok(Json(receipt))
}

#[derive(Deserialize)]
pub struct FailRequest {
    pub error: String,
}

pub async fn fail_job(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
    Json(req): Json<FailRequest>,
) -> Result<Json<Job>, ApiError> {
    let miner_id = require_miner(&coordinator, &headers).await?;
    let job = coordinator.fail_job(&miner_id, job_id, req.error).await?;
    Ok(Json(job))
}

pub async fn drain(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
) -> Result<Json<Miner>, ApiError> {
    let miner_id = require_miner(&coordinator, &headers).await?;
    let miner = coordinator.drain_miner(&miner_id).await?;
    Ok(Json(miner))
}
