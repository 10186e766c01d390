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

//! Handlers for the client-facing surface: submit, inspect, cancel and
//! fetch results/receipts for jobs the caller owns.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::coordinator::Coordinator;
use crate::model::{Constraints, Job, JobId, Receipt};

use super::envelope::ApiError;
use super::require_client;

#[derive(Deserialize)]
pub struct SubmitJobRequest {
    pub payload: serde_json::Value,
    #[serde(default)]
    pub constraints: Constraints,
    pub ttl_seconds: u64,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Serialize)]
pub struct SubmitJobResponse {
    pub job_id: JobId,
}

pub async fn submit_job(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
    Json(req): Json<SubmitJobRequest>,
) -> Result<Json<SubmitJobResponse>, ApiError> {
    let client_id = require_client(&coordinator, &headers).await?;
    let job_id = coordinator
        .submit_job(client_id, req.payload, req.constraints, req.ttl_seconds, req.idempotency_key)
        .await?;
    Ok(Json(SubmitJobResponse { job_id }))
}

pub async fn get_job(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<Json<Job>, ApiError> {
    let client_id = require_client(&coordinator, &headers).await?;
    let job = coordinator.get_job(&client_id, job_id).await?;
    Ok(Json(job))
}

#[derive(Serialize)]
pub struct JobResultResponse {
    pub job_id: JobId,
    pub result: Option<serde_json::Value>,
    pub result_ref: Option<String>,
    pub finished_at: Option<u64>,
}

/// `200` only once the job is COMPLETED; `JOB_NOT_READY` (mapped to `429`)
/// while it's still queued/running, `CONFLICT_STATE` (`410`) once it has
/// terminated any other way.
pub async fn get_result(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<Json<JobResultResponse>, ApiError> {
    let client_id = require_client(&coordinator, &headers).await?;
    let job = coordinator.get_result(&client_id, job_id).await?;
    Ok(Json(JobResultResponse {
        job_id: job.job_id,
        result: job.result,
        result_ref: job.result_ref,
        finished_at: job.finished_at,
    }))
}

pub async fn cancel_job(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<Json<Job>, ApiError> {
    let client_id = require_client(&coordinator, &headers).await?;
    let job = coordinator.cancel_job(&client_id, job_id).await?;
    Ok(Json(job))
}

pub async fn latest_receipt(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<Json<Receipt>, ApiError> {
    let client_id = require_client(&coordinator, &headers).await?;
    let job = coordinator.get_job(&client_id, job_id).await?;
    let receipt = coordinator.latest_receipt(job.job_id).await?;
    Ok(Json(receipt))
}

pub async fn receipt_history(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<Json<Vec<Receipt>>, ApiError> {
    let client_id = require_client(&coordinator, &headers).await?;
    let job = coordinator.get_job(&client_id, job_id).await?;
    let receipts = coordinator.receipt_history(job.job_id).await?;
    Ok(Json(receipts))
}
