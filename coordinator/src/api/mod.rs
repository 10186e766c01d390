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

//! Assembles the axum `Router`: route table plus the bearer-key
//! authentication and per-key rate limiting every handler goes through
//! before it ever touches [`Coordinator`]. Handlers are grouped by
//! audience, one submodule per principal kind.

pub mod admin;
pub mod client;
pub mod envelope;
pub mod miner;

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::auth::Principal;
use crate::coordinator::Coordinator;
use crate::error::CoordinatorError;

use envelope::ApiError;

pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/v1/healthz", get(healthz))
        .route("/v1/jobs", post(client::submit_job))
        .route("/v1/jobs/:job_id", get(client::get_job))
        .route("/v1/jobs/:job_id/result", get(client::get_result))
        .route("/v1/jobs/:job_id/cancel", post(client::cancel_job))
        .route("/v1/jobs/:job_id/receipt", get(client::latest_receipt))
        .route("/v1/jobs/:job_id/receipts", get(client::receipt_history))
        .route("/v1/miners/register", post(miner::register))
        .route("/v1/miners/heartbeat", post(miner::heartbeat))
        .route("/v1/miners/poll", post(miner::poll))
        .route("/v1/miners/:job_id/result", post(miner::submit_result))
        .route("/v1/miners/:job_id/fail", post(miner::fail_job))
        .route("/v1/miners/drain", post(miner::drain))
        .route("/v1/admin/stats", get(admin::stats))
        .route("/v1/admin/jobs", get(admin::jobs))
        .route("/v1/admin/miners", get(admin::miners))
        .route("/v1/admin/metrics", get(admin::metrics))
        .with_state(coordinator)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn healthz() -> Json<Health> {
    Json(Health { status: "ok" })
}

fn bearer_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

/// Resolves the caller's principal and charges the attempt against that
/// key's sliding window, in that order: an unauthenticated caller never
/// consumes rate-limit budget that belongs to someone else's key.
async fn authorize(coordinator: &Coordinator, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let key = bearer_key(headers);
    let principal = crate::auth::authenticate(&coordinator.settings, key)?;
    if let Some(key) = key {
        coordinator.rate_limiter.check(key, coordinator.clock.as_ref())?;
    }
    Ok(principal)
}

pub(crate) async fn require_client(coordinator: &Coordinator, headers: &HeaderMap) -> Result<String, ApiError> {
    match authorize(coordinator, headers).await? {
        Principal::Client(id) => Ok(id),
        _ => Err(CoordinatorError::UnauthorizedKey.into()),
    }
}

pub(crate) async fn require_miner(coordinator: &Coordinator, headers: &HeaderMap) -> Result<String, ApiError> {
    match authorize(coordinator, headers).await? {
        Principal::Miner(id) => Ok(id),
        _ => Err(CoordinatorError::UnauthorizedKey.into()),
    }
}

pub(crate) async fn require_admin(coordinator: &Coordinator, headers: &HeaderMap) -> Result<(), ApiError> {
    match authorize(coordinator, headers).await? {
        Principal::Admin => Ok(()),
        _ => Err(CoordinatorError::UnauthorizedKey.into()),
    }
}
