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

//! Handlers for the admin surface: operational visibility only, no state
//! mutation. `metrics` renders the same counters as `stats` but in
//! Prometheus exposition format for scraping.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::coordinator::Coordinator;
use crate::metrics::AdminStats;
use crate::model::{Job, JobState, Miner};

use super::envelope::ApiError;
use super::require_admin;

pub async fn stats(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
) -> Result<Json<AdminStats>, ApiError> {
    require_admin(&coordinator, &headers).await?;
    Ok(Json(coordinator.admin_stats().await?))
}

fn default_limit() -> usize {
    100
}

#[derive(Deserialize)]
pub struct JobsQuery {
    #[serde(default)]
    pub state: Option<JobState>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn jobs(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
    Query(query): Query<JobsQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    require_admin(&coordinator, &headers).await?;
    let page = coordinator.admin_jobs(query.state, query.limit).await?;
    Ok(Json(page.jobs))
}

pub async fn miners(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Miner>>, ApiError> {
    require_admin(&coordinator, &headers).await?;
    Ok(Json(coordinator.admin_miners().await?))
}

pub async fn metrics(
    State(coordinator): State<Arc<Coordinator>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    require_admin(&coordinator, &headers).await?;
    Ok(coordinator.render_prometheus().into_response())
}
