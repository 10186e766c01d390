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

//! Drives the assembled `Router` itself via `tower::ServiceExt::oneshot`,
//! the one layer the scenario tests skip: route wiring, the
//! auth-then-rate-limit ordering in `api::authorize`, and
//! `api::envelope`'s error-to-status mapping.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use coordinator::clock::SystemClock;
use coordinator::store::memory::MemoryStore;
use coordinator::Coordinator;
use coordinator_config::{RawSettings, Settings};

fn settings(f: impl FnOnce(&mut RawSettings)) -> Settings {
    let mut raw = RawSettings::default();
    raw.client_api_keys = "client-key".to_string();
    raw.miner_api_keys = "miner-key".to_string();
    raw.admin_api_keys = "admin-key".to_string();
    f(&mut raw);
    Settings::from_raw(raw).expect("settings should validate")
}

fn app(f: impl FnOnce(&mut RawSettings)) -> axum::Router {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(SystemClock);
    let coordinator = Arc::new(Coordinator::new(settings(f), store, clock));
    coordinator::api::router(coordinator)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_needs_no_authentication() {
    let app = app(|_| {});
    let response = app
        .oneshot(Request::builder().uri("/v1/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_bearer_key_is_rejected_before_touching_the_coordinator() {
    let app = app(|_| {});
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/miners/heartbeat")
                .method("POST")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED_KEY");
}

#[tokio::test]
async fn wrong_tier_key_is_rejected_not_forwarded_to_the_handler() {
    // A client key hitting a miner-only route must fail the same way a
    // missing key does: the route never learns which tier actually sent it.
    let app = app(|_| {});
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/miners/heartbeat")
                .method("POST")
                .header("authorization", "Bearer client-key")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn an_unauthenticated_request_never_charges_a_real_keys_rate_limit_window() {
    let app = app(|raw| {
        raw.rate_limit_max_requests = 1;
    });

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/miners/heartbeat")
                    .method("POST")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // "admin-key"'s own budget is still untouched by those five attempts.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/admin/stats")
                .header("authorization", "Bearer admin-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn per_key_rate_limit_returns_429_with_retry_after() {
    let app = app(|raw| {
        raw.rate_limit_max_requests = 1;
    });

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/admin/stats")
                .header("authorization", "Bearer admin-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(
            Request::builder()
                .uri("/v1/admin/stats")
                .header("authorization", "Bearer admin-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(second).await;
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
    assert!(body["error"]["details"]["retry_after_seconds"].is_u64());
}

#[tokio::test]
async fn admin_jobs_query_parses_state_filter_and_limit() {
    let app = app(|_| {});
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/admin/jobs?state=QUEUED&limit=5")
                .header("authorization", "Bearer admin-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_jobs_query_rejects_an_unknown_state() {
    let app = app(|_| {});
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/admin/jobs?state=NOT_A_STATE")
                .header("authorization", "Bearer admin-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn job_not_found_maps_to_404_through_the_envelope() {
    let app = app(|_| {});
    let missing = uuid::Uuid::new_v4();
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/v1/jobs/{missing}"))
                .header("authorization", "Bearer client-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "JOB_NOT_FOUND");
}

#[tokio::test]
async fn submit_job_end_to_end_through_the_router() {
    let app = app(|_| {});
    let request_body = serde_json::json!({
        "payload": {"prompt": "hello"},
        "ttl_seconds": 600,
    });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/jobs")
                .method("POST")
                .header("authorization", "Bearer client-key")
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/v1/jobs/{job_id}"))
                .header("authorization", "Bearer client-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["state"], "QUEUED");
}
