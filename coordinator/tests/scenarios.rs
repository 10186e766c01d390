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

//! End-to-end scenarios driving the [`Coordinator`] facade directly,
//! bypassing HTTP and auth so each test can assert on exact job and miner
//! state after every step.

use std::sync::Arc;
use std::time::Duration;

use coordinator::clock::{Clock, TestClock};
use coordinator::error::CoordinatorError;
use coordinator::model::{Capabilities, Constraints, JobState, MinerStatus, SignatureEnvelope};
use coordinator::signer::Attester;
use coordinator::store::memory::MemoryStore;
use coordinator::Coordinator;
use coordinator_config::{RawSettings, Settings};

fn settings(f: impl FnOnce(&mut RawSettings)) -> Settings {
    let mut raw = RawSettings::default();
    f(&mut raw);
    Settings::from_raw(raw).expect("settings should validate")
}

fn rig(start: u64, f: impl FnOnce(&mut RawSettings)) -> (Arc<Coordinator>, Arc<TestClock>) {
    let clock = Arc::new(TestClock::new(start));
    let store = Arc::new(MemoryStore::new());
    let coordinator = Arc::new(Coordinator::new(settings(f), store, clock.clone()));
    (coordinator, clock)
}

fn rtx4090() -> Capabilities {
    Capabilities {
        gpu_model: "RTX4090".to_string(),
        gpu_memory_gib: 24,
        gpu_count: 1,
        cuda_version: "12.2".to_string(),
        supported_models: vec![],
        region: "us".to_string(),
    }
}

fn sign_receipt(
    attester: &Attester,
    payload: &coordinator::model::ReceiptPayload,
) -> SignatureEnvelope {
    let bytes = coordinator::canonical::canonicalize(payload).unwrap();
    attester.sign(&bytes)
}

#[tokio::test]
async fn s1_happy_path() {
    let (coordinator, clock) = rig(10_000, |r| {
        r.ttl_min_seconds = 60;
        r.ttl_max_seconds = 900;
        r.heartbeat_timeout_seconds = 30;
    });

    let miner = coordinator
        .register_miner("mk1".to_string(), rtx4090(), 1, None)
        .await
        .unwrap();
    assert_eq!(miner.status, MinerStatus::Online);
    assert_eq!(miner.inflight, 0);

    let job_id = coordinator
        .submit_job(
            "ck1".to_string(),
            serde_json::json!({"p": 1}),
            Constraints::default(),
            120,
            None,
        )
        .await
        .unwrap();
    let job = coordinator.get_job("ck1", job_id).await.unwrap();
    assert_eq!(job.state, JobState::Queued);

    let matched = coordinator
        .poll_for_job(&"mk1".to_string(), Duration::from_secs(5))
        .await
        .unwrap()
        .expect("mk1 should be matched to the only queued job");
    assert_eq!(matched.job_id, job_id);
    assert_eq!(matched.payload, serde_json::json!({"p": 1}));
    assert_eq!(matched.state, JobState::Running);

    let miner = coordinator.admin_miners().await.unwrap();
    assert_eq!(miner[0].inflight, 1);

    let attester = Attester::from_seed([9u8; 32]);
    let payload = coordinator::model::ReceiptPayload {
        job_id,
        provider: "mk1".to_string(),
        client: "ck1".to_string(),
        units: 2.0,
        unit_type: coordinator::model::UnitType::GpuSeconds,
        model: "llama-3-8b".to_string(),
        prompt_hash: "deadbeef".to_string(),
        started_at: clock.now(),
        finished_at: clock.now() + 2,
        artifact_sha256: None,
        nonce: "nonce-s1".to_string(),
        hub_id: None,
        chain_id: None,
    };
    let sig = sign_receipt(&attester, &payload);
    coordinator.submit_receipt("mk1", payload, sig).await.unwrap();

    let job = coordinator.get_job("ck1", job_id).await.unwrap();
    assert_eq!(job.state, JobState::Completed);
    let miner = coordinator.admin_miners().await.unwrap();
    assert_eq!(miner[0].inflight, 0);

    let receipt = coordinator.latest_receipt(job_id).await.unwrap();
    assert_eq!(receipt.payload.provider, "mk1");
    let canonical = coordinator::canonical::canonicalize(&receipt.payload).unwrap();
    coordinator::signer::verify(&receipt.signature, &canonical).unwrap();
}

#[tokio::test]
async fn s2_ttl_expiry_then_idempotent_cancel() {
    let (coordinator, clock) = rig(10_000, |r| {
        r.ttl_min_seconds = 1;
        r.ttl_max_seconds = 3600;
    });

    let job_id = coordinator
        .submit_job("ck1".to_string(), serde_json::json!({}), Constraints::default(), 60, None)
        .await
        .unwrap();

    clock.advance(61);
    coordinator.queue.tick_expiry().await.unwrap();

    let job = coordinator.get_job("ck1", job_id).await.unwrap();
    assert_eq!(job.state, JobState::Expired);
    assert_eq!(job.finished_at, Some(10_061));

    // A client retrying cancel after losing the race to expiry sees the
    // same terminal state, not an error.
    let canceled = coordinator.cancel_job("ck1", job_id).await.unwrap();
    assert_eq!(canceled.state, JobState::Expired);
}

#[tokio::test]
async fn s3_miner_loss_with_retry_then_abandon() {
    let (coordinator, clock) = rig(10_000, |r| {
        r.max_attempts = 2;
        r.heartbeat_timeout_seconds = 30;
        r.reaper_period_seconds = 5;
    });

    coordinator.register_miner("mk1".to_string(), rtx4090(), 1, None).await.unwrap();
    let job_id = coordinator
        .submit_job("ck1".to_string(), serde_json::json!({}), Constraints::default(), 600, None)
        .await
        .unwrap();

    let matched = coordinator
        .poll_for_job(&"mk1".to_string(), Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(matched.attempts, 1);

    // mk1 stops heartbeating; once its liveness is stale past the
    // timeout, the reaper offlines it and re-queues J3.
    clock.advance(30 + 5);
    coordinator.registry.reap_once(&coordinator.queue, &coordinator.notifier, 30).await.unwrap();

    let miner = coordinator.store.get_miner(&"mk1".to_string()).await.unwrap();
    assert_eq!(miner.status, MinerStatus::Offline);
    let job = coordinator.get_job("ck1", job_id).await.unwrap();
    assert_eq!(job.state, JobState::Queued);
    assert_eq!(job.attempts, 2);
    assert!(job.assigned_miner_id.is_none());

    // mk2 picks it up next.
    coordinator.register_miner("mk2".to_string(), rtx4090(), 1, None).await.unwrap();
    let matched = coordinator
        .poll_for_job(&"mk2".to_string(), Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(matched.job_id, job_id);
    assert_eq!(matched.attempts, 2);

    // mk2 also vanishes; J3 has now exhausted max_attempts and is abandoned.
    clock.advance(30 + 5);
    coordinator.registry.reap_once(&coordinator.queue, &coordinator.notifier, 30).await.unwrap();

    let job = coordinator.get_job("ck1", job_id).await.unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error.as_deref(), Some("abandoned: exceeded max attempts after miner loss"));
}

#[tokio::test]
async fn s4_receipt_replay_is_idempotent_divergent_conflicts() {
    let (coordinator, clock) = rig(10_000, |_| {});
    coordinator.register_miner("mk1".to_string(), rtx4090(), 1, None).await.unwrap();
    let job_id = coordinator
        .submit_job("ck1".to_string(), serde_json::json!({}), Constraints::default(), 600, None)
        .await
        .unwrap();
    coordinator.poll_for_job(&"mk1".to_string(), Duration::from_secs(1)).await.unwrap();

    let attester = Attester::from_seed([3u8; 32]);
    let payload = coordinator::model::ReceiptPayload {
        job_id,
        provider: "mk1".to_string(),
        client: "ck1".to_string(),
        units: 1.0,
        unit_type: coordinator::model::UnitType::GpuSeconds,
        model: "llama-3-8b".to_string(),
        prompt_hash: "deadbeef".to_string(),
        started_at: clock.now(),
        finished_at: clock.now() + 1,
        artifact_sha256: None,
        nonce: "nonce-s4".to_string(),
        hub_id: None,
        chain_id: None,
    };
    let sig = sign_receipt(&attester, &payload);
    let first = coordinator.submit_receipt("mk1", payload.clone(), sig.clone()).await.unwrap();

    // Byte-identical resend: same stored receipt, no duplicate append.
    let second = coordinator.submit_receipt("mk1", payload.clone(), sig).await.unwrap();
    assert_eq!(first.receipt_id, second.receipt_id);
    assert_eq!(coordinator.receipt_history(job_id).await.unwrap().len(), 1);

    // Same nonce, divergent payload: rejected, job untouched.
    let mut divergent = payload;
    divergent.units = 99.0;
    let divergent_bytes = coordinator::canonical::canonicalize(&divergent).unwrap();
    let divergent_sig = attester.sign(&divergent_bytes);
    let err = coordinator.submit_receipt("mk1", divergent, divergent_sig).await.unwrap_err();
    assert_eq!(err, CoordinatorError::ConflictReceipt);

    let job = coordinator.get_job("ck1", job_id).await.unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(coordinator.latest_receipt(job_id).await.unwrap().receipt_id, first.receipt_id);
}

#[tokio::test]
async fn s5_cancellation_race_client_cancel_wins() {
    let (coordinator, clock) = rig(10_000, |_| {});
    coordinator.register_miner("mk1".to_string(), rtx4090(), 1, None).await.unwrap();
    let job_id = coordinator
        .submit_job("ck1".to_string(), serde_json::json!({}), Constraints::default(), 600, None)
        .await
        .unwrap();
    coordinator.poll_for_job(&"mk1".to_string(), Duration::from_secs(1)).await.unwrap();

    // Client cancel arrives first.
    let canceled = coordinator.cancel_job("ck1", job_id).await.unwrap();
    assert_eq!(canceled.state, JobState::Canceled);

    // mk1's receipt lands in the same window; it's still accepted and
    // recorded for the audit trail, but the job stays CANCELED.
    let attester = Attester::from_seed([5u8; 32]);
    let payload = coordinator::model::ReceiptPayload {
        job_id,
        provider: "mk1".to_string(),
        client: "ck1".to_string(),
        units: 1.0,
        unit_type: coordinator::model::UnitType::GpuSeconds,
        model: "llama-3-8b".to_string(),
        prompt_hash: "deadbeef".to_string(),
        started_at: clock.now(),
        finished_at: clock.now() + 1,
        artifact_sha256: None,
        nonce: "nonce-s5".to_string(),
        hub_id: None,
        chain_id: None,
    };
    let sig = sign_receipt(&attester, &payload);
    coordinator.submit_receipt("mk1", payload, sig).await.unwrap();

    let job = coordinator.get_job("ck1", job_id).await.unwrap();
    assert_eq!(job.state, JobState::Canceled);
    let history = coordinator.receipt_history(job_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].payload.provider, "mk1");
}

#[tokio::test]
async fn s6_capability_mismatch_then_eligible_miner_matches() {
    let (coordinator, _clock) = rig(10_000, |_| {});
    let mk3 = Capabilities {
        gpu_model: "RTX3060".to_string(),
        gpu_memory_gib: 8,
        gpu_count: 1,
        cuda_version: "12.2".to_string(),
        supported_models: vec![],
        region: "us".to_string(),
    };
    coordinator.register_miner("mk3".to_string(), mk3, 1, None).await.unwrap();

    let job_id = coordinator
        .submit_job(
            "ck1".to_string(),
            serde_json::json!({}),
            Constraints {
                min_vram_gib: Some(16),
                ..Constraints::default()
            },
            600,
            None,
        )
        .await
        .unwrap();

    let matched = coordinator
        .poll_for_job(&"mk3".to_string(), Duration::from_millis(20))
        .await
        .unwrap();
    assert!(matched.is_none());
    let job = coordinator.get_job("ck1", job_id).await.unwrap();
    assert_eq!(job.state, JobState::Queued);

    coordinator.register_miner("mk4".to_string(), rtx4090(), 1, None).await.unwrap();
    let matched = coordinator
        .poll_for_job(&"mk4".to_string(), Duration::from_secs(1))
        .await
        .unwrap()
        .expect("mk4 meets the vram constraint");
    assert_eq!(matched.job_id, job_id);
}

#[tokio::test]
async fn boundary_payload_size_at_and_over_the_1mib_limit() {
    let (coordinator, _clock) = rig(10_000, |_| {});
    // `{"data":"aaa...a"}` with the string sized so the whole serialized
    // payload lands exactly at 1 MiB.
    let overhead = serde_json::json!({"data": ""}).to_string().len();
    let at_limit = "a".repeat(1024 * 1024 - overhead);
    let payload = serde_json::json!({"data": at_limit});
    assert_eq!(serde_json::to_vec(&payload).unwrap().len(), 1024 * 1024);
    coordinator
        .submit_job("ck1".to_string(), payload, Constraints::default(), 60, None)
        .await
        .expect("exactly 1 MiB is accepted");

    let over_limit = "a".repeat(1024 * 1024 - overhead + 1);
    let payload = serde_json::json!({"data": over_limit});
    let err = coordinator
        .submit_job("ck1".to_string(), payload, Constraints::default(), 60, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidPayload { .. }));
}

#[tokio::test]
async fn boundary_ttl_at_min_and_max_accepted_outside_rejected() {
    let (coordinator, _clock) = rig(10_000, |r| {
        r.ttl_min_seconds = 60;
        r.ttl_max_seconds = 900;
    });

    coordinator
        .submit_job("ck1".to_string(), serde_json::json!({}), Constraints::default(), 60, None)
        .await
        .expect("ttl_min is accepted");
    coordinator
        .submit_job("ck1".to_string(), serde_json::json!({}), Constraints::default(), 900, None)
        .await
        .expect("ttl_max is accepted");
    let err = coordinator
        .submit_job("ck1".to_string(), serde_json::json!({}), Constraints::default(), 901, None)
        .await
        .unwrap_err();
    assert_eq!(err, CoordinatorError::TtlOutOfRange { min: 60, max: 900 });
    let err = coordinator
        .submit_job("ck1".to_string(), serde_json::json!({}), Constraints::default(), 59, None)
        .await
        .unwrap_err();
    assert_eq!(err, CoordinatorError::TtlOutOfRange { min: 60, max: 900 });
}

#[tokio::test]
async fn boundary_heartbeat_exactly_at_timeout_stays_online() {
    let (coordinator, clock) = rig(10_000, |r| {
        r.heartbeat_timeout_seconds = 30;
    });
    coordinator.register_miner("mk1".to_string(), rtx4090(), 1, None).await.unwrap();

    clock.advance(30);
    coordinator
        .registry
        .reap_once(&coordinator.queue, &coordinator.notifier, 30)
        .await
        .unwrap();
    let miner = coordinator.store.get_miner(&"mk1".to_string()).await.unwrap();
    assert_eq!(miner.status, MinerStatus::Online);

    clock.advance(1);
    coordinator
        .registry
        .reap_once(&coordinator.queue, &coordinator.notifier, 30)
        .await
        .unwrap();
    let miner = coordinator.store.get_miner(&"mk1".to_string()).await.unwrap();
    assert_eq!(miner.status, MinerStatus::Offline);
}

#[tokio::test]
async fn boundary_poll_timeout_zero_runs_matcher_once() {
    let (coordinator, _clock) = rig(10_000, |_| {});
    let started = std::time::Instant::now();
    let matched = coordinator
        .poll_for_job(&"mk-unregistered".to_string(), Duration::from_secs(0))
        .await
        .unwrap();
    assert!(matched.is_none());
    assert!(started.elapsed() < Duration::from_millis(200));
}
