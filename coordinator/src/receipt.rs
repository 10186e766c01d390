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

//! Builds, verifies and stores completion receipts: a miner submits a
//! signed [`ReceiptPayload`] for a job it holds, this module checks the
//! job is actually RUNNING under that miner, verifies the miner's
//! signature, counter-signs with every configured coordinator attestation
//! key, and transitions the job to COMPLETED.
//!
//! Replay handling: a miner may resend the same receipt (client retry,
//! dropped response). Keyed by `(job_id, nonce)`, a resend with a
//! byte-identical canonical payload returns the stored receipt unchanged;
//! a resend with a divergent payload under the same nonce is rejected.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::canonical::canonicalize;
use crate::clock::Clock;
use crate::error::{CoordinatorError, Result};
use crate::metrics::Metrics;
use crate::model::{Job, JobId, JobState, Receipt, ReceiptPayload, SignatureEnvelope};
use crate::signer::{self, Attester};
use crate::store::Store;

pub struct ReceiptService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    attesters: Vec<Attester>,
    metrics: Arc<Metrics>,
}

impl ReceiptService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, attesters: Vec<Attester>, metrics: Arc<Metrics>) -> Self {
        Self { store, clock, attesters, metrics }
    }

    /// Submits a miner-signed receipt for `payload.job_id`. `miner_id` must
    /// be the caller's authenticated principal and must match both
    /// `payload.provider` and the miner on record for the job's current
    /// attempt (checked against the attempt audit trail, not the live job
    /// row, since a CANCELED job has already cleared `assigned_miner_id`).
    pub async fn submit(
        &self,
        miner_id: &str,
        payload: ReceiptPayload,
        miner_signature: SignatureEnvelope,
    ) -> Result<Receipt> {
        if payload.provider != miner_id {
            return Err(CoordinatorError::Forbidden);
        }

        let canonical_bytes = canonicalize(&payload)?;

        if let Some(existing) = self
            .store
            .find_receipt_by_nonce(payload.job_id, &payload.nonce)
            .await?
        {
            let existing_bytes = canonicalize(&existing.payload)?;
            if existing_bytes == canonical_bytes {
                return Ok(existing);
            }
            return Err(CoordinatorError::ConflictReceipt);
        }

        signer::verify(&miner_signature, &canonical_bytes)?;

        let job = self.store.get_job(payload.job_id).await?;
        // A job canceled while RUNNING clears `assigned_miner_id` to satisfy
        // the CANCELED invariant, so ownership for a late receipt is proven
        // against the attempt audit trail instead of the live job row: the
        // attempt numbered `job.attempts` is whichever run last held the
        // job, canceled or not.
        let owning_attempt = self
            .store
            .attempts_for(job.job_id)
            .await?
            .into_iter()
            .find(|a| a.attempt_number == job.attempts);
        let owns_attempt = owning_attempt.map_or(false, |a| a.miner_id == miner_id);
        if !owns_attempt {
            return Err(CoordinatorError::ConflictState);
        }
        // A job canceled while RUNNING may still have a receipt land right
        // behind it. The client's cancel already won the race for the
        // job's outward state; the receipt is kept purely as an audit
        // record and never reopens or completes the job.
        let completes_job = match job.state {
            JobState::Running => true,
            JobState::Canceled => false,
            _ => return Err(CoordinatorError::ConflictState),
        };

        let receipt_id = format!("rc-{}", hex::encode(Sha256::digest(&canonical_bytes)));
        let attestations = self
            .attesters
            .iter()
            .map(|a| a.sign(&canonical_bytes))
            .collect();

        let now = self.clock.now();
        let receipt = Receipt {
            receipt_id,
            payload,
            signature: miner_signature,
            attestations,
            created_at: now,
        };

        if completes_job {
            let finished_at = receipt.payload.finished_at;
            let attempt_number = job.attempts;
            let miner_id_owned = miner_id.to_string();
            self.store
                .release_job(
                    job.job_id,
                    &miner_id_owned,
                    Box::new(move |job: &mut Job| {
                        if job.state != JobState::Running {
                            return Err(CoordinatorError::ConflictState);
                        }
                        job.state = JobState::Completed;
                        job.finished_at = Some(finished_at);
                        Ok(())
                    }),
                )
                .await?;
            self.store
                .close_attempt(
                    job.job_id,
                    attempt_number,
                    Box::new(move |attempt| {
                        attempt.ended_at = Some(finished_at);
                        attempt.outcome = crate::model::AttemptOutcome::Completed;
                    }),
                )
                .await?;
            self.metrics.inc_completed();
        }

        self.store.append_receipt(receipt.clone()).await?;
        self.metrics.inc_receipts_signed();
        info!(job_id = %receipt.payload.job_id, receipt_id = %receipt.receipt_id, completes_job, "receipt accepted");
        Ok(receipt)
    }

    pub async fn latest(&self, job_id: JobId) -> Result<Receipt> {
        self.store
            .latest_receipt(job_id)
            .await?
            .ok_or(CoordinatorError::JobNotFound)
    }

    pub async fn history(&self, job_id: JobId) -> Result<Vec<Receipt>> {
        self.store.receipt_history(job_id).await
    }
}
