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

//! Ed25519 signing and verification, kept as an explicit capability rather
//! than an ambient "just call into a crypto library everywhere" style: the
//! coordinator's own attestation keys are loaded once at startup and
//! wrapped here, while verification of a miner-submitted signature goes
//! through the free functions below since the coordinator never holds a
//! miner's private key.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};

use crate::error::{CoordinatorError, Result};

pub const ALGO: &str = "ed25519";

/// One configured attestation identity. The coordinator may hold zero, one
/// or two of these (signing key + optional second attestation key).
pub struct Attester {
    signing_key: SigningKey,
}

impl Attester {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key_base64(&self) -> String {
        base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            self.signing_key.verifying_key().as_bytes(),
        )
    }

    pub fn sign(&self, canonical_bytes: &[u8]) -> crate::model::SignatureEnvelope {
        let signature = self.signing_key.sign(canonical_bytes);
        crate::model::SignatureEnvelope {
            public_key: self.public_key_base64(),
            sig: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, signature.to_bytes()),
            algo: ALGO.to_string(),
        }
    }
}

/// Verifies a [`SignatureEnvelope`](crate::model::SignatureEnvelope) over
/// `canonical_bytes`. Used both for the mandatory miner signature and for
/// re-verifying attestations in tests.
pub fn verify(
    envelope: &crate::model::SignatureEnvelope,
    canonical_bytes: &[u8],
) -> Result<()> {
    if envelope.algo != ALGO {
        return Err(CoordinatorError::BadSignature);
    }
    let key_bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &envelope.public_key)
        .map_err(|_| CoordinatorError::BadSignature)?;
    let key_bytes: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| CoordinatorError::BadSignature)?;
    let verifying_key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|_| CoordinatorError::BadSignature)?;

    let sig_bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &envelope.sig)
        .map_err(|_| CoordinatorError::BadSignature)?;
    let sig_bytes: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| CoordinatorError::BadSignature)?;
    let signature = Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(canonical_bytes, &signature)
        .map_err(|_| CoordinatorError::BadSignature)
}
