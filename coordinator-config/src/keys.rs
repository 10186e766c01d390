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

//! Parsing helpers for the comma-separated API key lists and hex-encoded
//! Ed25519 seeds that make up the authentication/signing surface of the
//! configuration.

use std::collections::HashSet;

use crate::error::ConfigError;

/// Splits a comma-separated list of opaque API keys, trimming whitespace and
/// dropping empty entries. Order is not significant; duplicates collapse.
pub fn parse_key_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Decodes a hex-encoded 32-byte Ed25519 seed. Returns `Ok(None)` for an
/// empty string, since an absent signing/attestation key is a valid
/// deployment choice.
pub fn parse_signing_seed(
    field: &'static str,
    raw: &str,
) -> Result<Option<[u8; 32]>, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let bytes = hex::decode(raw).map_err(|e| ConfigError::Invalid {
        field,
        reason: format!("not valid hex: {e}"),
    })?;
    let seed: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| ConfigError::Invalid {
        field,
        reason: format!("expected 32 bytes, got {}", v.len()),
    })?;
    Ok(Some(seed))
}
