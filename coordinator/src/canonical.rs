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

//! Canonical JSON encoding used as the Ed25519 signing input for receipts:
//! sorted keys, no insignificant whitespace, strings normalized to NFC.
//! `serde_json::Value`
//! already stores object fields in a `BTreeMap` (sorted by key) when the
//! `preserve_order` feature is off, and `serde_json::to_vec` never emits
//! whitespace, so the only extra step is NFC-normalizing string leaves
//! before serializing.

use serde::Serialize;
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use crate::error::{CoordinatorError, Result};

fn normalize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.nfc().collect::<String>()),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, normalize_value(v))).collect())
        }
        other => other,
    }
}

/// Serializes `payload` into its canonical byte form.
pub fn canonicalize<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(payload)
        .map_err(|e| CoordinatorError::Internal(format!("canonicalize: {e}")))?;
    let normalized = normalize_value(value);
    serde_json::to_vec(&normalized)
        .map_err(|e| CoordinatorError::Internal(format!("canonicalize: {e}")))
}
