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

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::keys;

/// Raw, on-disk/env shape of the configuration surface. Every field here
/// round-trips through `config`'s layered file+env merge before being
/// validated into a [`Settings`].
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields, default)]
pub struct RawSettings {
    pub bind_host: String,
    pub bind_port: u16,
    pub database_url: String,
    pub client_api_keys: String,
    pub miner_api_keys: String,
    pub admin_api_keys: String,
    pub receipt_signing_key: String,
    pub receipt_attestation_key: String,
    pub ttl_min_seconds: u64,
    pub ttl_max_seconds: u64,
    pub heartbeat_timeout_seconds: u64,
    pub reaper_period_seconds: u64,
    pub expiry_tick_period_seconds: u64,
    pub poll_cap_seconds: u64,
    pub max_attempts: u32,
    pub rate_limit_window_seconds: u64,
    pub rate_limit_max_requests: u32,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            bind_port: 8080,
            database_url: "memory://".to_string(),
            client_api_keys: String::new(),
            miner_api_keys: String::new(),
            admin_api_keys: String::new(),
            receipt_signing_key: String::new(),
            receipt_attestation_key: String::new(),
            ttl_min_seconds: 60,
            ttl_max_seconds: 3600,
            heartbeat_timeout_seconds: 30,
            reaper_period_seconds: 5,
            expiry_tick_period_seconds: 1,
            poll_cap_seconds: 30,
            max_attempts: 3,
            rate_limit_window_seconds: 60,
            rate_limit_max_requests: 600,
        }
    }
}

/// Validated, process-wide configuration. Constructed only through
/// [`Settings::from_raw`], which is the single place that enforces
/// cross-field invariants (e.g. `ttl_min <= ttl_max`).
#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_host: String,
    pub bind_port: u16,
    pub database_url: String,
    pub client_api_keys: HashSet<String>,
    pub miner_api_keys: HashSet<String>,
    pub admin_api_keys: HashSet<String>,
    pub receipt_signing_key: Option<[u8; 32]>,
    pub receipt_attestation_key: Option<[u8; 32]>,
    pub ttl_min_seconds: u64,
    pub ttl_max_seconds: u64,
    pub heartbeat_timeout_seconds: u64,
    pub reaper_period_seconds: u64,
    pub expiry_tick_period_seconds: u64,
    pub poll_cap_seconds: u64,
    pub max_attempts: u32,
    pub rate_limit_window_seconds: u64,
    pub rate_limit_max_requests: u32,
}

impl Settings {
    pub fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        if raw.ttl_min_seconds > raw.ttl_max_seconds {
            return Err(ConfigError::Invalid {
                field: "ttl_min_seconds",
                reason: "must be <= ttl_max_seconds".to_string(),
            });
        }
        if raw.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if raw.reaper_period_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "reaper_period_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        if raw.expiry_tick_period_seconds == 0 || raw.expiry_tick_period_seconds > 1 {
            return Err(ConfigError::Invalid {
                field: "expiry_tick_period_seconds",
                reason: "must be greater than zero and at most 1".to_string(),
            });
        }

        Ok(Self {
            bind_host: raw.bind_host,
            bind_port: raw.bind_port,
            database_url: raw.database_url,
            client_api_keys: keys::parse_key_list(&raw.client_api_keys),
            miner_api_keys: keys::parse_key_list(&raw.miner_api_keys),
            admin_api_keys: keys::parse_key_list(&raw.admin_api_keys),
            receipt_signing_key: keys::parse_signing_seed(
                "receipt_signing_key",
                &raw.receipt_signing_key,
            )?,
            receipt_attestation_key: keys::parse_signing_seed(
                "receipt_attestation_key",
                &raw.receipt_attestation_key,
            )?,
            ttl_min_seconds: raw.ttl_min_seconds,
            ttl_max_seconds: raw.ttl_max_seconds,
            heartbeat_timeout_seconds: raw.heartbeat_timeout_seconds,
            reaper_period_seconds: raw.reaper_period_seconds,
            expiry_tick_period_seconds: raw.expiry_tick_period_seconds,
            poll_cap_seconds: raw.poll_cap_seconds,
            max_attempts: raw.max_attempts,
            rate_limit_window_seconds: raw.rate_limit_window_seconds,
            rate_limit_max_requests: raw.rate_limit_max_requests,
        })
    }
}
