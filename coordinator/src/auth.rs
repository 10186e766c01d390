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

//! Auth & rate limit. Every request carries an opaque API key; this module
//! resolves it to a [`Principal`] against the three disjoint key sets and
//! enforces the per-key sliding-window limit.

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use coordinator_config::Settings;

use crate::clock::{Clock, UnixSeconds};
use crate::error::{CoordinatorError, Result};
use crate::model::{ClientId, MinerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Client(ClientId),
    Miner(MinerId),
    Admin,
}

/// Derives a stable opaque principal id from an API key without ever
/// storing or logging the raw key itself.
fn derive_id(prefix: &str, key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{prefix}-{}", hex::encode(&digest[..10]))
}

pub fn authenticate(settings: &Settings, key: Option<&str>) -> Result<Principal> {
    let key = key.ok_or(CoordinatorError::UnauthorizedKey)?;
    if settings.admin_api_keys.contains(key) {
        return Ok(Principal::Admin);
    }
    if settings.client_api_keys.contains(key) {
        return Ok(Principal::Client(derive_id("ck", key)));
    }
    if settings.miner_api_keys.contains(key) {
        return Ok(Principal::Miner(derive_id("mk", key)));
    }
    Err(CoordinatorError::UnauthorizedKey)
}

/// Per-key sliding-window rate limiter. Each key keeps the
/// timestamps of its requests within the current window; once the count
/// exceeds `max_requests` the oldest timestamp determines `retry_after`.
pub struct RateLimiter {
    window_seconds: u64,
    max_requests: u32,
    windows: Mutex<HashMap<String, Vec<UnixSeconds>>>,
}

impl RateLimiter {
    pub fn new(window_seconds: u64, max_requests: u32) -> Self {
        Self {
            window_seconds,
            max_requests,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str, clock: &dyn Clock) -> Result<()> {
        let now = clock.now();
        let cutoff = now.saturating_sub(self.window_seconds);
        let mut windows = self.windows.lock().expect("BUG: rate limiter mutex poisoned");
        let timestamps = windows.entry(key.to_string()).or_default();
        timestamps.retain(|&t| t > cutoff);

        if timestamps.len() as u32 >= self.max_requests {
            let oldest = *timestamps.first().unwrap_or(&now);
            let retry_after_seconds = (oldest + self.window_seconds).saturating_sub(now);
            return Err(CoordinatorError::RateLimited {
                retry_after_seconds,
            });
        }

        timestamps.push(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;

    #[test]
    fn allows_up_to_the_limit_then_blocks() {
        let clock = TestClock::new(1_000);
        let limiter = RateLimiter::new(60, 2);
        assert!(limiter.check("k1", &clock).is_ok());
        assert!(limiter.check("k1", &clock).is_ok());
        assert!(limiter.check("k1", &clock).is_err());
    }

    #[test]
    fn window_slides_forward() {
        let clock = TestClock::new(1_000);
        let limiter = RateLimiter::new(60, 1);
        assert!(limiter.check("k1", &clock).is_ok());
        assert!(limiter.check("k1", &clock).is_err());
        clock.advance(61);
        assert!(limiter.check("k1", &clock).is_ok());
    }

    #[test]
    fn derive_id_is_stable_and_disjoint_from_key() {
        let a = derive_id("ck", "secret");
        let b = derive_id("ck", "secret");
        assert_eq!(a, b);
        assert!(!a.contains("secret"));
    }
}
