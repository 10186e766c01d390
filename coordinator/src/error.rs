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

//! One error type for the whole coordinator core. Every fallible component
//! returns `Result<T, CoordinatorError>`; the HTTP edge in `api::envelope`
//! is the only place that turns a variant into a status code and the
//! `{ "error": { ... } }` envelope.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("missing or wrong-tier API key")]
    UnauthorizedKey,

    #[error("rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("ttl out of range [{min}, {max}]")]
    TtlOutOfRange { min: u64, max: u64 },

    #[error("job not found")]
    JobNotFound,

    #[error("principal does not own this job")]
    Forbidden,

    #[error("result requested before job reached a terminal state")]
    JobNotReady,

    #[error("transition conflicts with the job's current state")]
    ConflictState,

    #[error("receipt replay with a divergent payload")]
    ConflictReceipt,

    #[error("Ed25519 signature verification failed")]
    BadSignature,

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// The stable `<CODE>` string used in the `{ "error": { "code": ... } }`
    /// response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnauthorizedKey => "UNAUTHORIZED_KEY",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::InvalidPayload { .. } => "INVALID_PAYLOAD",
            Self::TtlOutOfRange { .. } => "TTL_OUT_OF_RANGE",
            Self::JobNotFound => "JOB_NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::JobNotReady => "JOB_NOT_READY",
            Self::ConflictState => "CONFLICT_STATE",
            Self::ConflictReceipt => "CONFLICT_RECEIPT",
            Self::BadSignature => "BAD_SIGNATURE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
