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

//! Maps [`CoordinatorError`] onto the one HTTP error shape every route
//! shares: `{ "error": { "code", "message", "details" } }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::CoordinatorError;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    details: serde_json::Value,
}

pub struct ApiError(pub CoordinatorError);

impl From<CoordinatorError> for ApiError {
    fn from(e: CoordinatorError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoordinatorError::UnauthorizedKey => StatusCode::UNAUTHORIZED,
            CoordinatorError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            CoordinatorError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            CoordinatorError::TtlOutOfRange { .. } => StatusCode::BAD_REQUEST,
            CoordinatorError::JobNotFound => StatusCode::NOT_FOUND,
            CoordinatorError::Forbidden => StatusCode::FORBIDDEN,
            CoordinatorError::JobNotReady => StatusCode::TOO_MANY_REQUESTS,
            CoordinatorError::ConflictState => StatusCode::GONE,
            CoordinatorError::ConflictReceipt => StatusCode::CONFLICT,
            CoordinatorError::BadSignature => StatusCode::BAD_REQUEST,
            CoordinatorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let details = match &self.0 {
            CoordinatorError::RateLimited { retry_after_seconds } => {
                serde_json::json!({ "retry_after_seconds": retry_after_seconds })
            }
            CoordinatorError::TtlOutOfRange { min, max } => {
                serde_json::json!({ "min": min, "max": max })
            }
            _ => serde_json::json!({}),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.0.code(),
                message: self.0.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
