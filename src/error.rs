// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// API error with a machine-readable error code.
///
/// Error codes are part of the client contract: the admission flow surfaces
/// `replayed_token`, `wallet_mismatch`, etc. so the UI can distinguish
/// "not eligible" from "something broke".
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    // ---- Admission error kinds ----

    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalid_signature", message)
    }

    pub fn expired_claim(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "expired_claim", message)
    }

    pub fn replayed_token(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "replayed_token", message)
    }

    pub fn wallet_mismatch(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "wallet_mismatch", message)
    }

    pub fn gate_not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "gate_not_found", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.error_code.to_string(),
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_code() {
        let nf = ApiError::gate_not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.error_code, "gate_not_found");

        let replay = ApiError::replayed_token("used");
        assert_eq!(replay.status, StatusCode::CONFLICT);
        assert_eq!(replay.error_code, "replayed_token");

        let mismatch = ApiError::wallet_mismatch("other wallet");
        assert_eq!(mismatch.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::invalid_signature("bad sig").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "invalid_signature");
        assert_eq!(body["error"], "bad sig");
    }
}
