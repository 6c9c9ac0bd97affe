// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{
    admission::AdmissionCoordinator,
    auth::Auth,
    error::ApiError,
    models::{VerifyRequest, VerifyResponse},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

/// Redeem a gate token: prove wallet control, consume the token, commit
/// membership.
#[utoipa::path(
    post,
    path = "/v1/token-gates/verify",
    request_body = VerifyRequest,
    tag = "Token Gates",
    responses(
        (status = 200, body = VerifyResponse),
        (status = 401, description = "Invalid or expired token/signature"),
        (status = 403, description = "Signing wallet does not match"),
        (status = 404, description = "Gate no longer exists"),
        (status = 409, description = "Token already redeemed")
    )
)]
pub async fn verify(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let coordinator = AdmissionCoordinator::new(
        state.db.clone(),
        state.gate_tokens.clone(),
        state.siwe.clone(),
    );

    match coordinator.verify_and_admit(
        &user.user_id,
        &request.gate_token,
        &request.message,
        &request.signature,
    ) {
        Ok((gate, claims, outcome)) => {
            state.audit.log(
                &AuditEvent::new(AuditEventType::AdmissionGranted)
                    .with_user(&user.user_id)
                    .with_resource("space", &gate.space_id)
                    .with_details(serde_json::json!({
                        "gateId": gate.gate_id,
                        "walletAddress": claims.wallet_address,
                        "membershipCreated": outcome.created,
                    })),
            );
            tracing::info!(
                user_id = %user.user_id,
                space_id = %gate.space_id,
                gate_id = %gate.gate_id,
                created = outcome.created,
                "Admission granted"
            );

            Ok(Json(VerifyResponse {
                success: true,
                membership: outcome.membership.into(),
            }))
        }
        Err(e) => {
            state.audit.log(
                &AuditEvent::new(AuditEventType::AdmissionDenied)
                    .with_user(&user.user_id)
                    .failed(e.to_string()),
            );
            tracing::warn!(user_id = %user.user_id, error = %e, "Admission denied");
            Err(e.into())
        }
    }
}
