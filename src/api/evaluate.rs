// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{
    auth::Auth,
    error::ApiError,
    models::{EvaluateRequest, EvaluateResponse, GateTokenGrant},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

/// Evaluate every active gate of a space against a wallet.
///
/// A space admits through ANY of its gates, so each gate's tree is
/// evaluated independently and each passing gate yields its own signed
/// token. Oracle failures fail individual leaves closed; they never turn
/// into a 5xx here.
#[utoipa::path(
    post,
    path = "/v1/token-gates/evaluate",
    request_body = EvaluateRequest,
    tag = "Token Gates",
    responses(
        (status = 200, body = EvaluateResponse),
        (status = 400, description = "Malformed wallet address")
    )
)]
pub async fn evaluate(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let wallet = crate::chain::client::parse_address(&request.wallet_address)
        .map_err(|_| ApiError::bad_request("walletAddress is not a valid EVM address"))?;
    let wallet_address = format!("{wallet:#x}");

    let gates = state
        .db
        .list_gates_for_space(&request.space_id, false)
        .map_err(|e| ApiError::internal(format!("Failed to list gates: {e}")))?;

    let mut gate_tokens = Vec::new();
    let mut roles: Vec<String> = Vec::new();

    for gate in gates {
        let result = state
            .evaluator
            .evaluate(&gate.gate_id, &gate.condition_tree, wallet)
            .await;
        tracing::debug!(
            gate_id = %gate.gate_id,
            passed = result.passed,
            leaves = result.leaf_results.len(),
            "Gate evaluated"
        );

        if result.passed {
            let (signed_token, _) = state.gate_tokens.mint(&gate.gate_id, &wallet_address);
            roles.extend(gate.linked_role_ids.iter().cloned());
            gate_tokens.push(GateTokenGrant {
                token_gate: gate.into(),
                signed_token,
            });
        }
    }
    roles.sort();
    roles.dedup();

    let can_join_space = !gate_tokens.is_empty();

    state.audit.log(
        &AuditEvent::new(AuditEventType::GateEvaluated)
            .with_user(&user.user_id)
            .with_resource("space", &request.space_id)
            .with_details(serde_json::json!({
                "walletAddress": wallet_address,
                "canJoinSpace": can_join_space,
                "passingGates": gate_tokens.len(),
            })),
    );

    Ok(Json(EvaluateResponse {
        user_id: user.user_id,
        space_id: request.space_id,
        wallet_address,
        can_join_space,
        gate_tokens,
        roles,
    }))
}
