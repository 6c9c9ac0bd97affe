// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::{AdminOnly, Auth},
    error::ApiError,
    models::{CreateTokenGateRequest, TokenGate},
    state::AppState,
    storage::{AuditEvent, AuditEventType, GateDbError, StoredTokenGate},
};

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct GateListQuery {
    pub space_id: String,
}

#[utoipa::path(
    post,
    path = "/v1/token-gates",
    request_body = CreateTokenGateRequest,
    tag = "Token Gates",
    responses(
        (status = 201, body = TokenGate),
        (status = 403, description = "Caller is not an admin"),
        (status = 422, description = "Condition tree is invalid")
    )
)]
pub async fn create_gate(
    AdminOnly(user): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<CreateTokenGateRequest>,
) -> Result<(StatusCode, Json<TokenGate>), ApiError> {
    if request.space_id.trim().is_empty() {
        return Err(ApiError::bad_request("spaceId must not be empty"));
    }

    request
        .condition_tree
        .validate(&|chain| state.chains.is_known(chain))
        .map_err(|e| ApiError::unprocessable(format!("Invalid condition tree: {e}")))?;

    let gate = StoredTokenGate {
        gate_id: uuid::Uuid::new_v4().to_string(),
        space_id: request.space_id,
        condition_tree: request.condition_tree,
        linked_role_ids: request.linked_role_ids,
        created_by: user.user_id.clone(),
        created_at: chrono::Utc::now(),
        deleted_at: None,
    };

    state
        .db
        .insert_gate(&gate)
        .map_err(|e| ApiError::internal(format!("Failed to persist gate: {e}")))?;

    state.audit.log(
        &AuditEvent::new(AuditEventType::GateCreated)
            .with_user(&user.user_id)
            .with_resource("gate", &gate.gate_id)
            .with_details(serde_json::json!({ "spaceId": gate.space_id })),
    );
    tracing::info!(gate_id = %gate.gate_id, space_id = %gate.space_id, "Token gate created");

    Ok((StatusCode::CREATED, Json(gate.into())))
}

#[utoipa::path(
    get,
    path = "/v1/token-gates",
    params(GateListQuery),
    tag = "Token Gates",
    responses((status = 200, body = Vec<TokenGate>))
)]
pub async fn list_gates(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Query(params): Query<GateListQuery>,
) -> Result<Json<Vec<TokenGate>>, ApiError> {
    let gates = state
        .db
        .list_gates_for_space(&params.space_id, false)
        .map_err(|e| ApiError::internal(format!("Failed to list gates: {e}")))?;

    Ok(Json(gates.into_iter().map(TokenGate::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/v1/token-gates/{gate_id}",
    params(("gate_id" = String, Path, description = "Gate to delete")),
    tag = "Token Gates",
    responses(
        (status = 204, description = "Gate soft-deleted"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No such gate")
    )
)]
pub async fn delete_gate(
    AdminOnly(user): AdminOnly,
    State(state): State<AppState>,
    Path(gate_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let gate = state.db.soft_delete_gate(&gate_id).map_err(|e| match e {
        GateDbError::NotFound(_) => ApiError::gate_not_found("Gate not found"),
        other => ApiError::internal(format!("Failed to delete gate: {other}")),
    })?;

    state.audit.log(
        &AuditEvent::new(AuditEventType::GateDeleted)
            .with_user(&user.user_id)
            .with_resource("gate", &gate.gate_id)
            .with_details(serde_json::json!({ "spaceId": gate.space_id })),
    );
    tracing::info!(gate_id = %gate.gate_id, "Token gate deleted");

    Ok(StatusCode::NO_CONTENT)
}
