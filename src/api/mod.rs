// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    conditions::{AssetStandard, Combinator, Comparator, ConditionNode, GroupCondition, LeafCondition},
    models::{
        CreateTokenGateRequest, EvaluateRequest, EvaluateResponse, GateTokenGrant, Membership,
        TokenGate, VerifyRequest, VerifyResponse,
    },
    siwe::SiweMessage,
    state::AppState,
};

pub mod evaluate;
pub mod gates;
pub mod health;
pub mod verify;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/token-gates",
            get(gates::list_gates).post(gates::create_gate),
        )
        .route("/token-gates/{gate_id}", delete(gates::delete_gate))
        .route("/token-gates/evaluate", post(evaluate::evaluate))
        .route("/token-gates/verify", post(verify::verify))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        gates::create_gate,
        gates::list_gates,
        gates::delete_gate,
        evaluate::evaluate,
        verify::verify,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            TokenGate,
            CreateTokenGateRequest,
            EvaluateRequest,
            EvaluateResponse,
            GateTokenGrant,
            VerifyRequest,
            VerifyResponse,
            Membership,
            ConditionNode,
            GroupCondition,
            LeafCondition,
            Combinator,
            AssetStandard,
            Comparator,
            SiweMessage,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Token Gates", description = "Gate administration, evaluation, and admission"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
