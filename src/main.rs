// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tokengate_server::api::router;
use tokengate_server::chain::{ChainRegistry, RpcBalanceOracle};
use tokengate_server::config::{
    APP_DOMAIN_ENV, APP_URI_ENV, DATA_DIR_ENV, DEFAULT_GATE_TOKEN_TTL_SECS, GATE_TOKEN_SECRET_ENV,
    GATE_TOKEN_TTL_ENV,
};
use tokengate_server::gate_token::GateTokenSigner;
use tokengate_server::siwe::SiweVerifier;
use tokengate_server::state::{AppState, AuthConfig};
use tokengate_server::storage::{AuditLog, GateDatabase, StoragePaths};

/// How often consumed nonces are pruned.
const NONCE_PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// Consumed nonces are kept this long past their token's expiry.
const NONCE_RETENTION_SECS: i64 = 3600;

#[tokio::main]
async fn main() {
    init_tracing();

    let data_dir = std::env::var(DATA_DIR_ENV).unwrap_or_else(|_| "/data".to_string());
    let paths = StoragePaths::new(&data_dir);
    let db = GateDatabase::open(&paths.gates_db_file()).expect("Failed to open gate database");

    let chains = ChainRegistry::from_env();
    let oracle = Arc::new(RpcBalanceOracle::new(chains.clone()));

    let app_domain = std::env::var(APP_DOMAIN_ENV).unwrap_or_else(|_| "localhost".to_string());
    let app_uri =
        std::env::var(APP_URI_ENV).unwrap_or_else(|_| "http://localhost:3000".to_string());
    let siwe = SiweVerifier::new(app_domain, app_uri);

    let auth_config = build_auth_config().await;

    let gate_token_secret = match std::env::var(GATE_TOKEN_SECRET_ENV) {
        Ok(secret) => secret,
        Err(_) => {
            if auth_config.jwks.is_some() {
                tracing::error!("{GATE_TOKEN_SECRET_ENV} is required in production mode");
                std::process::exit(1);
            }
            tracing::warn!("{GATE_TOKEN_SECRET_ENV} not set, using an insecure development secret");
            "insecure-dev-secret".to_string()
        }
    };
    let gate_token_ttl = std::env::var(GATE_TOKEN_TTL_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_GATE_TOKEN_TTL_SECS);
    let gate_tokens = GateTokenSigner::new(gate_token_secret.as_bytes(), gate_token_ttl);

    let state = AppState::new(
        db,
        chains,
        oracle,
        siwe,
        gate_tokens,
        AuditLog::new(paths),
    )
    .with_auth_config(auth_config);

    let shutdown = CancellationToken::new();
    spawn_nonce_pruner(state.clone(), shutdown.clone());

    let app = router(state);

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    tracing::info!("Tokengate server listening on http://{addr} (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("Server failed");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Production mode requires CLERK_JWKS_URL; without it, JWTs are decoded
/// unverified and a loud warning is emitted.
async fn build_auth_config() -> AuthConfig {
    let jwks = match std::env::var("CLERK_JWKS_URL") {
        Ok(url) => {
            let manager = tokengate_server::auth::JwksManager::new(url)
                .expect("Failed to create JWKS manager");
            if let Err(e) = manager.refresh().await {
                tracing::warn!(error = %e, "Initial JWKS fetch failed, will retry on demand");
            }
            Some(manager)
        }
        Err(_) => {
            tracing::warn!(
                "CLERK_JWKS_URL not set: running in development auth mode (no signature checks)"
            );
            None
        }
    };

    AuthConfig {
        jwks,
        issuer: std::env::var("CLERK_ISSUER").ok(),
        audience: std::env::var("CLERK_AUDIENCE").ok(),
    }
}

/// Periodically drop consumed nonces whose tokens are long expired.
fn spawn_nonce_pruner(state: AppState, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(NONCE_PRUNE_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let cutoff = chrono::Utc::now().timestamp() - NONCE_RETENTION_SECS;
                    match state.db.prune_consumed_nonces(cutoff) {
                        Ok(0) => {}
                        Ok(removed) => tracing::debug!(removed, "Pruned consumed nonces"),
                        Err(e) => tracing::warn!(error = %e, "Nonce pruning failed"),
                    }
                }
            }
        }
    });
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
