// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for persistent storage | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `APP_DOMAIN` | Expected SIWE `domain` field | Required for production |
//! | `APP_URI` | Expected SIWE `uri` field | Required for production |
//! | `GATE_TOKEN_SECRET` | HMAC secret for gate tokens | Required for production |
//! | `GATE_TOKEN_TTL_SECS` | Gate token lifetime in seconds | `300` |
//! | `CLERK_JWKS_URL` | Clerk JWKS endpoint for JWT verification | Required for production |
//! | `CLERK_ISSUER` | Expected JWT issuer claim | Required for production |
//! | `CLERK_AUDIENCE` | Expected JWT audience claim | Optional |
//! | `RPC_URL_<CHAIN>` | Per-chain RPC URL override (e.g. `RPC_URL_ETHEREUM`) | Built-in public endpoints |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

/// Environment variable name for the persistent data directory path.
///
/// Holds the embedded gate database (`gates.redb`) and the daily audit logs.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable for the SIWE domain the verifier pins to.
pub const APP_DOMAIN_ENV: &str = "APP_DOMAIN";

/// Environment variable for the SIWE URI the verifier pins to.
pub const APP_URI_ENV: &str = "APP_URI";

/// Environment variable for the gate token HMAC secret.
pub const GATE_TOKEN_SECRET_ENV: &str = "GATE_TOKEN_SECRET";

/// Environment variable for the gate token TTL in seconds.
pub const GATE_TOKEN_TTL_ENV: &str = "GATE_TOKEN_TTL_SECS";

/// Default gate token lifetime. Short on purpose: the token attests to a
/// point-in-time on-chain snapshot that can change.
pub const DEFAULT_GATE_TOKEN_TTL_SECS: u64 = 300;
