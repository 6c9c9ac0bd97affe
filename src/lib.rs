// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tokengate Server - Token-Gated Workspace Admission Service
//!
//! Users prove wallet control with SIWE signatures, on-chain holdings are
//! checked against admin-defined condition trees, and passing evaluations
//! are redeemed for single-use, HMAC-signed gate tokens that grant space
//! membership and roles.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Authentication and authorization (Clerk JWT)
//! - `chain` - EVM RPC balance oracle (alloy)
//! - `conditions` - Condition trees and concurrent evaluation
//! - `siwe` - Wallet signature verification (EIP-4361 / EIP-191)
//! - `admission` - Token redemption and membership grants
//! - `storage` - Embedded database (redb) and audit logs

pub mod admission;
pub mod api;
pub mod auth;
pub mod chain;
pub mod conditions;
pub mod config;
pub mod error;
pub mod gate_token;
pub mod models;
pub mod siwe;
pub mod state;
pub mod storage;
