// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Clerk JWT authentication for the admission API.
//!
//! ## Auth Flow
//!
//! 1. Frontend authenticates the user with Clerk
//! 2. Frontend sends `Authorization: Bearer <Clerk JWT>`
//! 3. Server:
//!    - Fetches Clerk JWKS via HTTPS (cached with TTL)
//!    - Verifies JWT signature, expiry, issuer, audience
//!    - Extracts `sub` → canonical `user_id` and the role claim
//!
//! Wallet identity is a separate concern: the JWT proves who the user is,
//! the SIWE signature proves they control a wallet. Admission requires
//! both; see `crate::admission`.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod roles;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use jwks::JwksManager;
pub use roles::Role;
