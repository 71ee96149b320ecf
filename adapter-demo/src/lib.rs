/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! Keycloak demo where a security layer owns the OAuth flow.
//!
//! [`security::security_filter`] sits in front of every route. It answers
//! the `/sso/login` callback itself, sends anonymous requests for protected
//! paths to the realm, and hands each request its [`security::KeycloakPrincipal`].
//! The handlers in [`routes`] only read the principal. The binary entry
//! point (`main.rs`) is a thin wrapper.

pub mod routes;
pub mod security;
pub mod state;
