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

//! Keycloak demo with hand-written OAuth handling.
//!
//! The handlers in [`routes`] drive the authorization-code flow themselves:
//! `/login` redirects to the realm, `/authorization-callback` exchanges the
//! code and stores a [`session::UserSession`] in an encrypted cookie, `/`
//! lists the ID token's claims and `/logout` ends the session at the
//! provider. The binary entry point (`main.rs`) is a thin wrapper.

pub mod routes;
pub mod session;
pub mod state;
