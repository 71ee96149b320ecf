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

//! Shared application state passed to every Axum handler via `State`.

use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use keycloak_demo_core::{Config, IdentityProvider};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// OAuth client for the Keycloak realm.
    pub provider: Arc<dyn IdentityProvider>,
    /// Encrypts the session and login-flow cookies.
    pub cookie_key: Key,
    /// Port used in absolute URLs when no `X-Forwarded-Port` is sent.
    pub public_port: u16,
    pub cookie_secure: bool,
}

impl AppState {
    pub fn new(provider: Arc<dyn IdentityProvider>, config: &Config) -> Result<Self, String> {
        Ok(Self {
            provider,
            cookie_key: config.cookie_key()?,
            public_port: config.public_port,
            cookie_secure: config.cookie_secure,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
