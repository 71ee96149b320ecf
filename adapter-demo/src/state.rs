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

//! Shared application state passed to the security layer and the handlers.

use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use keycloak_demo_core::jwks::JwksCache;
use keycloak_demo_core::{Config, IdentityProvider};

#[derive(Clone)]
pub struct AppState {
    /// OAuth client for the Keycloak realm.
    pub provider: Arc<dyn IdentityProvider>,
    /// Realm signing keys for ID token verification.
    pub jwks: Arc<JwksCache>,
    /// Expected `aud` of ID tokens.
    pub client_id: String,
    /// Expected `iss` of ID tokens; `None` skips the check.
    pub issuer: Option<String>,
    pub cookie_key: Key,
    pub public_port: u16,
    pub cookie_secure: bool,
    /// Paths that require a logged-in principal.
    pub protected_paths: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        jwks: Arc<JwksCache>,
        issuer: Option<String>,
        config: &Config,
    ) -> Result<Self, String> {
        Ok(Self {
            provider,
            jwks,
            client_id: config.client.client_id.clone(),
            issuer,
            cookie_key: config.cookie_key()?,
            public_port: config.public_port,
            cookie_secure: config.cookie_secure,
            protected_paths: Arc::new(config.protected_paths.clone()),
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
