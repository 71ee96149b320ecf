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

//! Adapter demo server entry point.
//!
//! A standalone Axum service whose security layer logs users in against a
//! Keycloak realm, verifies their ID tokens and shows the claims.

use std::sync::Arc;

use adapter_demo::routes;
use adapter_demo::state::AppState;
use keycloak_demo_core::jwks::JwksCache;
use keycloak_demo_core::{telemetry, Config, KeycloakProvider, RealmEndpoints};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    telemetry::init();

    let config = Config::from_env().expect("failed to load configuration");

    let endpoints = RealmEndpoints::resolve(&config.keycloak)
        .await
        .expect("failed to resolve Keycloak realm endpoints");
    tracing::info!("Using Keycloak realm at {}", endpoints.issuer);

    let jwks_uri = endpoints.jwks_uri.clone().unwrap_or_default();
    if jwks_uri.is_empty() {
        tracing::warn!("Realm advertises no JWKS endpoint; ID tokens cannot be verified");
    }
    let jwks = JwksCache::new(jwks_uri);
    let issuer = Some(endpoints.issuer.clone());

    let provider =
        KeycloakProvider::new(endpoints, &config.client).expect("invalid Keycloak endpoints");
    let state = AppState::new(Arc::new(provider), jwks, issuer, &config)
        .expect("invalid session configuration");

    tracing::info!("Protected paths: {:?}", config.protected_paths);

    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind listener");

    tracing::info!("Adapter demo listening on {}", config.listen_addr);

    axum::serve(listener, app).await.expect("server error");
}
