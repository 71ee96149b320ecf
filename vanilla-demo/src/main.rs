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

//! Vanilla demo server entry point.
//!
//! A standalone Axum service that logs users in against a Keycloak realm
//! with hand-written OAuth handlers and shows their ID token claims.

use std::sync::Arc;

use keycloak_demo_core::{telemetry, Config, KeycloakProvider, RealmEndpoints};
use tower_http::trace::TraceLayer;
use vanilla_demo::routes;
use vanilla_demo::state::AppState;

#[tokio::main]
async fn main() {
    telemetry::init();

    let config = Config::from_env().expect("failed to load configuration");

    let endpoints = RealmEndpoints::resolve(&config.keycloak)
        .await
        .expect("failed to resolve Keycloak realm endpoints");
    tracing::info!("Using Keycloak realm at {}", endpoints.issuer);

    let provider =
        KeycloakProvider::new(endpoints, &config.client).expect("invalid Keycloak endpoints");
    let state = AppState::new(Arc::new(provider), &config).expect("invalid session configuration");

    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind listener");

    tracing::info!("Vanilla demo listening on {}", config.listen_addr);

    axum::serve(listener, app).await.expect("server error");
}
