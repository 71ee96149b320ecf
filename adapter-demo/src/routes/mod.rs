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

//! Axum router configuration for the adapter demo.

mod pages;

use axum::{middleware, routing::get, Router};

use crate::security::{security_filter, SSO_CALLBACK_PATH};
use crate::state::AppState;

pub const INDEX_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const LOGOUT_PATH: &str = "/logout";

/// Build the application router with the security layer in front.
///
/// The layer answers `/sso/login` before routing; the route only exists so
/// the layer runs for it.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(INDEX_PATH, get(pages::index))
        .route(LOGIN_PATH, get(pages::login))
        .route(LOGOUT_PATH, get(pages::logout))
        .route(SSO_CALLBACK_PATH, get(pages::login))
        .layer(middleware::from_fn_with_state(state.clone(), security_filter))
        .with_state(state)
}
