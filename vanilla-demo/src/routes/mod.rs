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

//! Axum router configuration for the vanilla demo.

pub mod auth;
pub mod index;

use axum::{routing::get, Router};

use crate::state::AppState;

pub const INDEX_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const LOGOUT_PATH: &str = "/logout";
pub const CALLBACK_PATH: &str = "/authorization-callback";

/// Build the application router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(INDEX_PATH, get(index::index))
        .route(LOGIN_PATH, get(auth::login))
        .route(CALLBACK_PATH, get(auth::authorization_callback))
        .route(LOGOUT_PATH, get(auth::logout))
}
