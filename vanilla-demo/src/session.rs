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

//! Cookie-backed session: the logged-in user and the in-flight login.
//!
//! Everything lives in a `PrivateCookieJar`, so values are encrypted and
//! authenticated with the application key and there is no server-side
//! session map.

use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::PrivateCookieJar;
use keycloak_demo_core::AppError;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::routes::CALLBACK_PATH;

pub const SESSION_COOKIE_NAME: &str = "KEYCLOAK_DEMO_SESSION";
const FLOW_COOKIE_NAME: &str = "__keycloak_demo_flow";

/// The logged-in user. A session always carries the ID token it was
/// created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub username: String,
    pub token: String,
}

/// CSRF state and PKCE verifier of a login waiting for its callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginFlow {
    pub csrf_state: String,
    pub pkce_verifier: String,
}

fn read<T: for<'de> Deserialize<'de>>(jar: &PrivateCookieJar, name: &str) -> Option<T> {
    let cookie = jar.get(name)?;
    match serde_json::from_str(cookie.value()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring unreadable {name} cookie: {e}");
            None
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value)
        .map_err(|e| AppError::internal(&format!("Failed to encode cookie: {e}")))
}

/// The current session, if the request carries a valid one.
pub fn current(jar: &PrivateCookieJar) -> Option<UserSession> {
    read(jar, SESSION_COOKIE_NAME)
}

/// Store `session`. The cookie lives as long as the browser session.
pub fn store(
    jar: PrivateCookieJar,
    session: &UserSession,
    secure: bool,
) -> Result<PrivateCookieJar, AppError> {
    let cookie = Cookie::build((SESSION_COOKIE_NAME, encode(session)?))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    Ok(jar.add(cookie))
}

pub fn clear(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE_NAME).path("/"))
}

/// Remember a login for its callback (5 minutes, callback path only).
pub fn start_flow(
    jar: PrivateCookieJar,
    flow: &LoginFlow,
    secure: bool,
) -> Result<PrivateCookieJar, AppError> {
    let cookie = Cookie::build((FLOW_COOKIE_NAME, encode(flow)?))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(CALLBACK_PATH)
        .max_age(Duration::minutes(5))
        .build();
    Ok(jar.add(cookie))
}

/// Take the pending login out of the jar; it is single use.
pub fn take_flow(jar: PrivateCookieJar) -> (PrivateCookieJar, Option<LoginFlow>) {
    let flow = read(&jar, FLOW_COOKIE_NAME);
    let jar = jar.remove(Cookie::build(FLOW_COOKIE_NAME).path(CALLBACK_PATH));
    (jar, flow)
}
