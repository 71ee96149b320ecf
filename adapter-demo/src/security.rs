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

//! Security layer: owns the whole OAuth exchange so handlers never see it.
//!
//! - `GET /sso/login` is the redirect URI. The layer checks the state,
//!   exchanges the code, verifies the ID token against the realm keys and
//!   stores a [`KeycloakPrincipal`] in an encrypted cookie.
//! - Anonymous requests for a protected path are remembered and sent to the
//!   realm's login page; after the callback the browser returns there.
//! - Every other request gets the principal (if any) in its extensions,
//!   readable through the [`Principal`] extractor.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::PrivateCookieJar;
use keycloak_demo_core::pages::login_error;
use keycloak_demo_core::urls::external_url;
use keycloak_demo_core::verify::verify_id_token;
use keycloak_demo_core::{AppError, CallbackParams, ProviderError};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::state::AppState;

/// Redirect URI registered with the realm.
pub const SSO_CALLBACK_PATH: &str = "/sso/login";
pub const PRINCIPAL_COOKIE_NAME: &str = "KEYCLOAK_ADAPTER_PRINCIPAL";
const FLOW_COOKIE_NAME: &str = "__keycloak_adapter_flow";

/// The authenticated user as stored between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeycloakPrincipal {
    /// Verified when the principal was created.
    pub id_token: String,
    pub refresh_token: Option<String>,
}

/// A login waiting for its callback, and where it started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SavedRequest {
    csrf_state: String,
    pkce_verifier: String,
    target: String,
}

/// The request's principal, `None` for anonymous requests.
#[derive(Debug, Clone, Default)]
pub struct Principal(pub Option<KeycloakPrincipal>);

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<KeycloakPrincipal>().cloned()))
    }
}

// ---------------------------------------------------------------------------
// Cookies
// ---------------------------------------------------------------------------

fn read_cookie<T: for<'de> Deserialize<'de>>(jar: &PrivateCookieJar, name: &str) -> Option<T> {
    let cookie = jar.get(name)?;
    match serde_json::from_str(cookie.value()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring unreadable {name} cookie: {e}");
            None
        }
    }
}

fn build_cookie<T: Serialize>(
    name: &'static str,
    value: &T,
    path: &'static str,
    secure: bool,
) -> Result<Cookie<'static>, AppError> {
    let value = serde_json::to_string(value)
        .map_err(|e| AppError::internal(&format!("Failed to encode cookie: {e}")))?;
    Ok(Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(path)
        .build())
}

pub fn current_principal(jar: &PrivateCookieJar) -> Option<KeycloakPrincipal> {
    read_cookie(jar, PRINCIPAL_COOKIE_NAME)
}

pub fn clear_principal(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(PRINCIPAL_COOKIE_NAME).path("/"))
}

fn store_principal(
    jar: PrivateCookieJar,
    principal: &KeycloakPrincipal,
    secure: bool,
) -> Result<PrivateCookieJar, AppError> {
    Ok(jar.add(build_cookie(PRINCIPAL_COOKIE_NAME, principal, "/", secure)?))
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// `path` is protected if it equals a configured path or lies below it.
pub fn is_protected(protected_paths: &[String], path: &str) -> bool {
    protected_paths.iter().any(|protected| {
        let protected = protected.trim_end_matches('/');
        protected.is_empty()
            || path == protected
            || path
                .strip_prefix(protected)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn security_filter(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if path == SSO_CALLBACK_PATH {
        let (parts, _) = request.into_parts();
        return complete_login(&state, jar, &parts.headers, parts.uri.query()).await;
    }

    match current_principal(&jar) {
        Some(principal) => {
            request.extensions_mut().insert(principal);
        }
        None if is_protected(&state.protected_paths, &path) => {
            let target = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or(path);
            tracing::debug!("Anonymous request for {target}, starting login");
            return match start_login(&state, jar, request.headers(), target) {
                Ok(response) => response.into_response(),
                Err(err) => err.into_response(),
            };
        }
        None => {}
    }

    next.run(request).await
}

fn start_login(
    state: &AppState,
    jar: PrivateCookieJar,
    headers: &HeaderMap,
    target: String,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    let redirect_uri = external_url(headers, state.public_port, SSO_CALLBACK_PATH);
    let request = state.provider.authorization_request(&redirect_uri)?;

    let saved = SavedRequest {
        csrf_state: request.csrf_state,
        pkce_verifier: request.pkce_verifier,
        target,
    };
    let mut cookie =
        build_cookie(FLOW_COOKIE_NAME, &saved, SSO_CALLBACK_PATH, state.cookie_secure)?;
    cookie.set_max_age(Duration::minutes(5));

    Ok((jar.add(cookie), Redirect::to(&request.url)))
}

async fn complete_login(
    state: &AppState,
    jar: PrivateCookieJar,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Response {
    let params = CallbackParams::parse(query.unwrap_or_default());
    let saved: Option<SavedRequest> = read_cookie(&jar, FLOW_COOKIE_NAME);
    let jar = jar.remove(Cookie::build(FLOW_COOKIE_NAME).path(SSO_CALLBACK_PATH));

    if !params.errors.is_empty() {
        return (jar, login_error(&params.errors)).into_response();
    }
    let Some(saved) = saved else {
        return (jar, login_error(&["Login request expired, please try again".to_string()]))
            .into_response();
    };
    if params.state.as_deref() != Some(saved.csrf_state.as_str()) {
        return (jar, login_error(&["invalid_state".to_string()])).into_response();
    }
    let Some(code) = params.code else {
        return (jar, login_error(&["Missing authorization code".to_string()])).into_response();
    };

    let redirect_uri = external_url(headers, state.public_port, SSO_CALLBACK_PATH);
    let tokens = match state
        .provider
        .exchange_code(&code, &saved.pkce_verifier, &redirect_uri)
        .await
    {
        Ok(tokens) => tokens,
        Err(err @ ProviderError::Rejected { .. }) => {
            return (jar, login_error(&err.messages())).into_response();
        }
        Err(err) => return (jar, AppError::from(err)).into_response(),
    };

    let Some(id_token) = tokens.id_token else {
        return (jar, AppError::unauthorized("id_token wasn't returned")).into_response();
    };
    let claims = match verify_id_token(
        &state.jwks,
        &id_token,
        &state.client_id,
        state.issuer.as_deref(),
    )
    .await
    {
        Ok(claims) => claims,
        Err(err) => return (jar, err).into_response(),
    };

    let principal = KeycloakPrincipal {
        id_token,
        refresh_token: tokens.refresh_token,
    };
    let jar = match store_principal(jar, &principal, state.cookie_secure) {
        Ok(jar) => jar,
        Err(err) => return err.into_response(),
    };

    tracing::info!("Keycloak login successful for {}", claims.display_name());

    let target = if saved.target.starts_with('/') && !saved.target.starts_with("//") {
        saved.target
    } else {
        "/".to_string()
    };
    (jar, Redirect::to(&target)).into_response()
}
