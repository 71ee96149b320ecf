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

//! OAuth route handlers: login, authorization callback, logout.
//!
//! The session is an encrypted cookie holding the display name and the raw
//! ID token. The PKCE verifier and CSRF state of a pending login ride in a
//! second, short-lived encrypted cookie scoped to the callback path.

use axum::{
    extract::{RawQuery, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;
use keycloak_demo_core::pages::login_error;
use keycloak_demo_core::urls::external_url;
use keycloak_demo_core::{AppError, CallbackParams, DecodedToken, ProviderError};

use super::{CALLBACK_PATH, INDEX_PATH};
use crate::session::{self, LoginFlow, UserSession};
use crate::state::AppState;

/// GET /login
///
/// Starts the authorization-code flow: remembers state + PKCE verifier and
/// redirects to the realm's authorization endpoint.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    let redirect_uri = external_url(&headers, state.public_port, CALLBACK_PATH);
    let request = state.provider.authorization_request(&redirect_uri)?;

    let flow = LoginFlow {
        csrf_state: request.csrf_state,
        pkce_verifier: request.pkce_verifier,
    };
    let jar = session::start_flow(jar, &flow, state.cookie_secure)?;

    Ok((jar, Redirect::to(&request.url)))
}

/// GET /authorization-callback?code=...&state=...
///
/// Exchanges the code, stores the session and redirects home. Provider
/// errors, a missing code or a state mismatch render the login error page
/// and leave the user logged out.
pub async fn authorization_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: PrivateCookieJar,
    RawQuery(query): RawQuery,
) -> Response {
    let params = CallbackParams::parse(query.as_deref().unwrap_or_default());
    let (jar, flow) = session::take_flow(jar);

    if !params.errors.is_empty() {
        return (jar, login_error(&params.errors)).into_response();
    }

    let Some(flow) = flow else {
        return (jar, login_error(&["Login request expired, please try again".to_string()]))
            .into_response();
    };
    if params.state.as_deref() != Some(flow.csrf_state.as_str()) {
        return (jar, login_error(&["invalid_state".to_string()])).into_response();
    }
    let Some(code) = params.code else {
        return (jar, login_error(&["Missing authorization code".to_string()])).into_response();
    };

    let redirect_uri = external_url(&headers, state.public_port, CALLBACK_PATH);
    let tokens = match state
        .provider
        .exchange_code(&code, &flow.pkce_verifier, &redirect_uri)
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
    let decoded = match DecodedToken::decode(&id_token) {
        Ok(decoded) => decoded,
        Err(err) => return (jar, err).into_response(),
    };

    let user = UserSession {
        username: decoded.display_name(),
        token: id_token,
    };
    let jar = match session::store(jar, &user, state.cookie_secure) {
        Ok(jar) => jar,
        Err(err) => return err.into_response(),
    };

    tracing::info!("OAuth login successful for {}", user.username);

    let home = external_url(&headers, state.public_port, INDEX_PATH);
    (jar, Redirect::to(&home)).into_response()
}

/// GET /logout
///
/// Clears the session. With a session, the browser continues to the realm's
/// end-session endpoint so the Keycloak SSO session ends too.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    let token = session::current(&jar).map(|user| user.token);
    let jar = session::clear(jar);

    let target = token
        .and_then(|token| {
            let home = external_url(&headers, state.public_port, INDEX_PATH);
            state.provider.end_session_url(&token, &home)
        })
        .unwrap_or_else(|| INDEX_PATH.to_string());

    (jar, Redirect::to(&target))
}
