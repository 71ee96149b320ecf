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

//! Page handlers. Authentication is already settled by the security layer.

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;
use keycloak_demo_core::pages::{LoggedInPage, NotLoggedInPage, RenderPage};
use keycloak_demo_core::KeycloakIdToken;

use super::{INDEX_PATH, LOGIN_PATH, LOGOUT_PATH};
use crate::security::{self, Principal};
use crate::state::AppState;

/// GET /
pub async fn index(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Principal(principal): Principal,
) -> Response {
    let Some(principal) = principal else {
        return NotLoggedInPage {
            login_path: LOGIN_PATH,
        }
        .into_html()
        .into_response();
    };

    let token = match KeycloakIdToken::decode_unverified(&principal.id_token) {
        Ok(token) => token,
        Err(err) => return (security::clear_principal(jar), err).into_response(),
    };
    let portal_url = token
        .account_url()
        .unwrap_or_else(|| state.provider.account_url());

    LoggedInPage {
        name: token.display_name(),
        portal_url: &portal_url,
        logout_path: LOGOUT_PATH,
        claims: token.claim_lines(),
    }
    .into_html()
    .into_response()
}

/// GET /login
///
/// Protected: by the time this runs the user is logged in.
pub async fn login() -> Redirect {
    Redirect::to(INDEX_PATH)
}

/// GET /logout
///
/// Drops the principal and ends the realm session over the back channel.
pub async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Principal(principal): Principal,
) -> (PrivateCookieJar, Redirect) {
    if let Some(refresh_token) = principal.and_then(|p| p.refresh_token) {
        if let Err(e) = state.provider.logout_session(&refresh_token).await {
            tracing::warn!("Back-channel logout failed: {e}");
        }
    }

    (security::clear_principal(jar), Redirect::to(INDEX_PATH))
}
