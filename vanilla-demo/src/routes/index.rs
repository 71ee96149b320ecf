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

//! Home page: login prompt or the claims of the session's ID token.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::PrivateCookieJar;
use keycloak_demo_core::pages::{LoggedInPage, NotLoggedInPage, RenderPage};
use keycloak_demo_core::DecodedToken;

use super::{LOGIN_PATH, LOGOUT_PATH};
use crate::session;
use crate::state::AppState;

/// GET /
pub async fn index(State(state): State<AppState>, jar: PrivateCookieJar) -> Response {
    let Some(user) = session::current(&jar) else {
        return NotLoggedInPage {
            login_path: LOGIN_PATH,
        }
        .into_html()
        .into_response();
    };

    let decoded = match DecodedToken::decode(&user.token) {
        Ok(decoded) => decoded,
        // The stored token is useless from now on; drop the session with it.
        Err(err) => return (session::clear(jar), err).into_response(),
    };

    let name = decoded.display_name();
    let portal_url = state.provider.account_url();

    LoggedInPage {
        name: &name,
        portal_url: &portal_url,
        logout_path: LOGOUT_PATH,
        claims: decoded.claim_lines(),
    }
    .into_html()
    .into_response()
}
