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

//! HTML pages rendered by both demos.

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::claims::ClaimValue;

/// One `name: value` entry of the claims list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimLine {
    pub name: String,
    pub value: String,
}

impl ClaimLine {
    pub fn new(name: &str, value: ClaimValue) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "not_logged_in.html")]
pub struct NotLoggedInPage<'a> {
    pub login_path: &'a str,
}

#[derive(Template)]
#[template(path = "logged_in.html")]
pub struct LoggedInPage<'a> {
    pub name: &'a str,
    pub portal_url: &'a str,
    pub logout_path: &'a str,
    pub claims: Vec<ClaimLine>,
}

#[derive(Template)]
#[template(path = "login_error.html")]
pub struct LoginErrorPage<'a> {
    pub errors: &'a [String],
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage<'a> {
    pub status: u16,
    pub message: &'a str,
}

/// Render any page into an Axum `Html` response body.
pub trait RenderPage {
    fn into_html(self) -> Html<String>;
}

impl<T: Template> RenderPage for T {
    fn into_html(self) -> Html<String> {
        match self.render() {
            Ok(body) => Html(body),
            Err(e) => {
                tracing::error!("Failed to render page: {e}");
                Html("<h1>Internal server error</h1>".to_string())
            }
        }
    }
}

/// 401 response listing every login error.
pub fn login_error(errors: &[String]) -> Response {
    tracing::warn!("Login failed: {}", errors.join("; "));
    (StatusCode::UNAUTHORIZED, LoginErrorPage { errors }.into_html()).into_response()
}
