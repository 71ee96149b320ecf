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

//! Identity provider client: authorization URL construction, authorization
//! code -> token exchange, end-session URLs and back-channel logout.
//!
//! The protocol work is done by the `oauth2` crate; this module only adapts
//! it to a Keycloak realm and keeps the `id_token` that Keycloak returns next
//! to the access token.

use std::borrow::Cow;

use axum::http::StatusCode;
use futures::future::BoxFuture;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken,
    ExtraTokenFields, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope,
    StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::ClientConfig;
use crate::error::AppError;
use crate::realm::RealmEndpoints;

/// OIDC token endpoints return the ID token next to the OAuth2 fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

type KeycloakTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type OAuthClient = Client<
    BasicErrorResponse,
    KeycloakTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Failures talking to the identity provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with an OAuth2 error response.
    #[error("identity provider rejected the request: {error}")]
    Rejected {
        error: String,
        description: Option<String>,
    },

    /// The provider could not be reached or answered garbage.
    #[error("identity provider request failed: {0}")]
    Transport(String),

    #[error("invalid identity provider configuration: {0}")]
    Config(String),

    /// The redirect URI built from the request is not a valid URL.
    #[error("invalid redirect URI: {0}")]
    InvalidRedirect(String),
}

impl ProviderError {
    /// Strings fit for the login error page.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Rejected { error, description } => std::iter::once(error.clone())
                .chain(description.clone())
                .collect(),
            other => vec![other.to_string()],
        }
    }

    fn from_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> Self
    where
        RE: std::error::Error + 'static,
    {
        match err {
            RequestTokenError::ServerResponse(resp) => Self::Rejected {
                error: resp.error().to_string(),
                description: resp.error_description().cloned(),
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        let detail = err.to_string();
        match err {
            // Built from the request's Host / X-Forwarded-* headers.
            ProviderError::InvalidRedirect(_) => {
                AppError::new(StatusCode::BAD_REQUEST, "Invalid request host").with_detail(detail)
            }
            ProviderError::Rejected { .. } => {
                AppError::unauthorized("Login failed").with_detail(detail)
            }
            ProviderError::Transport(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "Identity provider unavailable")
                    .with_detail(detail)
            }
            ProviderError::Config(_) => AppError::internal(&detail),
        }
    }
}

/// Where to send the browser, plus what the callback must check it against.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub csrf_state: String,
    pub pkce_verifier: String,
}

/// Query parameters of the authorization response.
///
/// Parsed by hand rather than with `Query` because `error` may repeat and
/// every occurrence ends up on the error page.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// `error` and `error_description` values, in order of appearance.
    pub errors: Vec<String>,
}

impl CallbackParams {
    pub fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" | "error_description" => params.errors.push(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// Tokens returned by a successful code exchange.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// An OAuth2/OIDC identity provider as seen by the demos.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Build the authorization redirect for a login that returns to `redirect_uri`.
    fn authorization_request(&self, redirect_uri: &str)
        -> Result<AuthorizationRequest, ProviderError>;

    /// Exchange an authorization code for tokens.
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        pkce_verifier: &'a str,
        redirect_uri: &'a str,
    ) -> BoxFuture<'a, Result<TokenSet, ProviderError>>;

    /// RP-initiated logout URL, or `None` when the provider has no
    /// end-session endpoint.
    fn end_session_url(&self, id_token_hint: &str, post_logout_redirect_uri: &str)
        -> Option<String>;

    /// The user's account page at the provider.
    fn account_url(&self) -> String;

    /// Terminate the provider-side session from the server.
    fn logout_session<'a>(&'a self, refresh_token: &'a str)
        -> BoxFuture<'a, Result<(), ProviderError>>;
}

/// [`IdentityProvider`] backed by a Keycloak realm.
pub struct KeycloakProvider {
    client: OAuthClient,
    endpoints: RealmEndpoints,
    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
    http: reqwest::Client,
}

impl KeycloakProvider {
    pub fn new(endpoints: RealmEndpoints, config: &ClientConfig) -> Result<Self, ProviderError> {
        let auth_url = AuthUrl::new(endpoints.authorization_endpoint.clone())
            .map_err(|e| ProviderError::Config(format!("authorization endpoint: {e}")))?;
        let token_url = TokenUrl::new(endpoints.token_endpoint.clone())
            .map_err(|e| ProviderError::Config(format!("token endpoint: {e}")))?;

        let client = OAuthClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        Ok(Self {
            client,
            endpoints,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes: config.scopes.clone(),
            http: reqwest::Client::new(),
        })
    }
}

fn redirect_url(redirect_uri: &str) -> Result<RedirectUrl, ProviderError> {
    RedirectUrl::new(redirect_uri.to_string())
        .map_err(|e| ProviderError::InvalidRedirect(format!("{redirect_uri:?}: {e}")))
}

impl IdentityProvider for KeycloakProvider {
    fn authorization_request(
        &self,
        redirect_uri: &str,
    ) -> Result<AuthorizationRequest, ProviderError> {
        let redirect = redirect_url(redirect_uri)?;
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .set_pkce_challenge(pkce_challenge)
            .set_redirect_uri(Cow::Owned(redirect))
            .url();

        Ok(AuthorizationRequest {
            url: url.to_string(),
            csrf_state: csrf_state.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        })
    }

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        pkce_verifier: &'a str,
        redirect_uri: &'a str,
    ) -> BoxFuture<'a, Result<TokenSet, ProviderError>> {
        Box::pin(async move {
            let redirect = redirect_url(redirect_uri)?;
            let response = self
                .client
                .exchange_code(AuthorizationCode::new(code.to_string()))
                .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
                .set_redirect_uri(Cow::Owned(redirect))
                .request_async(async_http_client)
                .await
                .map_err(ProviderError::from_token_error)?;

            Ok(TokenSet {
                access_token: response.access_token().secret().clone(),
                id_token: response.extra_fields().id_token.clone(),
                refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            })
        })
    }

    fn end_session_url(
        &self,
        id_token_hint: &str,
        post_logout_redirect_uri: &str,
    ) -> Option<String> {
        let endpoint = self.endpoints.end_session_endpoint.as_deref()?;
        let mut url = match Url::parse(endpoint) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Invalid end-session endpoint {endpoint}: {e}");
                return None;
            }
        };
        url.query_pairs_mut()
            .append_pair("post_logout_redirect_uri", post_logout_redirect_uri)
            .append_pair("id_token_hint", id_token_hint);
        Some(url.to_string())
    }

    fn account_url(&self) -> String {
        self.endpoints.account_url()
    }

    fn logout_session<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let endpoint = self
                .endpoints
                .end_session_endpoint
                .as_deref()
                .ok_or_else(|| ProviderError::Config("no end-session endpoint".to_string()))?;

            let params = [
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
            ];

            let response = self
                .http
                .post(endpoint)
                .form(&params)
                .send()
                .await
                .map_err(|e| ProviderError::Transport(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::error!("Back-channel logout failed. Status: {status}, Body: {body}");
                return Err(ProviderError::Transport(format!(
                    "end-session endpoint returned HTTP {status}"
                )));
            }

            Ok(())
        })
    }
}
