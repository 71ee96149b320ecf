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

//! Shared test helpers for adapter-demo integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use adapter_demo::{routes, state::AppState};
use axum::body::Body;
use axum::http::{self, header, Request};
use axum::response::{IntoResponse, Response};
use axum::Router;
use axum_extra::extract::cookie::{Cookie, Key};
use axum_extra::extract::PrivateCookieJar;
use futures::future::BoxFuture;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use keycloak_demo_core::jwks::JwksCache;
use keycloak_demo_core::{AuthorizationRequest, IdentityProvider, ProviderError, TokenSet};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const IDP_BASE: &str = "http://idp.test";
pub const ISSUER: &str = "http://idp.test/realms/demo";
pub const CLIENT_ID: &str = "demo";
pub const KID: &str = "kid-1";
pub const TEST_STATE: &str = "test-state";
pub const TEST_VERIFIER: &str = "test-verifier";

/// Identity provider double: fixed state and verifier, canned tokens.
pub struct FakeProvider {
    tokens: Result<TokenSet, (String, Option<String>)>,
    pub logged_out: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn returning_id_token(id_token: &str) -> Arc<Self> {
        Arc::new(Self {
            tokens: Ok(TokenSet {
                access_token: "access".to_string(),
                id_token: Some(id_token.to_string()),
                refresh_token: Some("refresh".to_string()),
            }),
            logged_out: Mutex::new(Vec::new()),
        })
    }

    pub fn rejecting(error: &str) -> Arc<Self> {
        Arc::new(Self {
            tokens: Err((error.to_string(), None)),
            logged_out: Mutex::new(Vec::new()),
        })
    }

    pub fn logged_out(&self) -> Vec<String> {
        self.logged_out.lock().unwrap().clone()
    }
}

impl IdentityProvider for FakeProvider {
    fn authorization_request(
        &self,
        redirect_uri: &str,
    ) -> Result<AuthorizationRequest, ProviderError> {
        url::Url::parse(redirect_uri)
            .map_err(|e| ProviderError::InvalidRedirect(format!("{redirect_uri:?}: {e}")))?;
        let mut url = url::Url::parse(&format!("{IDP_BASE}/auth")).unwrap();
        url.query_pairs_mut()
            .append_pair("state", TEST_STATE)
            .append_pair("redirect_uri", redirect_uri);
        Ok(AuthorizationRequest {
            url: url.to_string(),
            csrf_state: TEST_STATE.to_string(),
            pkce_verifier: TEST_VERIFIER.to_string(),
        })
    }

    fn exchange_code<'a>(
        &'a self,
        _code: &'a str,
        _pkce_verifier: &'a str,
        _redirect_uri: &'a str,
    ) -> BoxFuture<'a, Result<TokenSet, ProviderError>> {
        let result = self
            .tokens
            .clone()
            .map_err(|(error, description)| ProviderError::Rejected { error, description });
        Box::pin(async move { result })
    }

    fn end_session_url(
        &self,
        _id_token_hint: &str,
        _post_logout_redirect_uri: &str,
    ) -> Option<String> {
        None
    }

    fn account_url(&self) -> String {
        format!("{ISSUER}/account")
    }

    fn logout_session<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        self.logged_out.lock().unwrap().push(refresh_token.to_string());
        Box::pin(async { Ok(()) })
    }
}

/// Generate an RSA keypair for signing test tokens.
pub fn rsa_keypair() -> (EncodingKey, DecodingKey) {
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;

    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
    let priv_pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
    let pub_pem = private_key
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap();

    (
        EncodingKey::from_rsa_pem(priv_pem.as_bytes()).unwrap(),
        DecodingKey::from_rsa_pem(pub_pem.as_bytes()).unwrap(),
    )
}

/// The realm's signing key, shared by every test in the binary.
pub fn realm_keypair() -> &'static (EncodingKey, DecodingKey) {
    static KEYS: OnceLock<(EncodingKey, DecodingKey)> = OnceLock::new();
    KEYS.get_or_init(rsa_keypair)
}

/// Claims of a fresh ID token for `alice`.
pub fn id_token_claims() -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "sub": "f:1:alice",
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "typ": "ID",
        "preferred_username": "alice",
        "email_verified": true,
        "iat": now,
        "exp": now + 300,
        "locale": "en",
    })
}

/// RS256-sign `claims` with `key`, tagged with the realm's key id.
pub fn sign_with(key: &EncodingKey, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    encode(&header, claims, key).expect("signing test token should not fail")
}

pub fn realm_signed(claims: &Value) -> String {
    sign_with(&realm_keypair().0, claims)
}

/// Build the router around `provider` with the realm key pre-loaded.
pub fn build_app(provider: Arc<dyn IdentityProvider>) -> Router {
    build_app_with_key(provider, Key::generate())
}

/// Like [`build_app`], with a known cookie key so tests can forge a principal.
pub fn build_app_with_key(provider: Arc<dyn IdentityProvider>, cookie_key: Key) -> Router {
    let mut keys = HashMap::new();
    keys.insert(KID.to_string(), (Algorithm::RS256, realm_keypair().1.clone()));

    let state = AppState {
        provider,
        jwks: JwksCache::with_keys(keys),
        client_id: CLIENT_ID.to_string(),
        issuer: Some(ISSUER.to_string()),
        cookie_key,
        public_port: 8080,
        cookie_secure: false,
        protected_paths: Arc::new(vec!["/login".to_string()]),
    };
    routes::router(state)
}

pub fn get(uri: &str, cookies: &[String]) -> Request<Body> {
    let mut builder = http::Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::HOST, "localhost:8080");
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookies.join("; "));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn response_text(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(resp: &Response) -> String {
    resp.headers()
        .get(header::LOCATION)
        .expect("response should redirect")
        .to_str()
        .unwrap()
        .to_string()
}

/// `name=value` pairs of every non-empty cookie the response sets.
pub fn set_cookies(resp: &Response) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .filter(|pair| pair.split_once('=').is_some_and(|(_, v)| !v.is_empty()))
        .map(str::to_string)
        .collect()
}

/// Raw `Set-Cookie` header for `name`, if the response sets one.
pub fn set_cookie_header(resp: &Response, name: &str) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// A `name=value` cookie pair encrypted with `key`, as the browser would send it.
pub fn private_cookie(key: &Key, name: &str, value: &str) -> String {
    let cookie = Cookie::new(name.to_string(), value.to_string());
    let jar = PrivateCookieJar::new(key.clone()).add(cookie);
    let resp = (jar, ()).into_response();
    set_cookies(&resp)
        .into_iter()
        .next()
        .expect("jar should set the cookie")
}
