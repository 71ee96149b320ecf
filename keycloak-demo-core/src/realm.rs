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

//! Keycloak realm endpoints: the conventional URL layout, or OIDC discovery
//! through `.well-known/openid-configuration`.

use serde::Deserialize;

use crate::config::KeycloakConfig;
use crate::error::AppError;

/// Endpoints of one Keycloak realm.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RealmEndpoints {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub jwks_uri: Option<String>,
}

impl RealmEndpoints {
    /// Derive the endpoints from Keycloak's fixed layout
    /// (`{base}{context}/realms/{realm}/protocol/openid-connect/...`).
    pub fn from_base(base_url: &str, context_path: &str, realm: &str) -> Self {
        let context = context_path.trim_matches('/');
        let issuer = if context.is_empty() {
            format!("{}/realms/{realm}", base_url.trim_end_matches('/'))
        } else {
            format!("{}/{context}/realms/{realm}", base_url.trim_end_matches('/'))
        };
        let protocol = format!("{issuer}/protocol/openid-connect");

        Self {
            authorization_endpoint: format!("{protocol}/auth"),
            token_endpoint: format!("{protocol}/token"),
            end_session_endpoint: Some(format!("{protocol}/logout")),
            jwks_uri: Some(format!("{protocol}/certs")),
            issuer,
        }
    }

    /// Fetch the discovery document from `{issuer}/.well-known/openid-configuration`.
    pub async fn discover(issuer: &str) -> Result<Self, AppError> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );
        let resp = reqwest::get(&url)
            .await
            .map_err(|e| AppError::internal(&format!("OIDC discovery request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::internal(&format!(
                "OIDC discovery failed (HTTP {status}): {body}"
            )));
        }

        resp.json::<Self>().await.map_err(|e| {
            AppError::internal(&format!("Failed to parse OIDC discovery document: {e}"))
        })
    }

    /// Resolve the endpoints the way the configuration asks for.
    pub async fn resolve(config: &KeycloakConfig) -> Result<Self, AppError> {
        let conventional = Self::from_base(&config.base_url, &config.context_path, &config.realm);
        if !config.discovery {
            return Ok(conventional);
        }
        let discovered = Self::discover(&conventional.issuer).await?;
        tracing::info!("Discovered endpoints for issuer {}", discovered.issuer);
        Ok(discovered)
    }

    /// The realm's account console ("User portal").
    pub fn account_url(&self) -> String {
        format!("{}/account", self.issuer.trim_end_matches('/'))
    }
}
