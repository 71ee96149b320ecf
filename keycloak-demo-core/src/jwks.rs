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

//! Realm signing keys (JWKS) with rate-limited refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::AppError;

/// Minimum interval between JWKS refreshes (5 minutes).
const JWKS_REFRESH_INTERVAL_SECS: u64 = 300;

/// A JWK entry from the realm's certs endpoint.
#[derive(Debug, Deserialize)]
struct JwkEntry {
    kid: Option<String>,
    kty: String,
    #[serde(default)]
    alg: Option<String>,
    /// Keycloak publishes encryption keys (`use: enc`) next to signing keys.
    #[serde(default, rename = "use")]
    key_use: Option<String>,
    // RSA
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
    // EC
    #[serde(default)]
    crv: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<JwkEntry>,
}

/// Caches the realm's public keys, keyed by `kid`.
pub struct JwksCache {
    keys: RwLock<HashMap<String, (Algorithm, DecodingKey)>>,
    jwks_url: String,
    last_refresh: RwLock<Instant>,
}

impl JwksCache {
    pub fn new(jwks_url: String) -> Arc<Self> {
        Arc::new(Self {
            keys: RwLock::new(HashMap::new()),
            jwks_url,
            // Backdated so the first lookup triggers a fetch.
            last_refresh: RwLock::new(
                Instant::now()
                    .checked_sub(Duration::from_secs(JWKS_REFRESH_INTERVAL_SECS + 1))
                    .unwrap_or_else(Instant::now),
            ),
        })
    }

    /// A cache with pre-loaded keys that never goes to the network.
    pub fn with_keys(keys: HashMap<String, (Algorithm, DecodingKey)>) -> Arc<Self> {
        Arc::new(Self {
            keys: RwLock::new(keys),
            jwks_url: String::new(),
            last_refresh: RwLock::new(Instant::now()),
        })
    }

    /// Get the decoding key for `kid`, refreshing the cache (at most once
    /// per 5 minutes) when the key is unknown.
    pub async fn get_key(&self, kid: &str) -> Result<(Algorithm, DecodingKey), AppError> {
        {
            let keys = self.keys.read().await;
            if let Some((alg, key)) = keys.get(kid) {
                return Ok((*alg, key.clone()));
            }
        }

        self.refresh().await?;

        let keys = self.keys.read().await;
        keys.get(kid)
            .map(|(alg, key)| (*alg, key.clone()))
            .ok_or_else(|| AppError::authentication_failed(&format!("unknown signing key {kid}")))
    }

    async fn refresh(&self) -> Result<(), AppError> {
        if self.jwks_url.is_empty() {
            return Ok(());
        }
        {
            let last = self.last_refresh.read().await;
            if last.elapsed().as_secs() < JWKS_REFRESH_INTERVAL_SECS {
                return Ok(());
            }
        }

        let resp = reqwest::get(&self.jwks_url)
            .await
            .map_err(|e| AppError::internal(&format!("JWKS fetch failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(AppError::internal(&format!(
                "JWKS fetch returned HTTP {status}"
            )));
        }

        let doc: JwksDocument = resp
            .json()
            .await
            .map_err(|e| AppError::internal(&format!("Failed to parse JWKS: {e}")))?;

        let new_keys = parse_keys(&doc)?;
        tracing::info!("Loaded {} signing keys from {}", new_keys.len(), self.jwks_url);

        *self.keys.write().await = new_keys;
        *self.last_refresh.write().await = Instant::now();
        Ok(())
    }
}

fn parse_keys(doc: &JwksDocument) -> Result<HashMap<String, (Algorithm, DecodingKey)>, AppError> {
    let mut keys = HashMap::new();
    for jwk in &doc.keys {
        if jwk.key_use.as_deref() == Some("enc") {
            continue;
        }
        let Some(kid) = jwk.kid.clone() else {
            continue;
        };

        let decoding_key = match jwk.kty.as_str() {
            "RSA" => {
                let n = jwk.n.as_deref().unwrap_or_default();
                let e = jwk.e.as_deref().unwrap_or_default();
                if n.is_empty() || e.is_empty() {
                    continue;
                }
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| AppError::internal(&format!("Invalid RSA JWK: {e}")))?
            }
            "EC" => {
                let x = jwk.x.as_deref().unwrap_or_default();
                let y = jwk.y.as_deref().unwrap_or_default();
                if x.is_empty() || y.is_empty() {
                    continue;
                }
                DecodingKey::from_ec_components(x, y)
                    .map_err(|e| AppError::internal(&format!("Invalid EC JWK: {e}")))?
            }
            _ => continue,
        };

        keys.insert(kid, (jwk_algorithm(jwk), decoding_key));
    }
    Ok(keys)
}

/// Determine the JWT algorithm for a JWK entry.
fn jwk_algorithm(jwk: &JwkEntry) -> Algorithm {
    match jwk.alg.as_deref() {
        Some("RS384") => return Algorithm::RS384,
        Some("RS512") => return Algorithm::RS512,
        Some("PS256") => return Algorithm::PS256,
        Some("ES256") => return Algorithm::ES256,
        Some("ES384") => return Algorithm::ES384,
        Some("RS256") => return Algorithm::RS256,
        _ => {}
    }
    match jwk.kty.as_str() {
        "EC" => match jwk.crv.as_deref() {
            Some("P-384") => Algorithm::ES384,
            _ => Algorithm::ES256,
        },
        _ => Algorithm::RS256,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> JwksDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn encryption_keys_and_keys_without_kid_are_skipped() {
        let keys = parse_keys(&doc(
            r#"{"keys": [
                {"kid": "sig", "kty": "RSA", "alg": "RS256", "use": "sig",
                 "n": "AQAB", "e": "AQAB"},
                {"kid": "enc", "kty": "RSA", "alg": "RSA-OAEP", "use": "enc",
                 "n": "abc", "e": "AQAB"},
                {"kty": "RSA", "n": "abc", "e": "AQAB"}
            ]}"#,
        ))
        .unwrap();

        assert_eq!(keys.len(), 1);
        assert_eq!(keys["sig"].0, Algorithm::RS256);
    }

    #[test]
    fn algorithm_defaults_follow_key_type() {
        let ec = JwkEntry {
            kid: None,
            kty: "EC".to_string(),
            alg: None,
            key_use: None,
            n: None,
            e: None,
            crv: Some("P-384".to_string()),
            x: None,
            y: None,
        };
        assert_eq!(jwk_algorithm(&ec), Algorithm::ES384);

        let rsa = JwkEntry {
            kty: "RSA".to_string(),
            crv: None,
            ..ec
        };
        assert_eq!(jwk_algorithm(&rsa), Algorithm::RS256);
    }

    #[tokio::test]
    async fn unknown_kid_without_url_is_authentication_failure() {
        let cache = JwksCache::with_keys(HashMap::new());
        let Err(err) = cache.get_key("missing").await else {
            panic!("expected an error");
        };
        assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);
    }
}
