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

//! ID token signature and standard claim verification.

use jsonwebtoken::{decode, decode_header, Validation};

use crate::claims::KeycloakIdToken;
use crate::error::AppError;
use crate::jwks::JwksCache;

/// Verify an ID token against the realm keys and return its claims.
///
/// Validates: signature (via JWKS), `exp`, `aud` contains `client_id`,
/// optionally `iss` == `issuer`.
pub async fn verify_id_token(
    jwks: &JwksCache,
    id_token: &str,
    client_id: &str,
    issuer: Option<&str>,
) -> Result<KeycloakIdToken, AppError> {
    let header = decode_header(id_token)
        .map_err(|e| AppError::authentication_failed(&format!("Invalid JWT header: {e}")))?;

    let kid = header
        .kid
        .as_deref()
        .ok_or_else(|| AppError::authentication_failed("JWT header missing kid"))?;

    let (alg, key) = jwks.get_key(kid).await?;

    let mut validation = Validation::new(alg);
    validation.set_audience(&[client_id]);
    if let Some(iss) = issuer {
        validation.set_issuer(&[iss]);
    }
    validation.validate_exp = true;

    decode::<KeycloakIdToken>(id_token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| AppError::authentication_failed(&format!("JWT validation failed: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};

    use super::*;
    use crate::claims::Audience;

    const ISSUER: &str = "http://kc/auth/realms/demo";

    fn test_rsa_keypair() -> (EncodingKey, DecodingKey) {
        use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
        use rsa::RsaPrivateKey;

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let priv_pem = private_key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap();
        let encoding = EncodingKey::from_rsa_pem(priv_pem.as_bytes()).unwrap();

        let pub_pem = private_key
            .to_public_key()
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap();
        let decoding = DecodingKey::from_rsa_pem(pub_pem.as_bytes()).unwrap();

        (encoding, decoding)
    }

    fn jwks(key: DecodingKey) -> Arc<JwksCache> {
        let mut keys = HashMap::new();
        keys.insert("kid-1".to_string(), (Algorithm::RS256, key));
        JwksCache::with_keys(keys)
    }

    fn sign(key: &EncodingKey, kid: Option<&str>, claims: &KeycloakIdToken) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        encode(&header, claims, key).unwrap()
    }

    fn claims() -> KeycloakIdToken {
        let now = chrono::Utc::now().timestamp();
        KeycloakIdToken {
            sub: Some("f:42".to_string()),
            iss: Some(ISSUER.to_string()),
            aud: Some(Audience::One("demo".to_string())),
            preferred_username: Some("alice".to_string()),
            typ: Some("ID".to_string()),
            iat: Some(now),
            exp: Some(now + 300),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn valid_token_verifies() {
        let (enc, dec) = test_rsa_keypair();
        let token = sign(&enc, Some("kid-1"), &claims());

        let verified = verify_id_token(&jwks(dec), &token, "demo", Some(ISSUER))
            .await
            .expect("should verify");
        assert_eq!(verified.display_name(), "alice");
    }

    #[tokio::test]
    async fn tampered_token_rejected() {
        let (enc, dec) = test_rsa_keypair();
        let token = sign(&enc, Some("kid-1"), &claims());

        let len = token.len();
        let last = token.as_bytes()[len - 1];
        let replacement = if last == b'A' { b'B' } else { b'A' };
        let mut bytes = token.into_bytes();
        bytes[len - 1] = replacement;
        let token = String::from_utf8(bytes).unwrap();

        let err = verify_id_token(&jwks(dec), &token, "demo", Some(ISSUER))
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_issuer_rejected() {
        let (enc, dec) = test_rsa_keypair();
        let token = sign(&enc, Some("kid-1"), &claims());
        let result = verify_id_token(&jwks(dec), &token, "demo", Some("http://evil")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn wrong_audience_rejected() {
        let (enc, dec) = test_rsa_keypair();
        let token = sign(&enc, Some("kid-1"), &claims());
        let result = verify_id_token(&jwks(dec), &token, "other-client", Some(ISSUER)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn expired_token_rejected() {
        let (enc, dec) = test_rsa_keypair();
        let mut expired = claims();
        expired.exp = Some(1_000_000);
        let token = sign(&enc, Some("kid-1"), &expired);
        let result = verify_id_token(&jwks(dec), &token, "demo", Some(ISSUER)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_kid_rejected() {
        let (enc, dec) = test_rsa_keypair();
        let token = sign(&enc, None, &claims());
        let result = verify_id_token(&jwks(dec), &token, "demo", Some(ISSUER)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn issuer_check_skipped_when_none() {
        let (enc, dec) = test_rsa_keypair();
        let token = sign(&enc, Some("kid-1"), &claims());
        let result = verify_id_token(&jwks(dec), &token, "demo", None).await;
        assert!(result.is_ok());
    }
}
