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

//! Application configuration loaded from environment variables.

use std::env;

use axum_extra::extract::cookie::Key;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Smallest key accepted for cookie encryption.
const MIN_SESSION_KEY_LEN: usize = 64;

/// Configuration shared by both demo servers.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server (e.g. "0.0.0.0:8080").
    pub listen_addr: String,
    /// Port used when building absolute URLs and no `X-Forwarded-Port` is sent.
    pub public_port: u16,
    /// Where the Keycloak realm lives.
    pub keycloak: KeycloakConfig,
    /// OAuth client registered in the realm.
    pub client: ClientConfig,
    /// Raw key material for the encrypted cookies. `None` means a random key
    /// per process, so sessions do not survive a restart.
    pub session_key: Option<Vec<u8>>,
    /// Add the `Secure` attribute to every cookie.
    pub cookie_secure: bool,
    /// Paths the adapter demo's security filter guards.
    pub protected_paths: Vec<String>,
}

/// Keycloak server location.
#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    /// Base URL of the Keycloak server (e.g. "https://localhost:8443").
    pub base_url: String,
    /// Context path Keycloak is mounted under; `/auth` for the classic
    /// distribution, empty for the Quarkus one.
    pub context_path: String,
    pub realm: String,
    /// Resolve endpoints through `.well-known/openid-configuration` instead
    /// of the conventional Keycloak layout.
    pub discovery: bool,
}

/// OAuth client credentials.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Required
    /// - `KEYCLOAK_URL`
    /// - `OAUTH_SECRET`
    ///
    /// # Optional
    /// - `LISTEN_ADDR` (default: `"0.0.0.0:8080"`)
    /// - `PUBLIC_PORT` (default: the port of `LISTEN_ADDR`)
    /// - `KEYCLOAK_CONTEXT_PATH` (default: `"/auth"`)
    /// - `KEYCLOAK_REALM` (default: `"demo"`)
    /// - `KEYCLOAK_DISCOVERY` (default: `false`)
    /// - `OAUTH_CLIENT_ID` (default: `"demo"`)
    /// - `OAUTH_SCOPES` (default: `"roles openid"`)
    /// - `SESSION_KEY` (base64, at least 64 bytes once decoded)
    /// - `COOKIE_SECURE` (default: `false`)
    /// - `PROTECTED_PATHS` (comma separated, default: `"/login"`)
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());

        let base_url = var("KEYCLOAK_URL").ok_or("KEYCLOAK_URL environment variable is required")?;
        let client_secret =
            var("OAUTH_SECRET").ok_or("OAUTH_SECRET environment variable is required")?;

        let listen_addr = var("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let public_port = match var("PUBLIC_PORT") {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| "PUBLIC_PORT must be a valid port number")?,
            None => listen_port(&listen_addr)?,
        };

        let session_key = var("SESSION_KEY")
            .map(|encoded| {
                let bytes = STANDARD
                    .decode(encoded.trim())
                    .map_err(|_| "SESSION_KEY must be valid base64".to_string())?;
                if bytes.len() < MIN_SESSION_KEY_LEN {
                    return Err(format!(
                        "SESSION_KEY must decode to at least {MIN_SESSION_KEY_LEN} bytes"
                    ));
                }
                Ok(bytes)
            })
            .transpose()?;

        let scopes = var("OAUTH_SCOPES")
            .unwrap_or_else(|| "roles openid".to_string())
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let protected_paths = var("PROTECTED_PATHS")
            .unwrap_or_else(|| "/login".to_string())
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            listen_addr,
            public_port,
            keycloak: KeycloakConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                context_path: lookup("KEYCLOAK_CONTEXT_PATH")
                    .unwrap_or_else(|| "/auth".to_string()),
                realm: var("KEYCLOAK_REALM").unwrap_or_else(|| "demo".to_string()),
                discovery: parse_flag(var("KEYCLOAK_DISCOVERY"), "KEYCLOAK_DISCOVERY")?,
            },
            client: ClientConfig {
                client_id: var("OAUTH_CLIENT_ID").unwrap_or_else(|| "demo".to_string()),
                client_secret,
                scopes,
            },
            session_key,
            cookie_secure: parse_flag(var("COOKIE_SECURE"), "COOKIE_SECURE")?,
            protected_paths,
        })
    }

    /// Key used by the private cookie jars.
    pub fn cookie_key(&self) -> Result<Key, String> {
        match &self.session_key {
            Some(bytes) => Key::try_from(bytes.as_slice())
                .map_err(|e| format!("SESSION_KEY is not usable: {e}")),
            None => {
                tracing::warn!(
                    "SESSION_KEY not set, generating a random one. \
                     Sessions will not survive a restart."
                );
                Ok(Key::generate())
            }
        }
    }
}

fn listen_port(listen_addr: &str) -> Result<u16, String> {
    listen_addr
        .rsplit(':')
        .next()
        .and_then(|port| port.parse::<u16>().ok())
        .ok_or_else(|| format!("cannot derive a port from LISTEN_ADDR {listen_addr:?}"))
}

fn parse_flag(value: Option<String>, name: &str) -> Result<bool, String> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("0") | Some("false") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some(other) => Err(format!("{name} must be a boolean, got {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("KEYCLOAK_URL", "https://keycloak.local:8443/"),
        ("OAUTH_SECRET", "0b663c27"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = load(&REQUIRED).expect("should load");
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.public_port, 8080);
        assert_eq!(config.keycloak.base_url, "https://keycloak.local:8443");
        assert_eq!(config.keycloak.context_path, "/auth");
        assert_eq!(config.keycloak.realm, "demo");
        assert!(!config.keycloak.discovery);
        assert_eq!(config.client.client_id, "demo");
        assert_eq!(config.client.scopes, vec!["roles", "openid"]);
        assert_eq!(config.protected_paths, vec!["/login"]);
        assert!(config.session_key.is_none());
        assert!(!config.cookie_secure);
    }

    #[test]
    fn missing_keycloak_url_is_an_error() {
        let err = load(&[("OAUTH_SECRET", "s")]).unwrap_err();
        assert!(err.contains("KEYCLOAK_URL"));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = load(&[("KEYCLOAK_URL", "http://kc")]).unwrap_err();
        assert!(err.contains("OAUTH_SECRET"));
    }

    #[test]
    fn public_port_follows_listen_addr() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("LISTEN_ADDR", "127.0.0.1:9443"));
        let config = load(&vars).expect("should load");
        assert_eq!(config.public_port, 9443);
    }

    #[test]
    fn explicit_public_port_wins() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("LISTEN_ADDR", "127.0.0.1:9443"));
        vars.push(("PUBLIC_PORT", "443"));
        let config = load(&vars).expect("should load");
        assert_eq!(config.public_port, 443);
    }

    #[test]
    fn empty_context_path_is_kept() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("KEYCLOAK_CONTEXT_PATH", ""));
        let config = load(&vars).expect("should load");
        assert_eq!(config.keycloak.context_path, "");
    }

    #[test]
    fn short_session_key_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("SESSION_KEY", "c2hvcnQ="));
        let err = load(&vars).unwrap_err();
        assert!(err.contains("at least 64 bytes"));
    }

    #[test]
    fn valid_session_key_builds_cookie_key() {
        let encoded = STANDARD.encode([7u8; 64]);
        let mut vars = REQUIRED.to_vec();
        vars.push(("SESSION_KEY", &encoded));
        let config = load(&vars).expect("should load");
        assert!(config.cookie_key().is_ok());
    }

    #[test]
    fn flags_and_lists_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("COOKIE_SECURE", "true"));
        vars.push(("KEYCLOAK_DISCOVERY", "1"));
        vars.push(("PROTECTED_PATHS", "/login, /admin ,"));
        vars.push(("OAUTH_SCOPES", "openid profile email"));
        let config = load(&vars).expect("should load");
        assert!(config.cookie_secure);
        assert!(config.keycloak.discovery);
        assert_eq!(config.protected_paths, vec!["/login", "/admin"]);
        assert_eq!(config.client.scopes, vec!["openid", "profile", "email"]);
    }

    #[test]
    fn bad_flag_is_an_error() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("COOKIE_SECURE", "maybe"));
        assert!(load(&vars).is_err());
    }
}
