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

//! Token claim decoding and type-directed stringification.
//!
//! The pages list every claim of the ID token. Values are classified once
//! ([`ClaimValue`]) and rendered through `Display`, so a boolean prints as
//! `true`/`false`, a registered time claim as an RFC 3339 date and a nested
//! object as compact JSON.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use jsonwebtoken::{decode, DecodingKey, TokenData, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::pages::ClaimLine;

/// Registered claims carrying seconds since the Unix epoch.
pub const TIME_CLAIMS: [&str; 5] = ["exp", "iat", "nbf", "auth_time", "updated_at"];

/// Name shown when the token carries no `preferred_username`.
pub const UNKNOWN_NAME: &str = "Unknown name";

/// A single claim value, classified by its JSON type.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    Null,
    Boolean(bool),
    Date(DateTime<Utc>),
    Integer(i64),
    /// Unsigned value that does not fit an `i64`.
    Long(u64),
    Double(f64),
    Text(String),
    List(Vec<Value>),
    Map(Map<String, Value>),
}

impl ClaimValue {
    /// Classify `value`; `name` decides whether an integer is a timestamp.
    pub fn classify(name: &str, value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => {
                if TIME_CLAIMS.contains(&name) {
                    let date = n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0));
                    if let Some(date) = date {
                        return Self::Date(date);
                    }
                }
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    Self::Long(u)
                } else {
                    Self::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(items) => Self::List(items.clone()),
            Value::Object(map) => Self::Map(map.clone()),
        }
    }
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null value"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(date) => f.write_str(&date.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Long(u) => write!(f, "{u}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str(&serde_json::to_string(items).map_err(|_| fmt::Error)?)
            }
            Self::Map(map) => f.write_str(&serde_json::to_string(map).map_err(|_| fmt::Error)?),
        }
    }
}

fn decode_unverified<T: DeserializeOwned>(raw: &str) -> Result<TokenData<T>, AppError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<T>(raw, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| AppError::authentication_failed(&format!("cannot decode token: {e}")))
}

/// Request-scoped view over a JWT claim set. Never persisted; rebuilt from
/// the raw token whenever a page needs it.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    claims: Map<String, Value>,
}

impl DecodedToken {
    /// Decode a JWT for display.
    ///
    /// Neither signature nor expiry nor audience is checked: the token came
    /// straight from the token endpoint or out of an encrypted session cookie.
    pub fn decode(raw: &str) -> Result<Self, AppError> {
        let data = decode_unverified::<Map<String, Value>>(raw)?;
        Ok(Self {
            claims: data.claims,
        })
    }

    /// Every claim with its classified value, ordered by claim name.
    pub fn claims(&self) -> impl Iterator<Item = (&str, ClaimValue)> + '_ {
        self.claims
            .iter()
            .map(|(name, value)| (name.as_str(), ClaimValue::classify(name, value)))
    }

    pub fn string_claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    /// `preferred_username`, or [`UNKNOWN_NAME`].
    pub fn display_name(&self) -> String {
        self.string_claim("preferred_username")
            .unwrap_or(UNKNOWN_NAME)
            .to_string()
    }

    pub fn claim_lines(&self) -> Vec<ClaimLine> {
        self.claims()
            .map(|(name, value)| ClaimLine::new(name, value))
            .collect()
    }
}

/// `aud` is either a single client id or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::One(aud) => aud == client_id,
            Self::Many(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(aud) => f.write_str(aud),
            Self::Many(auds) => f.write_str(&auds.join(", ")),
        }
    }
}

/// ID token claims as issued by Keycloak.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeycloakIdToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Every claim not listed above (`name`, `email`, `nonce`, mappers...).
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl KeycloakIdToken {
    /// Read the claims of a token verified earlier, without checking it again.
    pub fn decode_unverified(raw: &str) -> Result<Self, AppError> {
        decode_unverified::<Self>(raw).map(|data| data.claims)
    }

    /// `preferred_username`, or [`UNKNOWN_NAME`].
    pub fn display_name(&self) -> &str {
        self.preferred_username.as_deref().unwrap_or(UNKNOWN_NAME)
    }

    /// The realm's account console, derived from the issuer.
    pub fn account_url(&self) -> Option<String> {
        self.iss
            .as_deref()
            .map(|iss| format!("{}/account", iss.trim_end_matches('/')))
    }

    /// Standard claims first, in Keycloak's order, then everything else.
    pub fn claim_lines(&self) -> Vec<ClaimLine> {
        let text = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);
        let number = |v: Option<i64>| v.map(Value::from).unwrap_or(Value::Null);

        let standard = [
            ("at_hash", text(&self.at_hash)),
            ("sub", text(&self.sub)),
            ("email_verified", self.email_verified.map(Value::Bool).unwrap_or(Value::Null)),
            ("iss", text(&self.iss)),
            ("typ", text(&self.typ)),
            ("preferred_username", text(&self.preferred_username)),
            ("aud", text(&self.aud.as_ref().map(Audience::to_string))),
            ("acr", text(&self.acr)),
            ("auth_time", number(self.auth_time)),
            ("exp", number(self.exp)),
            ("session_state", text(&self.session_state)),
            ("iat", number(self.iat)),
        ];

        standard
            .iter()
            .map(|(name, value)| ClaimLine::new(name, ClaimValue::classify(name, value)))
            .chain(
                self.other
                    .iter()
                    .map(|(name, value)| ClaimLine::new(name, ClaimValue::classify(name, value))),
            )
            .collect()
    }
}
