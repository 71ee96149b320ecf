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

//! Building blocks shared by the Keycloak demo servers.
//!
//! Both demos talk to the same Keycloak realm and render the same pages; they
//! only differ in *who* drives the OAuth exchange. This crate holds the
//! pieces that do not care about that difference: configuration, the
//! identity provider client, claim decoding and the HTML templates.

pub mod claims;
pub mod config;
pub mod error;
pub mod jwks;
pub mod pages;
pub mod provider;
pub mod realm;
pub mod telemetry;
pub mod urls;
pub mod verify;

pub use claims::{ClaimValue, DecodedToken, KeycloakIdToken};
pub use config::Config;
pub use error::AppError;
pub use provider::{
    AuthorizationRequest, CallbackParams, IdentityProvider, KeycloakProvider, ProviderError,
    TokenSet,
};
pub use realm::RealmEndpoints;
