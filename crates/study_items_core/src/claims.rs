//! crates/study_items_core/src/claims.rs
//!
//! Reads the claim set of an identity token without verifying its signature.
//! The server is the only authority on token trust; the values decoded here
//! are used for expiry hints and display fields, never for authorization.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::domain::User;
use crate::ports::{AuthError, AuthResult};

/// A token whose expiry is closer than this is treated as already expired.
pub const EXPIRY_MARGIN_SECS: i64 = 5 * 60;

/// Claims carried by the identity token that the client cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdTokenClaims {
    pub sub: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "cognito:username")]
    pub cognito_username: Option<String>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// Expiry, in seconds since the epoch.
    pub exp: Option<i64>,
}

impl IdTokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// True when the token stays valid for at least the expiry margin past `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires_at) => expires_at - now >= Duration::seconds(EXPIRY_MARGIN_SECS),
            None => false,
        }
    }
}

/// Decodes the payload segment of a JWT.
pub fn decode_claims(token: &str) -> AuthResult<IdTokenClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next()) {
        (Some(_), Some(payload)) if !payload.is_empty() => payload,
        _ => return Err(AuthError::InvalidToken("token is not a JWT".to_string())),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::InvalidToken(format!("payload is not base64url: {}", e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidToken(format!("payload is not a claim set: {}", e)))
}

/// Decodes the token and rejects it if it expires within the margin.
pub fn check_token_validity(token: &str, now: DateTime<Utc>) -> AuthResult<IdTokenClaims> {
    let claims = decode_claims(token)?;
    if !claims.is_usable_at(now) {
        return Err(AuthError::InvalidToken(match claims.exp {
            Some(exp) => format!("token expires at {} (within {}s)", exp, EXPIRY_MARGIN_SECS),
            None => "token has no exp claim".to_string(),
        }));
    }
    Ok(claims)
}

impl User {
    /// Builds the display profile from identity token claims.
    ///
    /// The display name falls back from `name` to `given_name` to `family_name`,
    /// then to the capitalized local part of the email, then to `"User"`.
    pub fn from_claims(claims: &IdTokenClaims) -> AuthResult<Self> {
        let id = claims
            .sub
            .clone()
            .ok_or_else(|| AuthError::InvalidToken("token has no sub claim".to_string()))?;

        let email = claims
            .email
            .clone()
            .or_else(|| claims.cognito_username.clone())
            .filter(|e| !e.is_empty());

        let display_name = [&claims.name, &claims.given_name, &claims.family_name]
            .into_iter()
            .flatten()
            .find(|n| !n.trim().is_empty())
            .cloned()
            .or_else(|| email.as_deref().and_then(name_from_email))
            .unwrap_or_else(|| "User".to_string());

        Ok(Self {
            id,
            email,
            display_name,
        })
    }
}

fn name_from_email(email: &str) -> Option<String> {
    let (local, _) = email.split_once('@')?;
    let mut chars = local.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}
