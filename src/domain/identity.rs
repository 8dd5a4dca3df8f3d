use crate::config::IdentityConfig;
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A user as vouched for by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Claims of an identity provider ID token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdTokenClaims {
    pub sub: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl IdTokenClaims {
    #[must_use]
    pub fn new(sub: impl Into<String>, ttl_secs: u64) -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
        Self { sub: sub.into(), exp: now + ttl_secs, name: None, email: None, picture: None, iss: None, aud: None }
    }

    /// Signs the claims. Used by development tooling standing in for the provider.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if signing fails.
    pub fn encode(&self, secret: &str) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), self, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|_| AppError::Internal)
    }

    /// Verifies signature, expiry and the optional issuer/audience.
    ///
    /// # Errors
    /// Returns `AppError::AuthError` for any invalid token.
    pub fn decode(token: &str, config: &IdentityConfig) -> Result<Self> {
        if config.token_secret.is_empty() {
            tracing::error!("Identity token secret is not configured");
            return Err(AppError::AuthError);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let data = decode::<Self>(token, &DecodingKey::from_secret(config.token_secret.as_bytes()), &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected identity token");
                AppError::AuthError
            })?;

        if data.claims.sub.is_empty() {
            return Err(AppError::AuthError);
        }
        Ok(data.claims)
    }
}

impl From<IdTokenClaims> for Identity {
    fn from(claims: IdTokenClaims) -> Self {
        Self {
            user_id: UserId::new(claims.sub),
            display_name: claims.name,
            email: claims.email,
            avatar_url: claims.picture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str) -> IdentityConfig {
        IdentityConfig { token_secret: secret.to_string(), ..IdentityConfig::default() }
    }

    #[test]
    fn test_claims_roundtrip() {
        let mut claims = IdTokenClaims::new("google-uid-1", 3600);
        claims.name = Some("Ravi Kumar".into());
        let token = claims.encode("secret").unwrap();

        let decoded = IdTokenClaims::decode(&token, &config("secret")).unwrap();
        assert_eq!(decoded, claims);

        let identity = Identity::from(decoded);
        assert_eq!(identity.user_id, UserId::new("google-uid-1"));
    }

    #[test]
    fn test_claims_invalid_secret() {
        let token = IdTokenClaims::new("u", 3600).encode("secret1").unwrap();
        let result = IdTokenClaims::decode(&token, &config("secret2"));
        assert!(matches!(result, Err(AppError::AuthError)));
    }

    #[test]
    fn test_issuer_mismatch_is_rejected() {
        let mut claims = IdTokenClaims::new("u", 3600);
        claims.iss = Some("https://other.example".into());
        let token = claims.encode("secret").unwrap();

        let mut cfg = config("secret");
        cfg.issuer = Some("https://accounts.example".into());
        assert!(matches!(IdTokenClaims::decode(&token, &cfg), Err(AppError::AuthError)));
    }

    #[test]
    fn test_unconfigured_secret_rejects_everything() {
        let token = IdTokenClaims::new("u", 3600).encode("secret").unwrap();
        assert!(IdTokenClaims::decode(&token, &config("")).is_err());
    }
}
