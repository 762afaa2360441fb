use super::{Principal, Role, SessionResolver};
use crate::config::SessionConfig;
use crate::error::Result;
use async_trait::async_trait;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Session token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Role granted to the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// JWT-backed session resolver (HS256 bearer tokens)
pub struct JwtSessionResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtSessionResolver {
    /// Create a resolver from configuration
    pub fn new(config: &SessionConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.expose_secret().as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation.validate_exp = true;

        Self {
            decoding_key,
            validation,
        }
    }

    /// Extract the bearer token from the Authorization header
    fn extract_token(headers: &HeaderMap) -> Option<&str> {
        let auth_str = headers.get("authorization")?.to_str().ok()?;

        auth_str
            .strip_prefix("Bearer ")
            .or_else(|| auth_str.strip_prefix("bearer "))
    }
}

#[async_trait]
impl SessionResolver for JwtSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Principal>> {
        let token = match Self::extract_token(headers) {
            Some(token) => token,
            None => return Ok(None),
        };

        // A rejected token is "unauthenticated", not a resolver failure
        match decode::<SessionClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => {
                let role = data
                    .claims
                    .role
                    .as_deref()
                    .map(Role::parse)
                    .unwrap_or(Role::Unknown);

                Ok(Some(Principal {
                    id: data.claims.sub,
                    role,
                }))
            }
            Err(e) => {
                debug!("Session token rejected: {}", e);
                Ok(None)
            }
        }
    }
}
