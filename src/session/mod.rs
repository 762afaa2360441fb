pub mod jwt;

use crate::error::Result;
use async_trait::async_trait;
use axum::http::HeaderMap;
use std::fmt;

pub use jwt::JwtSessionResolver;

/// Role carried by an authenticated principal.
///
/// `Unknown` means the session resolved but its role claim was absent or
/// unrecognized; that is distinct from having no session at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Buyer,
    Unknown,
}

impl Role {
    /// Parse the role claim from a session token
    pub fn parse(raw: &str) -> Role {
        match raw {
            "ADMIN" => Role::Admin,
            "BUYER" => Role::Buyer,
            _ => Role::Unknown,
        }
    }

    /// Value forwarded downstream in `x-user-role`. Unrecognized roles
    /// forward as empty, which downstream handlers treat as "no role".
    pub fn forwarded_value(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Buyer => "BUYER",
            Role::Unknown => "",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "ADMIN",
            Role::Buyer => "BUYER",
            Role::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// The authenticated identity associated with one request
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

/// Session resolution contract consumed by the gatekeeper.
///
/// Invalid, expired or missing credentials resolve to `Ok(None)`, never an
/// error; `Err` is reserved for unexpected resolver failure and makes the
/// gatekeeper fall back to its generic login redirect. Called at most once
/// per request.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Principal>>;
}

/// Resolver used when no session backend is configured; every request is
/// anonymous and protected routes always redirect to login.
pub struct AnonymousResolver;

#[async_trait]
impl SessionResolver for AnonymousResolver {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<Option<Principal>> {
        Ok(None)
    }
}
