//! Authentication and authorization
//!
//! - [`PasswordService`]: argon2 password hashing
//! - [`TokenService`]: HS256 bearer tokens carrying [`Claims`]
//! - [`AuthContext`] / [`AuthPolicy`]: who is calling and what they may do

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm as Argon2Algorithm, Argon2, Params, Version};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::core::error::{ApiError, AuthError, Result};

/// Role claim carried in every token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Decoded token payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed token
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// Passwords
// =============================================================================

/// Hashes and verifies passwords with argon2id
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
    /// Verified against when no account matches, so both paths cost the same
    decoy_hash: String,
}

impl PasswordService {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let params = Params::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            1,
            None,
        )
        .map_err(|e| ApiError::internal(format!("invalid argon2 parameters: {e}")))?;

        let argon2 = Argon2::new(Argon2Algorithm::Argon2id, Version::V0x13, params);
        let salt = SaltString::generate(&mut OsRng);
        let decoy_hash = argon2
            .hash_password(b"no account has this password", &salt)
            .map(|h| h.to_string())
            .map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))?;

        Ok(Self { argon2, decoy_hash })
    }

    /// A hash with the configured cost that no submitted password matches in practice
    pub fn decoy_hash(&self) -> &str {
        &self.decoy_hash
    }

    /// Hash a password with a fresh random salt (PHC string format)
    pub fn hash(&self, plain: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plain.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))
    }

    /// Check a password against a stored hash; malformed hashes never match
    pub fn verify(&self, plain: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

// =============================================================================
// Tokens
// =============================================================================

/// Issues and verifies HS256 bearer tokens
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            ttl: Duration::seconds(config.token_ttl_secs as i64),
        }
    }

    /// Sign a token for a user with the configured lifetime
    pub fn issue(&self, user_id: Uuid, email: &str, role: Role) -> Result<IssuedToken> {
        self.issue_with_ttl(user_id, email, role, self.ttl)
    }

    pub fn issue_with_ttl(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("token signing failed: {e}")))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature, issuer and expiry
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 5;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired.into(),
                _ => AuthError::InvalidToken.into(),
            })
    }

    /// Build the caller's context from request headers
    ///
    /// No `Authorization` header → [`AuthContext::Anonymous`]; a header that
    /// is present but not a valid bearer token is an error.
    pub fn extract_context(&self, headers: &HeaderMap) -> Result<AuthContext> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Ok(AuthContext::Anonymous);
        };

        let value = value.to_str().map_err(|_| AuthError::InvalidToken)?;
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidToken)?;

        Ok(AuthContext::from(self.verify(token)?))
    }
}

// =============================================================================
// Context and policies
// =============================================================================

/// Authorization context extracted from a request
#[derive(Debug, Clone, PartialEq)]
pub enum AuthContext {
    /// Authenticated user
    User {
        user_id: Uuid,
        email: String,
        role: Role,
    },

    /// No authentication (public access)
    Anonymous,
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        AuthContext::User {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

impl AuthContext {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AuthContext::User { user_id, .. } => Some(*user_id),
            AuthContext::Anonymous => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AuthContext::User { role: Role::Admin, .. })
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthContext::Anonymous)
    }
}

/// Authorization policy for an operation
#[derive(Debug, Clone)]
pub enum AuthPolicy {
    /// No auth required
    Public,

    /// Any authenticated user
    Authenticated,

    /// Role claim must be admin
    AdminOnly,

    /// The caller must be this user
    Owner(Uuid),

    /// All policies must pass
    And(Vec<AuthPolicy>),

    /// At least one policy must pass
    Or(Vec<AuthPolicy>),
}

impl AuthPolicy {
    /// Owner of the resource or an admin
    pub fn owner_or_admin(owner_id: Uuid) -> Self {
        AuthPolicy::Or(vec![AuthPolicy::Owner(owner_id), AuthPolicy::AdminOnly])
    }

    pub fn check(&self, context: &AuthContext) -> bool {
        match self {
            AuthPolicy::Public => true,
            AuthPolicy::Authenticated => context.is_authenticated(),
            AuthPolicy::AdminOnly => context.is_admin(),
            AuthPolicy::Owner(owner_id) => context.user_id() == Some(*owner_id),
            AuthPolicy::And(policies) => policies.iter().all(|p| p.check(context)),
            AuthPolicy::Or(policies) => policies.iter().any(|p| p.check(context)),
        }
    }

    /// Like [`check`](Self::check), but yields 401 for anonymous callers and 403 otherwise
    pub fn enforce(&self, context: &AuthContext) -> Result<()> {
        if self.check(context) {
            return Ok(());
        }
        if !context.is_authenticated() {
            return Err(AuthError::MissingToken.into());
        }
        Err(AuthError::Forbidden(self.describe()).into())
    }

    fn describe(&self) -> String {
        match self {
            AuthPolicy::Public => "public".to_string(),
            AuthPolicy::Authenticated => "authentication required".to_string(),
            AuthPolicy::AdminOnly => "admin role required".to_string(),
            AuthPolicy::Owner(_) => "resource owner only".to_string(),
            AuthPolicy::And(p) | AuthPolicy::Or(p) => p
                .iter()
                .map(AuthPolicy::describe)
                .collect::<Vec<_>>()
                .join(if matches!(self, AuthPolicy::And(_)) { " and " } else { " or " }),
        }
    }
}
