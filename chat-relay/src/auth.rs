//! Credential verification and token issuance.
//!
//! Credentials are HS256 JWTs whose `sub` claim is the user's email. The
//! signing key is always injected (from configuration), never compiled in,
//! so keys can be rotated and tests can use their own.

use crate::directory::UserDirectory;
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use chat_types::Identity;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Shared HS256 secret.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Wrap a shared secret.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Self {
        Self(secret.as_ref().to_vec())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.0)
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.0)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// JWT claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's email.
    pub sub: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at (Unix timestamp).
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Resolves an opaque bearer credential to the identity it belongs to.
///
/// Callers must treat every error the same way; the variants only exist
/// so the cause can be logged.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verify a credential.
    async fn verify(&self, credential: &str) -> AuthResult<Identity>;
}

/// Verifies HS256 tokens and resolves their subject through a user directory.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    users: Arc<dyn UserDirectory>,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl JwtVerifier {
    /// Create a verifier for tokens signed with `key`.
    pub fn new(key: &SigningKey, users: Arc<dyn UserDirectory>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            decoding_key: key.decoding_key(),
            validation,
            users,
        }
    }

    /// Check signature and expiry, returning the claims.
    pub fn decode_claims(&self, token: &str) -> AuthResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, credential: &str) -> AuthResult<Identity> {
        let claims = self.decode_claims(credential)?;
        if claims.sub.is_empty() {
            return Err(AuthError::MissingSubject);
        }

        let user = self
            .users
            .find_by_email(&claims.sub)
            .await?
            .ok_or_else(|| AuthError::UnknownUser(claims.sub.clone()))?;

        Identity::new(user.email).map_err(|_| AuthError::MissingSubject)
    }
}

/// Signs access tokens for logged-in users.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer whose tokens live for `ttl`.
    pub fn new(key: &SigningKey, ttl: Duration) -> Self {
        Self {
            encoding_key: key.encoding_key(),
            ttl,
        }
    }

    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `email`, valid from now for the configured lifetime.
    pub fn issue(&self, email: &str) -> AuthResult<String> {
        let now = current_timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        self.issue_with_expiry(email, now, now.saturating_add(ttl))
    }

    fn issue_with_expiry(&self, email: &str, iat: i64, exp: i64) -> AuthResult<String> {
        let claims = Claims {
            sub: email.to_string(),
            exp,
            iat: Some(iat),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
