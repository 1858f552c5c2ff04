//! JWT token generation and validation
//!
//! Three token kinds share one claim layout and differ only in `scope` and
//! lifetime: access tokens authenticate requests, refresh tokens mint new
//! pairs, email tokens confirm an address. The subject is the account email.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use photoshare_core::{AuthConfig, JwtAlgorithm};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Token scope discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    AccessToken,
    RefreshToken,
    EmailToken,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::EmailToken => "email_token",
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - account email
    pub sub: String,
    /// Issued at (Unix epoch seconds)
    pub iat: i64,
    /// Expiration (Unix epoch seconds)
    pub exp: i64,
    pub scope: TokenScope,
    /// Token issuer
    pub iss: String,
    /// Unique token id, so two tokens minted in the same second differ
    pub jti: String,
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Invalid scope for token")]
    InvalidScope,

    #[error("Token has no subject")]
    MissingSubject,
}

/// Mints and verifies signed bearer tokens
///
/// Built once from [`AuthConfig`] at startup; the secret and algorithm are
/// never changed afterwards.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    email_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("email_ttl", &self.email_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: match config.algorithm {
                JwtAlgorithm::HS256 => Algorithm::HS256,
                JwtAlgorithm::HS384 => Algorithm::HS384,
                JwtAlgorithm::HS512 => Algorithm::HS512,
            },
            issuer: config.issuer.clone(),
            access_ttl: seconds(config.access_token_ttl_secs),
            refresh_ttl: seconds(config.refresh_token_ttl_secs),
            email_ttl: seconds(config.email_token_ttl_secs),
        }
    }

    pub fn issue_access_token(&self, subject: &str) -> Result<String, TokenError> {
        self.issue(subject, TokenScope::AccessToken, self.access_ttl)
    }

    /// Access token with an explicit lifetime instead of the configured one
    pub fn issue_access_token_with_ttl(
        &self,
        subject: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.issue(subject, TokenScope::AccessToken, ttl)
    }

    pub fn issue_refresh_token(&self, subject: &str) -> Result<String, TokenError> {
        self.issue(subject, TokenScope::RefreshToken, self.refresh_ttl)
    }

    pub fn issue_email_token(&self, subject: &str) -> Result<String, TokenError> {
        self.issue(subject, TokenScope::EmailToken, self.email_ttl)
    }

    /// Subject of a valid access token
    pub fn verify_access_token(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token, TokenScope::AccessToken)
    }

    /// Subject of a valid refresh token
    pub fn verify_refresh_token(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token, TokenScope::RefreshToken)
    }

    /// Subject of a valid email confirmation token
    pub fn verify_email_token(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token, TokenScope::EmailToken)
    }

    fn issue(&self, subject: &str, scope: TokenScope, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            scope,
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?)
    }

    fn verify(&self, token: &str, expected: TokenScope) -> Result<String, TokenError> {
        let claims = self.decode(token)?;
        if claims.scope != expected {
            return Err(TokenError::InvalidScope);
        }
        if claims.sub.is_empty() {
            return Err(TokenError::MissingSubject);
        }
        Ok(claims.sub)
    }

    /// Check signature, issuer and expiry
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::ExpiredToken,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::InvalidToken,
            }
        })?;

        Ok(token_data.claims)
    }
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&AuthConfig::default())
    }

    #[test]
    fn test_issue_and_verify_each_scope() {
        let tokens = service();

        let access = tokens.issue_access_token("a@b.com").unwrap();
        let refresh = tokens.issue_refresh_token("a@b.com").unwrap();
        let email = tokens.issue_email_token("a@b.com").unwrap();

        assert_eq!(tokens.verify_access_token(&access).unwrap(), "a@b.com");
        assert_eq!(tokens.verify_refresh_token(&refresh).unwrap(), "a@b.com");
        assert_eq!(tokens.verify_email_token(&email).unwrap(), "a@b.com");
    }

    #[test]
    fn test_scopes_are_not_interchangeable() {
        let tokens = service();
        let access = tokens.issue_access_token("a@b.com").unwrap();
        let refresh = tokens.issue_refresh_token("a@b.com").unwrap();
        let email = tokens.issue_email_token("a@b.com").unwrap();

        assert!(matches!(
            tokens.verify_refresh_token(&access),
            Err(TokenError::InvalidScope)
        ));
        assert!(matches!(
            tokens.verify_access_token(&refresh),
            Err(TokenError::InvalidScope)
        ));
        assert!(matches!(
            tokens.verify_email_token(&access),
            Err(TokenError::InvalidScope)
        ));
        assert!(matches!(
            tokens.verify_access_token(&email),
            Err(TokenError::InvalidScope)
        ));
    }

    #[test]
    fn test_default_lifetimes() {
        let tokens = service();
        let claims = tokens
            .decode(&tokens.issue_access_token("a@b.com").unwrap())
            .unwrap();
        assert_eq!(claims.exp - claims.iat, 7200);

        let claims = tokens
            .decode(&tokens.issue_refresh_token("a@b.com").unwrap())
            .unwrap();
        assert_eq!(claims.exp - claims.iat, 604_800);

        let claims = tokens
            .decode(&tokens.issue_email_token("a@b.com").unwrap())
            .unwrap();
        assert_eq!(claims.exp - claims.iat, 604_800);
        assert_eq!(claims.iss, "photoshare");
    }

    #[test]
    fn test_tokens_minted_together_differ() {
        let tokens = service();
        let first = tokens.issue_refresh_token("a@b.com").unwrap();
        let second = tokens.issue_refresh_token("a@b.com").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_expired_token() {
        let tokens = service();
        let token = tokens
            .issue_access_token_with_ttl("a@b.com", Duration::seconds(-3600))
            .unwrap();

        assert!(matches!(
            tokens.verify_access_token(&token),
            Err(TokenError::ExpiredToken)
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let issuer = TokenService::new(&AuthConfig {
            jwt_secret: "secret1".to_string(),
            ..Default::default()
        });
        let verifier = TokenService::new(&AuthConfig {
            jwt_secret: "secret2".to_string(),
            ..Default::default()
        });

        let token = issuer.issue_access_token("a@b.com").unwrap();
        assert!(matches!(
            verifier.verify_access_token(&token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_issuer() {
        let issuer = TokenService::new(&AuthConfig {
            issuer: "someone-else".to_string(),
            ..Default::default()
        });
        let token = issuer.issue_access_token("a@b.com").unwrap();
        assert!(matches!(
            service().verify_access_token(&token),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_empty_subject_rejected() {
        let tokens = service();
        let token = tokens.issue_access_token("").unwrap();
        assert!(matches!(
            tokens.verify_access_token(&token),
            Err(TokenError::MissingSubject)
        ));
    }

    #[test]
    fn test_hs512() {
        let tokens = TokenService::new(&AuthConfig {
            algorithm: JwtAlgorithm::HS512,
            ..Default::default()
        });
        let token = tokens.issue_access_token("a@b.com").unwrap();
        assert_eq!(tokens.verify_access_token(&token).unwrap(), "a@b.com");
        assert!(matches!(
            service().verify_access_token(&token),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(
            service().verify_access_token("invalid.token.here"),
            Err(TokenError::InvalidToken)
        ));
    }
}
