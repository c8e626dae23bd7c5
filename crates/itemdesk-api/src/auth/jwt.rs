//! JWT token issuance and validation
//!
//! Access and refresh tokens share one HMAC secret and algorithm and differ
//! only in their `type` claim and lifetime. The service never checks `type`
//! itself; callers must, so that neither kind can stand in for the other.

use itemdesk_core::AuthConfig;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

/// Kind of token, carried in the `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived, authorizes resource access
    Access,
    /// Long-lived, only mints new access tokens
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT claims embedded in every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - username. Empty when the token carried none.
    #[serde(default)]
    pub sub: String,
    /// Token kind
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Expiration timestamp (Unix epoch seconds)
    pub exp: u64,
}

impl Claims {
    /// Subject, if the token carried a non-empty one
    pub fn subject(&self) -> Option<&str> {
        Some(self.sub.as_str()).filter(|s| !s.is_empty())
    }
}

/// JWT issuance errors
///
/// Validation never errors; see [`TokenService::decode`].
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Token lifetime out of range: {0}")]
    InvalidLifetime(String),

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// Issues and validates signed, expiring tokens
///
/// Holds the signing keys derived from the configured secret; built once at
/// startup and shared read-only.
#[derive(Clone)]
pub struct TokenService {
    header: Header,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.header.alg)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Build the service from auth configuration
    ///
    /// Only the HMAC family (HS256, HS384, HS512) is accepted, since keys are
    /// derived from a shared secret.
    pub fn new(config: &AuthConfig) -> Result<Self, JwtError> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .map_err(|_| JwtError::UnsupportedAlgorithm(config.algorithm.clone()))?;

        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(JwtError::UnsupportedAlgorithm(config.algorithm.clone()));
        }

        let access_secs = config
            .access_token_expire_minutes
            .checked_mul(60)
            .ok_or_else(|| {
                JwtError::InvalidLifetime(format!(
                    "{} access token minutes",
                    config.access_token_expire_minutes
                ))
            })?;
        let refresh_secs = config
            .refresh_token_expire_days
            .checked_mul(24 * 60 * 60)
            .ok_or_else(|| {
                JwtError::InvalidLifetime(format!(
                    "{} refresh token days",
                    config.refresh_token_expire_days
                ))
            })?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;

        Ok(Self {
            header: Header::new(algorithm),
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_ttl: Duration::from_secs(access_secs),
            refresh_ttl: Duration::from_secs(refresh_secs),
        })
    }

    /// Access token lifetime
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Refresh token lifetime
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue an access token for `subject`
    ///
    /// ```no_run
    /// use itemdesk_api::auth::jwt::{TokenService, TokenType};
    /// use itemdesk_core::AuthConfig;
    ///
    /// let tokens = TokenService::new(&AuthConfig::default()).unwrap();
    /// let token = tokens.issue_access("alice").unwrap();
    /// let claims = tokens.decode(&token).unwrap();
    /// assert_eq!(claims.token_type, TokenType::Access);
    /// ```
    pub fn issue_access(&self, subject: &str) -> Result<String, JwtError> {
        self.issue(subject, TokenType::Access, self.access_ttl)
    }

    /// Issue a refresh token for `subject`
    pub fn issue_refresh(&self, subject: &str) -> Result<String, JwtError> {
        self.issue(subject, TokenType::Refresh, self.refresh_ttl)
    }

    fn issue(&self, subject: &str, token_type: TokenType, ttl: Duration) -> Result<String, JwtError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let exp = now
            .checked_add(ttl.as_secs())
            .ok_or_else(|| JwtError::InvalidLifetime(format!("{ttl:?} from now")))?;

        let claims = Claims {
            sub: subject.to_string(),
            token_type,
            exp,
        };

        let token = encode(&self.header, &claims, &self.encoding_key)?;

        debug!(subject = %subject, token_type = %token_type, exp = claims.exp, "Token issued");
        Ok(token)
    }

    /// Verify signature and expiry and return the claims
    ///
    /// Bad signatures, malformed tokens and expired tokens all yield `None`;
    /// the reason is logged but not returned.
    pub fn decode(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => {
                debug!(
                    subject = %data.claims.sub,
                    token_type = %data.claims.token_type,
                    "Token decoded successfully"
                );
                Some(data.claims)
            }
            Err(e) => {
                use jsonwebtoken::errors::ErrorKind;
                match e.kind() {
                    ErrorKind::ExpiredSignature => debug!("Token rejected: expired"),
                    ErrorKind::InvalidSignature => warn!("Token rejected: invalid signature"),
                    _ => warn!(error = %e, "Token rejected: malformed"),
                }
                None
            }
        }
    }
}
