//! Bearer token issuing and validation.
//!
//! Tokens are HS256 JWTs carrying only `{sub, iat, exp}` where `sub` is the account username.
//! Roles and permissions are deliberately absent from the claims and are resolved from the
//! store on every request.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{config::Config, errors::Error};

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String, // Subject (username)
    pub iat: i64,    // Issued at
    pub exp: i64,    // Expiration time
}

/// A freshly signed token and the instant it stops being accepted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signing and verification keys derived from the server secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validity: Duration,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").field("validity", &self.validity).finish_non_exhaustive()
    }
}

impl TokenKeys {
    pub fn new(secret: &[u8], validity: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validity,
        }
    }

    /// Build the keys at startup. A missing secret is fatal.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secret_key = config.secret_key.as_ref().ok_or_else(|| Error::Internal {
            operation: "token signing: secret_key is required".to_string(),
        })?;
        Ok(Self::new(secret_key.as_bytes(), config.auth.token.expiry))
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Sign a token for `username`, valid from now for the configured window.
    pub fn issue(&self, username: &str) -> Result<IssuedToken, Error> {
        self.issue_at(username, Utc::now())
    }

    pub fn issue_at(&self, username: &str, issued_at: DateTime<Utc>) -> Result<IssuedToken, Error> {
        let validity = chrono::Duration::from_std(self.validity).map_err(|e| Error::Internal {
            operation: format!("convert token validity: {e}"),
        })?;
        let expires_at = issued_at + validity;
        let claims = TokenClaims {
            sub: username.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| Error::Internal {
            operation: format!("create JWT: {e}"),
        })?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature and expiry against the current clock and return the claims.
    pub fn validate(&self, token: &str) -> Result<TokenClaims, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<TokenClaims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            // Client errors (401) - malformed tokens, bad signatures, expired tokens
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ExpiredSignature
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Error::Unauthenticated { message: None },

            // Server errors (500) - key issues, internal failures
            ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::RsaFailedSigning
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::MissingAlgorithm
            | ErrorKind::Crypto(_) => Error::Internal {
                operation: format!("JWT verification: {e}"),
            },

            _ => Error::Internal {
                operation: format!("JWT verification (unknown error): {e}"),
            },
        })?;

        Ok(token_data.claims)
    }
}
