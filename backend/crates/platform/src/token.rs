//! Token Codec
//!
//! Signs and verifies PASETO `v4.public` tokens. The secret key is only needed
//! to issue; verification needs the public key alone.
//!
//! Tokens are never mutated after issuance. Revoking a refresh token is done
//! by deleting its server-side session record, so callers must check that
//! record in addition to [`TokenCodec::verify_as`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pasetors::Public;
use pasetors::errors::Error as PasetorsError;
use pasetors::keys::{AsymmetricKeyPair, AsymmetricPublicKey, AsymmetricSecretKey, Generate};
use pasetors::token::UntrustedToken;
use pasetors::version4::{PublicToken, V4};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;

/// Ed25519 secret key length (seed + public half)
pub const SECRET_KEY_LEN: usize = 64;
pub const PUBLIC_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
    Verification,
    PasswordReset,
}

impl TokenType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::Verification => "verification",
            TokenType::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token is malformed")]
    Malformed,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token expired at {0}")]
    Expired(DateTime<Utc>),

    #[error("Expected {expected} token, got {actual}")]
    WrongTokenType {
        expected: TokenType,
        actual: TokenType,
    },

    #[error("Token key error: {0}")]
    Key(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Signed payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Unique per issuance (UUID v4)
    pub jti: Uuid,
    pub sub: Uuid,
    pub iat: DateTime<Utc>,
    pub exp: DateTime<Utc>,
    pub typ: TokenType,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

pub struct TokenCodec {
    secret: AsymmetricSecretKey<V4>,
    public: AsymmetricPublicKey<V4>,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(
        secret: AsymmetricSecretKey<V4>,
        public: AsymmetricPublicKey<V4>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            secret,
            public,
            clock,
        }
    }

    /// Load a key pair from hex (64-byte secret, 32-byte public)
    pub fn from_hex(
        secret_hex: &str,
        public_hex: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        let secret_bytes =
            hex::decode(secret_hex.trim()).map_err(|e| TokenError::Key(e.to_string()))?;
        let public_bytes =
            hex::decode(public_hex.trim()).map_err(|e| TokenError::Key(e.to_string()))?;

        if secret_bytes.len() != SECRET_KEY_LEN {
            return Err(TokenError::Key(format!(
                "secret key must be {SECRET_KEY_LEN} bytes (got {})",
                secret_bytes.len()
            )));
        }
        if public_bytes.len() != PUBLIC_KEY_LEN {
            return Err(TokenError::Key(format!(
                "public key must be {PUBLIC_KEY_LEN} bytes (got {})",
                public_bytes.len()
            )));
        }

        let secret = AsymmetricSecretKey::<V4>::from(&secret_bytes)
            .map_err(|e| TokenError::Key(e.to_string()))?;
        let public = AsymmetricPublicKey::<V4>::from(&public_bytes)
            .map_err(|e| TokenError::Key(e.to_string()))?;

        Ok(Self::new(secret, public, clock))
    }

    /// Fresh random key pair; tokens do not survive a restart
    pub fn generate(clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        let pair =
            AsymmetricKeyPair::<V4>::generate().map_err(|e| TokenError::Key(e.to_string()))?;
        Ok(Self::new(pair.secret, pair.public, clock))
    }

    pub fn issue(
        &self,
        subject: Uuid,
        typ: TokenType,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        let iat = self.clock.now();
        let claims = TokenClaims {
            jti: Uuid::new_v4(),
            sub: subject,
            iat,
            exp: iat + ttl,
            typ,
        };

        let payload =
            serde_json::to_vec(&claims).map_err(|e| TokenError::Signing(e.to_string()))?;
        let token = PublicToken::sign(&self.secret, &payload, None, None)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }

    /// Signature and expiry check, any type
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let untrusted =
            UntrustedToken::<Public, V4>::try_from(token).map_err(|_| TokenError::Malformed)?;

        let trusted = PublicToken::verify(&self.public, &untrusted, None, None).map_err(
            |err| match err {
                PasetorsError::TokenValidation => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            },
        )?;

        let claims: TokenClaims =
            serde_json::from_str(trusted.payload()).map_err(|_| TokenError::Malformed)?;

        if self.clock.now() > claims.exp {
            return Err(TokenError::Expired(claims.exp));
        }

        Ok(claims)
    }

    pub fn verify_as(&self, token: &str, expected: TokenType) -> Result<TokenClaims, TokenError> {
        let claims = self.verify(token)?;
        if claims.typ != expected {
            return Err(TokenError::WrongTokenType {
                expected,
                actual: claims.typ,
            });
        }
        Ok(claims)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"[REDACTED]")
            .field("public", &hex::encode(self.public.as_bytes()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn codec() -> (TokenCodec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = TokenCodec::generate(clock.clone()).unwrap();
        (codec, clock)
    }

    #[test]
    fn test_issue_then_verify() {
        let (codec, _) = codec();
        let subject = Uuid::new_v4();

        let issued = codec
            .issue(subject, TokenType::Access, Duration::minutes(15))
            .unwrap();
        assert!(issued.token.starts_with("v4.public."));

        let claims = codec.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, subject);
        assert_eq!(claims.typ, TokenType::Access);
        assert_eq!(claims, issued.claims);
    }

    #[test]
    fn test_expired_after_ttl() {
        let (codec, clock) = codec();
        let issued = codec
            .issue(Uuid::new_v4(), TokenType::Refresh, Duration::minutes(5))
            .unwrap();

        clock.advance(Duration::minutes(5));
        assert!(codec.verify(&issued.token).is_ok());

        clock.advance(Duration::seconds(1));
        assert!(matches!(
            codec.verify(&issued.token),
            Err(TokenError::Expired(_))
        ));
    }

    #[test]
    fn test_wrong_type() {
        let (codec, _) = codec();
        let issued = codec
            .issue(Uuid::new_v4(), TokenType::Refresh, Duration::days(7))
            .unwrap();

        let err = codec.verify_as(&issued.token, TokenType::Access).unwrap_err();
        assert!(matches!(
            err,
            TokenError::WrongTokenType {
                expected: TokenType::Access,
                actual: TokenType::Refresh
            }
        ));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let (codec, clock) = codec();
        let other = TokenCodec::generate(clock).unwrap();
        let issued = other
            .issue(Uuid::new_v4(), TokenType::Access, Duration::minutes(15))
            .unwrap();

        assert!(matches!(
            codec.verify(&issued.token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let (codec, _) = codec();
        let issued = codec
            .issue(Uuid::new_v4(), TokenType::Access, Duration::minutes(15))
            .unwrap();

        let mut bytes = issued.token.into_bytes();
        let idx = bytes.len() - 10;
        bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(matches!(
            codec.verify(&tampered),
            Err(TokenError::InvalidSignature) | Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let (codec, _) = codec();
        assert!(matches!(codec.verify("not-a-token"), Err(TokenError::Malformed)));
        assert!(matches!(
            codec.verify("v2.local.abc"),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_unique_token_ids() {
        let (codec, _) = codec();
        let subject = Uuid::new_v4();
        let a = codec
            .issue(subject, TokenType::Access, Duration::minutes(15))
            .unwrap();
        let b = codec
            .issue(subject, TokenType::Access, Duration::minutes(15))
            .unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_from_hex_rejects_bad_lengths() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let err = TokenCodec::from_hex("abcd", &"00".repeat(32), clock).unwrap_err();
        assert!(matches!(err, TokenError::Key(_)));
    }

    #[test]
    fn test_from_hex_roundtrip() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let pair = AsymmetricKeyPair::<V4>::generate().unwrap();
        let codec = TokenCodec::from_hex(
            &hex::encode(pair.secret.as_bytes()),
            &hex::encode(pair.public.as_bytes()),
            clock,
        )
        .unwrap();

        let issued = codec
            .issue(Uuid::new_v4(), TokenType::Verification, Duration::hours(24))
            .unwrap();
        assert!(codec.verify_as(&issued.token, TokenType::Verification).is_ok());
    }
}
