use std::time::Duration;

use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::TokenConfig;

const ALGORITHM: Algorithm = Algorithm::HS256;
const SECRET_LEN: usize = 256;

/// Why a token was refused. Callers outside this module only ever report
/// "unauthorized"; the variants exist for logs and tests.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token algorithm {0:?} is not accepted")]
    AlgorithmMismatch(String),
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token expiry is out of range")]
    ExpiryOutOfRange,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Token payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject account id.
    pub id: Uuid,
    /// Issued at, unix seconds.
    pub iat: i64,
    /// Expires at, unix seconds.
    pub exp: i64,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Process-scoped HMAC key. Held only in memory; a restart with a generated
/// secret invalidates every token issued before it.
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn generate() -> Result<Self, rand::Error> {
        let mut bytes = vec![0u8; SECRET_LEN];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_config(cfg: &TokenConfig) -> Result<Self, rand::Error> {
        match &cfg.secret {
            Some(secret) => Ok(Self::from_bytes(secret.as_bytes())),
            None => {
                warn!(
                    "no TOKEN_SECRET configured; generated an ephemeral signing secret, \
                     restarting will invalidate all issued tokens"
                );
                Self::generate()
            }
        }
    }
}

/// Issues and validates HS256 bearer tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: SigningSecret, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(&secret.0),
            decoding: DecodingKey::from_secret(&secret.0),
            ttl,
        }
    }

    pub fn from_config(cfg: &TokenConfig) -> anyhow::Result<Self> {
        let ttl = cfg.ttl().with_context(|| {
            format!("token TTL of {} minutes is out of range", cfg.ttl_minutes)
        })?;
        let secret = SigningSecret::from_config(cfg).context("generate signing secret")?;
        Ok(Self::new(secret, ttl))
    }

    pub fn issue(&self, subject: Uuid) -> Result<String, TokenError> {
        self.issue_at(subject, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_at(
        &self,
        subject: Uuid,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|secs| issued_at.checked_add(TimeDuration::seconds(secs)))
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let claims = Claims {
            id: subject,
            iat: issued_at.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };
        let token =
            encode(&Header::new(ALGORITHM), &claims, &self.encoding).map_err(TokenError::Signing)?;
        debug!(subject = %subject, exp = claims.exp, "token issued");
        Ok(token)
    }

    /// Returns the subject of a well-signed, unexpired token.
    pub fn validate(&self, token: &str) -> Result<Uuid, TokenError> {
        self.validate_at(token, OffsetDateTime::now_utc())
            .map(|claims| claims.id)
    }

    pub(crate) fn validate_at(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Claims, TokenError> {
        // Check the declared algorithm ourselves before handing the token to
        // the library, so "none" and foreign algorithms are reported as such.
        let alg = declared_algorithm(token)?;
        if alg != "HS256" {
            return Err(TokenError::AlgorithmMismatch(alg));
        }

        let mut validation = Validation::new(ALGORITHM);
        // Expiry is checked below against `now` with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenError::AlgorithmMismatch(alg.clone())
                }
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        if now.unix_timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}

fn declared_algorithm(token: &str) -> Result<String, TokenError> {
    let mut parts = token.split('.');
    let (Some(header), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };
    let raw = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| TokenError::Malformed)?;
    let header: RawHeader = serde_json::from_slice(&raw).map_err(|_| TokenError::Malformed)?;
    Ok(header.alg)
}
