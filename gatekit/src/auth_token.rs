use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Application data carried inside a token.
pub type IdentityPayload = Map<String, Value>;

const ALGORITHM: Algorithm = Algorithm::HS256;
const SECONDS_PER_MINUTE: u64 = 60;

const ISSUED_AT_CLAIM: &str = "iat";
const EXPIRES_AT_CLAIM: &str = "exp";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signing secret must not be empty")]
    EmptySecret,

    #[error("failed to sign token: {0}")]
    Signing(String),

    // Invalid and Expired share a message so callers cannot tell them apart.
    #[error("token is invalid or expired")]
    Invalid,

    #[error("token is invalid or expired")]
    Expired,
}

impl TokenError {
    /// True for the verification failures that mean "not authenticated".
    pub fn is_rejection(&self) -> bool {
        matches!(self, TokenError::Invalid | TokenError::Expired)
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            kind => {
                log::debug!("token rejected: {kind:?}");
                TokenError::Invalid
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    iat: u64,
    exp: u64,
    #[serde(flatten)]
    payload: IdentityPayload,
}

/// Creates and verifies HS256 signed tokens bound to one secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        // Expiry is checked against a caller-supplied clock in `verify_token_at`.
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_aud = false;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        })
    }

    pub fn create_token<P>(&self, payload: &P, validity_minutes: u64) -> Result<String, TokenError>
    where
        P: Serialize + ?Sized,
    {
        self.create_token_at(payload, validity_minutes, now_secs())
    }

    /// Signs `payload` as if it were issued at `issued_at_secs`.
    ///
    /// The payload must serialize to a JSON object that does not already use
    /// the `iat` or `exp` claim names.
    pub fn create_token_at<P>(
        &self,
        payload: &P,
        validity_minutes: u64,
        issued_at_secs: u64,
    ) -> Result<String, TokenError>
    where
        P: Serialize + ?Sized,
    {
        let payload = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(TokenError::Signing(
                    "payload must serialize to a JSON object".to_string(),
                ))
            }
            Err(err) => return Err(TokenError::Signing(err.to_string())),
        };

        for reserved in [ISSUED_AT_CLAIM, EXPIRES_AT_CLAIM] {
            if payload.contains_key(reserved) {
                return Err(TokenError::Signing(format!(
                    "payload already has a \"{reserved}\" claim"
                )));
            }
        }

        let expires_at_secs =
            issued_at_secs.saturating_add(validity_minutes.saturating_mul(SECONDS_PER_MINUTE));
        let claims = TokenClaims {
            iat: issued_at_secs,
            exp: expires_at_secs,
            payload,
        };

        encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    pub fn verify_token(&self, token: &str) -> Result<IdentityPayload, TokenError> {
        self.verify_token_at(token, now_secs())
    }

    /// Verifies `token` against the clock reading `now_secs`.
    pub fn verify_token_at(&self, token: &str, now_secs: u64) -> Result<IdentityPayload, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding, &self.validation)?.claims;
        if now_secs >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims.payload)
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
