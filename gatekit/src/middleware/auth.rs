use std::rc::Rc;
use std::sync::Arc;

use actix_http::BoxedPayloadStream;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::CONTENT_TYPE,
    web, Error, FromRequest, HttpMessage, HttpRequest,
};
use futures_util::{
    future::{ready, LocalBoxFuture, Ready},
    stream, StreamExt,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::auth_token::{IdentityPayload, TokenCodec, TokenError};
use crate::config::{AuthConfig, ConfigError};
use crate::error::AppError;

use super::credentials::{locate_credential, locate_in, Credential, Location, RequestCredentials};

/// Identity recovered from a verified token, scoped to one request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser(IdentityPayload);

impl AuthUser {
    pub fn new(payload: IdentityPayload) -> Self {
        Self(payload)
    }

    pub fn payload(&self) -> &IdentityPayload {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_inner(self) -> IdentityPayload {
        self.0
    }

    /// Deserializes the payload into a typed claims struct.
    ///
    /// A payload that does not fit `T` is treated like a missing identity.
    pub fn claims<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|err| {
            log::debug!("token payload does not match expected claims: {err}");
            AppError::unauthorized()
        })
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(AppError::unauthorized),
        )
    }
}

struct AuthInner {
    codec: TokenCodec,
    token_field: String,
}

/// Token issuer and request gate sharing one secret and credential field name.
#[derive(Clone)]
pub struct Authenticator {
    inner: Arc<AuthInner>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("token_field", &self.inner.token_field)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(config: &AuthConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let codec = TokenCodec::new(config.secret.as_bytes())?;
        Ok(Self {
            inner: Arc::new(AuthInner {
                codec,
                token_field: config.token_field.clone(),
            }),
        })
    }

    pub fn token_field(&self) -> &str {
        &self.inner.token_field
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.inner.codec
    }

    pub fn create_token<P>(&self, payload: &P, validity_minutes: u64) -> Result<String, TokenError>
    where
        P: Serialize + ?Sized,
    {
        self.inner.codec.create_token(payload, validity_minutes)
    }

    pub fn verify_token(&self, token: &str) -> Result<IdentityPayload, TokenError> {
        self.inner.codec.verify_token(token)
    }

    /// Middleware that admits only requests carrying a valid token.
    pub fn middleware(&self) -> RequireAuth {
        RequireAuth { auth: self.clone() }
    }

    /// Runs locate and verify for one request.
    ///
    /// Every rejection is reported as `AppError("Unauthorised", 401)`.
    pub async fn authenticate(&self, req: &mut ServiceRequest) -> Result<AuthUser, AppError> {
        let Some(credential) = self.locate(req).await else {
            log::debug!("no credential on {} {}", req.method(), req.path());
            return Err(AppError::unauthorized());
        };

        match self.inner.codec.verify_token(&credential.token) {
            Ok(payload) => {
                log::debug!(
                    "authenticated {} {} via {}",
                    req.method(),
                    req.path(),
                    credential.location.as_str()
                );
                Ok(AuthUser(payload))
            }
            Err(err) => {
                log::debug!(
                    "rejected {} credential on {}: {:?}",
                    credential.location.as_str(),
                    req.path(),
                    err
                );
                Err(AppError::unauthorized())
            }
        }
    }

    async fn locate(&self, req: &mut ServiceRequest) -> Option<Credential> {
        let field = self.token_field();

        let from_headers = locate_in(
            &RequestCredentials::new(req.request(), None),
            field,
            &Location::HEADERS,
        );
        if from_headers.is_some() {
            return from_headers;
        }

        let body = buffer_json_body(req).await;
        locate_credential(&RequestCredentials::new(req.request(), body.as_ref()), field)
    }
}

/// Most bytes read from a request body while looking for a credential.
pub const BODY_SCAN_LIMIT: usize = 256 * 1024;

/// Reads a JSON object body and puts the bytes back for downstream extractors.
///
/// A body that is larger than [`BODY_SCAN_LIMIT`] or fails to arrive counts as
/// absent. Whatever was read is replayed in front of the rest of the stream.
async fn buffer_json_body(req: &mut ServiceRequest) -> Option<Map<String, Value>> {
    if !is_json(req) {
        return None;
    }

    let mut payload = req.take_payload();
    let mut buffered = web::BytesMut::new();
    let mut pending = None;

    while let Some(chunk) = payload.next().await {
        match chunk {
            Ok(chunk) if buffered.len() + chunk.len() <= BODY_SCAN_LIMIT => {
                buffered.extend_from_slice(&chunk)
            }
            other => {
                pending = Some(other);
                break;
            }
        }
    }

    let bytes = buffered.freeze();

    let Some(pending) = pending else {
        let body = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        };
        req.set_payload(bytes_to_payload(bytes));
        return body;
    };

    match &pending {
        Ok(_) => log::debug!("body on {} too large to scan for a credential", req.path()),
        Err(err) => log::debug!("body on {} unreadable: {err}", req.path()),
    }

    let replay: BoxedPayloadStream = Box::pin(stream::iter([Ok(bytes), pending]).chain(payload));
    req.set_payload(Payload::Stream { payload: replay });
    None
}

fn is_json(req: &ServiceRequest) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

fn bytes_to_payload(bytes: web::Bytes) -> Payload {
    let (_, mut payload) = actix_http::h1::Payload::create(true);
    payload.unread_data(bytes);
    Payload::from(payload)
}

/// `Transform` produced by [`Authenticator::middleware`].
#[derive(Clone)]
pub struct RequireAuth {
    auth: Authenticator,
}

impl<S, B> Transform<S, ServiceRequest> for RequireAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireAuthMiddleware {
            service: Rc::new(service),
            auth: self.auth.clone(),
        }))
    }
}

pub struct RequireAuthMiddleware<S> {
    service: Rc<S>,
    auth: Authenticator,
}

impl<S, B> Service<ServiceRequest> for RequireAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let auth = self.auth.clone();

        Box::pin(async move {
            match auth.authenticate(&mut req).await {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(err) => Ok(req.error_response(err).map_into_right_body()),
            }
        })
    }
}
