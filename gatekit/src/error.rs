use std::fmt;

use actix_web::{
    body::EitherBody,
    dev::ServiceResponse,
    error::ResponseError,
    http::StatusCode,
    middleware::{ErrorHandlerResponse, ErrorHandlers},
    HttpResponse,
};

use crate::response::{enveloped, Envelope, Enveloped};

pub const FALLBACK_MESSAGE: &str = "Internal Server Error";
pub const UNAUTHORISED: &str = "Unauthorised";

/// An intentional failure whose status code was chosen by the code raising it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AppError {
    message: String,
    status: StatusCode,
}

impl AppError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    /// Builds an error from a raw status code, using 500 if `code` is not a valid status.
    pub fn from_code(message: impl Into<String>, code: u16) -> Self {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(message, status)
    }

    pub fn unauthorized() -> Self {
        Self::new(UNAUTHORISED, StatusCode::UNAUTHORIZED)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        error_response(self.status, &self.message)
    }
}

/// Any error raised by a handler, typed or not.
///
/// The status comes from an [`AppError`] found in the error chain, otherwise 500.
pub struct HandlerError(anyhow::Error);

impl HandlerError {
    pub fn app_error(&self) -> Option<&AppError> {
        self.0.downcast_ref::<AppError>()
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }
}

impl<E> From<E> for HandlerError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl ResponseError for HandlerError {
    fn status_code(&self) -> StatusCode {
        self.app_error()
            .map(AppError::status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("handler failed: {:#}", self.0);
        }
        error_response(status, &self.to_string())
    }
}

/// Renders the failure envelope. An empty message becomes [`FALLBACK_MESSAGE`].
pub fn error_response(status: StatusCode, message: &str) -> HttpResponse {
    let message = if message.is_empty() {
        FALLBACK_MESSAGE
    } else {
        message
    };

    enveloped(HttpResponse::build(status).json(Envelope::failure(message)))
}

/// Terminal handler for error responses the channel did not render itself,
/// such as extractor failures and the default 404.
///
/// Register once on the `App`, e.g. `App::new().wrap(error_channel())`.
pub fn error_channel<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new().default_handler(render_envelope)
}

fn render_envelope<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    if already_rendered(&res) {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }

    let status = res.status();
    let message = match res.response().error() {
        Some(err) => err.to_string(),
        None => status.canonical_reason().unwrap_or_default().to_string(),
    };

    if status.is_server_error() {
        log::warn!("unhandled error response ({status}): {message}");
    }

    let (req, _) = res.into_parts();
    let res: ServiceResponse<EitherBody<B>> =
        ServiceResponse::new(req, error_response(status, &message)).map_into_right_body();

    Ok(ErrorHandlerResponse::Response(res))
}

// Responses built by `respond` or `error_response` carry the marker, whatever their status.
fn already_rendered<B>(res: &ServiceResponse<B>) -> bool {
    res.response().extensions().contains::<Enveloped>()
}
