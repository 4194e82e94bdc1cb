use actix_web::{http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Uniform JSON body shared by success and error responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T = Value> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

impl Envelope<Value> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: json!({}),
        }
    }
}

/// Response extension set on every response whose body is already an [`Envelope`].
#[derive(Debug, Clone, Copy)]
pub struct Enveloped;

/// Builds a success response with the given status, message and data.
///
/// The status is never inspected, so a 4xx built here still reports `success: true`.
pub fn respond<T: Serialize>(status: StatusCode, message: impl Into<String>, data: T) -> HttpResponse {
    enveloped(HttpResponse::build(status).json(Envelope::success(message, data)))
}

pub(crate) fn enveloped(mut res: HttpResponse) -> HttpResponse {
    res.extensions_mut().insert(Enveloped);
    res
}
