use actix_web::{http::StatusCode, HttpResponse};
use serde_json::json;

use crate::error::{AppError, HandlerError};
use crate::response::respond;

pub async fn health_check() -> Result<HttpResponse, HandlerError> {
    Ok(respond(StatusCode::OK, "server is running", json!({})))
}

/// Always fails with a typed 400 so the error channel can be seen at work.
pub async fn testing_error() -> Result<HttpResponse, AppError> {
    Err(AppError::bad_request("This is testing error"))
}
