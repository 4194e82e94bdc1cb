use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::ServerConfig,
    error::{AppError, HandlerError},
    middleware::{AuthUser, Authenticator},
    password::verify_password,
    response::respond,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    req: web::Json<LoginRequest>,
    auth: web::Data<Authenticator>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, HandlerError> {
    log::info!("Login attempt for user: {}", req.username);

    let account = config
        .find_account(&req.username)
        .ok_or_else(invalid_credentials)?;

    if !verify_password(&req.password, &account.password_hash)? {
        log::warn!("Failed login attempt for user: {}", req.username);
        return Err(invalid_credentials().into());
    }

    let token = auth.create_token(
        &json!({ "user": account.username }),
        config.auth.token_ttl_minutes,
    )?;

    log::info!("Successful login for user: {}", req.username);

    Ok(respond(StatusCode::OK, "Login successful", json!({ "token": token })))
}

pub async fn protected(user: AuthUser) -> Result<HttpResponse, HandlerError> {
    Ok(respond(
        StatusCode::OK,
        "protected route is working",
        json!({ "tokenData": user.payload() }),
    ))
}

fn invalid_credentials() -> AppError {
    AppError::new("Invalid credentials", StatusCode::UNAUTHORIZED)
}
