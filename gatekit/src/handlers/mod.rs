pub mod auth;
pub mod health;

use actix_web::web;

use crate::adapter::guard;
use crate::middleware::Authenticator;

pub use auth::{login, protected, LoginRequest};
pub use health::{health_check, testing_error};

/// Registers the demo routes. `Authenticator` and `ServerConfig` must be in app data.
pub fn routes(auth: &Authenticator) -> impl FnOnce(&mut web::ServiceConfig) {
    let auth = auth.clone();
    let token_path = format!("/protected/{{{}}}", auth.token_field());

    move |cfg: &mut web::ServiceConfig| {
        cfg.service(web::resource("/").route(web::get().to(guard(health_check))))
            .service(web::resource("/login").route(web::post().to(guard(login))))
            .service(web::resource("/error").route(web::get().to(guard(testing_error))))
            .service(
                web::resource("/protected")
                    .wrap(auth.middleware())
                    .route(web::get().to(guard(protected))),
            )
            .service(
                web::resource(token_path)
                    .wrap(auth.middleware())
                    .route(web::get().to(guard(protected))),
            );
    }
}
