use actix_cors::Cors;
use actix_web::{middleware as actix_middleware, web, App, HttpServer};

use gatekit::{
    config::{AccountConfig, ServerConfig},
    error_channel, handlers,
    password::hash_password,
    Authenticator,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if it exists (for development)
    if dotenvy::dotenv().is_err() {
        dotenvy::from_filename("gatekit/.env").ok();
    }

    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting gatekit demo server...");

    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "gatekit/config/gatekit.toml".to_string());

    let mut config = ServerConfig::load_from_file(&config_path)
        .and_then(ServerConfig::apply_env)
        .unwrap_or_else(|e| {
            eprintln!("Failed to load configuration from '{}': {}", config_path, e);
            eprintln!("Hint: Set CONFIG_PATH or run from the workspace root");
            std::process::exit(1);
        });

    if let (Ok(username), Ok(password)) = (
        std::env::var("DEMO_USERNAME"),
        std::env::var("DEMO_PASSWORD"),
    ) {
        match hash_password(&password) {
            Ok(password_hash) => {
                log::info!("Registered demo account '{}'", username);
                config.accounts.push(AccountConfig {
                    username,
                    password_hash,
                });
            }
            Err(err) => log::error!("Failed to hash demo password: {}", err),
        }
    }

    if config.accounts.is_empty() {
        log::warn!("No login accounts configured; /login will reject every attempt");
    }

    let auth = Authenticator::new(&config.auth).unwrap_or_else(|e| {
        eprintln!("Invalid auth configuration: {}", e);
        std::process::exit(1);
    });

    log::info!(
        "Tokens read from '{}' and valid for {} minutes",
        auth.token_field(),
        config.auth.token_ttl_minutes
    );

    let host = config.http.host.clone();
    let port = config.http.port;
    log::info!("Starting HTTP server at {}:{}...", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(auth.clone()))
            .app_data(web::Data::new(config.clone()))
            .configure(handlers::routes(&auth))
            .wrap(Cors::permissive())
            .wrap(actix_middleware::Logger::default())
            // Registered last so it sees every error response.
            .wrap(error_channel())
    })
    .bind((host, port))?
    .run()
    .await
}
