//! Token authentication, a JSON response envelope and a single error channel
//! for actix-web applications.

pub mod adapter;
pub mod auth_token;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod password;
pub mod response;

pub use adapter::guard;
pub use auth_token::{IdentityPayload, TokenCodec, TokenError};
pub use error::{error_channel, AppError, HandlerError};
pub use middleware::{AuthUser, Authenticator, RequireAuth};
pub use response::{respond, Envelope};
