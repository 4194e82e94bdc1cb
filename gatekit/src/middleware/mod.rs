pub mod auth;
pub mod credentials;

pub use auth::{AuthUser, Authenticator, RequireAuth};
pub use credentials::{locate_credential, Credential, CredentialSource, Location};
