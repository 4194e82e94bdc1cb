use crate::error::AppError;

pub use bcrypt::DEFAULT_COST;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash_password_with_cost(password, DEFAULT_COST)
}

pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AppError> {
    bcrypt::hash(password, cost)
        .map_err(|err| AppError::internal(format!("Password hashing error: {err}")))
}

/// Checks `password` against a bcrypt hash. A malformed hash is an error, not a mismatch.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    bcrypt::verify(password, hash)
        .map_err(|err| AppError::internal(format!("Password hashing error: {err}")))
}
