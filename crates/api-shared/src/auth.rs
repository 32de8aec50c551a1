//! API key checking.
//!
//! The expected key is resolved once at startup and passed in; nothing here reads the
//! environment.

/// Validates `provided_key` against `expected_key`.
///
/// # Errors
///
/// Returns `Status::internal` if no key is configured, or `Status::unauthenticated` if the keys
/// differ.
#[allow(clippy::result_large_err)]
pub fn validate_api_key(provided_key: &str, expected_key: &str) -> Result<(), tonic::Status> {
    if expected_key.is_empty() {
        return Err(tonic::Status::internal("API key is not configured"));
    }

    if provided_key == expected_key {
        Ok(())
    } else {
        Err(tonic::Status::unauthenticated("Invalid API key"))
    }
}
