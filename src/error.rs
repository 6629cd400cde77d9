use thiserror::Error;

/// Errors raised before a simulation or sweep starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VicsekError {
    /// A configuration value falls outside its allowed range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// No seed was supplied and the OS entropy source could not provide one.
    #[error("entropy source unavailable: {0}")]
    Entropy(String),
}

pub(crate) fn ensure(condition: bool, message: &'static str) -> Result<(), VicsekError> {
    if condition {
        Ok(())
    } else {
        Err(VicsekError::InvalidParameter(message))
    }
}
