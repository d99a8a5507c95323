use thiserror::Error;

/// Errors that cross the engine boundary. Provider failures and missing data are
/// absorbed inside the engine and never surface here directly.
#[derive(Error, Debug)]
pub enum RecapError {
    #[error("missing provider credential: {0}")]
    MissingCredential(&'static str),

    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Unable to fetch transaction data. Please try again later.")]
    Unavailable,
}

impl RecapError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential(_) => "configuration",
            Self::InvalidAddress(_) => "invalid_address",
            Self::Unavailable => "unavailable",
        }
    }
}
