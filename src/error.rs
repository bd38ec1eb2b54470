//! Error types for the batch minter

use thiserror::Error;

/// Main error type for the minter
#[derive(Error, Debug)]
pub enum MinterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain connection error: {0}")]
    Connection(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Record source error: {0}")]
    RecordSource(String),

    #[error("Nonce seed query failed: {0}")]
    NonceSeed(String),

    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Malformed record: {0}")]
    InvalidRecord(String),

    #[error("Transaction build error: {0}")]
    Build(String),

    #[error("Signing error: {0}")]
    Sign(String),

    #[error("Submission error: {0}")]
    Submission(String),

    #[error("Receipt retrieval error: {0}")]
    Receipt(String),
}

impl MinterError {
    /// Check if the error invalidates shared state and must abort the run.
    ///
    /// Everything else is scoped to a single mint request and the batch
    /// continues past it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MinterError::Config(_)
                | MinterError::Connection(_)
                | MinterError::Wallet(_)
                | MinterError::RecordSource(_)
                | MinterError::NonceSeed(_)
        )
    }
}

/// Result type for minter operations
pub type MinterResult<T> = Result<T, MinterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_errors_are_fatal() {
        assert!(MinterError::Config("missing".into()).is_fatal());
        assert!(MinterError::NonceSeed("node down".into()).is_fatal());
        assert!(!MinterError::InvalidRecipient("0x00".into()).is_fatal());
        assert!(!MinterError::Submission("rejected".into()).is_fatal());
    }
}
