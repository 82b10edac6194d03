//! Error types for the build, submit and pipeline stages

use thiserror::Error;

use crate::address::AddressError;

/// Reasons the builder refuses to produce an unsigned transaction.
/// All of them are caller-correctable; none is retried.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    /// Required request field absent
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown variant: {0}")]
    UnknownVariant(String),

    #[error("Invalid address {address}: {source}")]
    InvalidAddress {
        address: String,
        source: AddressError,
    },

    #[error("Invalid lovelace amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid UTxO: {0}")]
    InvalidUtxo(String),

    #[error("Insufficient funds: required {required} lovelace, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    /// Catch-all from transaction construction
    #[error("Failed to build transaction: {0}")]
    BuildFailed(String),
}

impl BuildError {
    pub(crate) fn invalid_address(address: &str, source: AddressError) -> Self {
        BuildError::InvalidAddress {
            address: address.to_string(),
            source,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Missing signed transaction")]
    MissingSignedTx,

    #[error("Malformed signed transaction: {0}")]
    MalformedSignedTx(String),

    /// The ledger or provider refused the transaction. The message is the
    /// provider's own.
    #[error("{0}")]
    SubmissionRejected(String),

    #[error("Network failure: {0}")]
    NetworkFailure(String),
}

/// Failures surfaced by the orchestrator. Each one ends the pipeline in the
/// error state with `to_string()` as the displayed message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Please connect your wallet first")]
    WalletNotConnected,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown variant: {0}")]
    UnknownVariant(String),

    /// Builder rejected the request; carries the server's message.
    #[error("{0}")]
    Build(String),

    #[error("Transaction signing declined")]
    SigningDeclined,

    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Submission endpoint rejected the signed transaction.
    #[error("{0}")]
    Submission(String),

    #[error("Network failure: {0}")]
    NetworkFailure(String),
}

/// Failures reported by a wallet agent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The user dismissed or refused the approval prompt.
    #[error("user declined")]
    Declined,

    #[error("{0}")]
    Failed(String),
}

impl From<WalletError> for PipelineError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::Declined => PipelineError::SigningDeclined,
            WalletError::Failed(message) => PipelineError::Wallet(message),
        }
    }
}

impl From<BuildError> for PipelineError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::MissingField(field) => PipelineError::MissingField(field),
            BuildError::UnknownVariant(id) => PipelineError::UnknownVariant(id),
            other => PipelineError::Build(other.to_string()),
        }
    }
}

impl From<SubmitError> for PipelineError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::NetworkFailure(message) => PipelineError::NetworkFailure(message),
            other => PipelineError::Submission(other.to_string()),
        }
    }
}
