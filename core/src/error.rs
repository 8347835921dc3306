//! Error types for MONFUNDME

use thiserror::Error;

/// Main error type for MONFUNDME
#[derive(Error, Debug)]
pub enum MonfundmeError {
    // ============ Authorization Errors ============
    #[error("Unauthorized caller: {0}")]
    Unauthorized(String),

    // ============ Validator Registry Errors ============
    #[error("Validator already registered: {0}")]
    DuplicateValidator(String),

    #[error("Unknown validator: {0}")]
    UnknownValidator(String),

    // ============ Cryptography Errors ============
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid signature count: {valid} valid, {required} required")]
    InvalidSignatureCount { valid: usize, required: usize },

    // ============ Proposal Errors ============
    #[error("Proposal already exists: {0}")]
    DuplicateProposal(String),

    #[error("Invalid voting window: start {start} must be before end {end}")]
    InvalidWindow { start: u64, end: u64 },

    #[error("Proposal not found: {0}")]
    ProposalNotFound(String),

    #[error("Proposal already executed or expired: {0}")]
    ProposalAlreadyExecuted(String),

    #[error("Voting has not started: opens at {start}, now {now}")]
    VotingNotStarted { start: u64, now: u64 },

    // ============ Campaign Errors ============
    #[error("Campaign target must be greater than zero")]
    InvalidTarget,

    #[error("Campaign deadline {deadline} is not in the future (now {now})")]
    InvalidDeadline { deadline: u64, now: u64 },

    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("Campaign expired at {deadline}")]
    CampaignExpired { deadline: u64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount overflow")]
    AmountOverflow,

    #[error("Funds already withdrawn")]
    AlreadyWithdrawn,

    #[error("Withdrawal not yet allowed: deadline {deadline} not reached and target not met")]
    WithdrawalNotYetAllowed { deadline: u64 },

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    // ============ Ledger Errors ============
    #[error("Ledger already initialized")]
    AlreadyInitialized,

    #[error("Ledger not initialized: {0}")]
    NotInitialized(String),

    // ============ State Errors ============
    #[error("State corruption detected: {0}")]
    StateCorruption(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization failed: {0}")]
    SerializationError(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(String),

    // ============ Configuration Errors ============
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    // ============ General Errors ============
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for MonfundmeError {
    fn from(err: std::io::Error) -> Self {
        MonfundmeError::StorageError(err.to_string())
    }
}

impl From<bincode::Error> for MonfundmeError {
    fn from(err: bincode::Error) -> Self {
        MonfundmeError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for MonfundmeError {
    fn from(err: serde_json::Error) -> Self {
        MonfundmeError::SerializationError(err.to_string())
    }
}
