use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures of the mnemonic codec and the encrypt/decrypt pipeline.
///
/// Variants never carry secret material: word errors report a position,
/// not the word.
#[derive(Debug, Error)]
pub enum KeyringError {
    #[error("cannot encrypt mnemonic, invalid mnemonic provided")]
    InvalidMnemonic,

    #[error("word #{position} is not in the wordlist")]
    InvalidWord { position: usize },

    #[error("malformed binary mnemonic: {0}")]
    MalformedBinary(&'static str),

    #[error("word index {index} at position {position} is out of range")]
    IndexOutOfRange { position: usize, index: u16 },

    #[error("cannot decrypt mnemonic, invalid mnemonic provided: {0}")]
    InvalidEnvelope(&'static str),

    #[error("cannot decrypt mnemonic: {0}")]
    DecryptionFailed(#[source] BoxedSource),

    #[error("cannot encrypt mnemonic: {0}")]
    EncryptionFailed(#[source] BoxedSource),
}

impl KeyringError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidMnemonic => "invalid_mnemonic",
            Self::InvalidWord { .. } => "invalid_word",
            Self::MalformedBinary(_) => "malformed_binary",
            Self::IndexOutOfRange { .. } => "index_out_of_range",
            Self::InvalidEnvelope(_) => "invalid_envelope",
            Self::DecryptionFailed(_) => "wrong_password",
            Self::EncryptionFailed(_) => "encryption_failed",
        }
    }

    /// Only a failed decrypt (usually a wrong password) is worth re-prompting for.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DecryptionFailed(_))
    }

    /// True when the stored blob itself is unusable, as opposed to bad user input.
    pub const fn is_corrupt_data(&self) -> bool {
        matches!(
            self,
            Self::MalformedBinary(_) | Self::IndexOutOfRange { .. } | Self::InvalidEnvelope(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("no encrypted mnemonic at {}", .0.display())]
    NotFound(PathBuf),

    #[error("an encrypted mnemonic already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("vault busy")]
    Busy,
}

/// A structured error suitable for printing to a front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl ErrorReport {
    pub fn new(code: &str, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code: code.to_owned(),
            message: message.into(),
            retryable,
        }
    }
}

impl From<&KeyringError> for ErrorReport {
    fn from(e: &KeyringError) -> Self {
        if e.is_retryable() {
            return Self::new(e.code(), "wrong password", true);
        }
        if e.is_corrupt_data() {
            return Self::new(e.code(), format!("wallet data is invalid ({e})"), false);
        }
        Self::new(e.code(), e.to_string(), false)
    }
}

impl From<&VaultError> for ErrorReport {
    fn from(e: &VaultError) -> Self {
        match e {
            VaultError::NotFound(_) => Self::new("vault_not_found", e.to_string(), false),
            VaultError::AlreadyExists(_) => Self::new("vault_exists", e.to_string(), false),
            VaultError::Busy => Self::new("vault_busy", "vault busy; retry the operation", true),
        }
    }
}
