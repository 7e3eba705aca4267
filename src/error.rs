//! Error types for the keyfile library.
//!
//! Every failure surfaces as a [`KeyFileError`]. The variant is the cause tag:
//! callers match on it to tell a missing file from a wrong password from a
//! corrupt record.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for keyfile operations.
#[derive(Error, Debug)]
pub enum KeyFileError {
    /// The operation needs an existing keyfile and there is none.
    #[error("Keyfile at: {} does not exist", .0.display())]
    NotFoundError(PathBuf),

    /// The keyfile exists but cannot be read by this process.
    #[error("Keyfile at: {} is not readable", .0.display())]
    NotReadableError(PathBuf),

    /// The keyfile exists but cannot be written by this process.
    #[error("Keyfile at: {} is not writable", .0.display())]
    NotWritableError(PathBuf),

    /// The user declined to overwrite an existing keyfile.
    #[error("Keyfile at: {} already exists and overwrite was declined", .0.display())]
    OverwriteDeniedError(PathBuf),

    /// Authentication failed while decrypting: wrong password or tampered data.
    #[error("Invalid password")]
    InvalidPasswordError,

    /// The bytes match no known format or do not hold a usable key record.
    #[error("Keyfile data is corrupt: {0}")]
    CorruptRecordError(String),

    /// Key material could not be built or does not support the request.
    #[error("Invalid key: {0}")]
    InvalidKeyError(String),

    /// Reading an interactive prompt failed.
    #[error("Prompt error: {0}")]
    PromptError(#[source] std::io::Error),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// The keystore variant does not support this operation.
    #[error("Unsupported operation: {0}")]
    UnsupportedError(String),

    /// Storage I/O error
    #[error("Storage I/O error: {0}")]
    StorageError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for keyfile operations.
pub type Result<T> = std::result::Result<T, KeyFileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KeyFileError::NotFoundError(PathBuf::from("/tmp/wallet/coldkey"));
        assert_eq!(err.to_string(), "Keyfile at: /tmp/wallet/coldkey does not exist");

        let err = KeyFileError::InvalidPasswordError;
        assert_eq!(err.to_string(), "Invalid password");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<KeyFileError>();
    }

    #[test]
    fn test_io_error_converts() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"))?;
            Ok(())
        }

        match fails() {
            Err(KeyFileError::StorageError(e)) => assert_eq!(e.to_string(), "disk on fire"),
            other => panic!("Expected StorageError, got {:?}", other),
        }
    }

    #[test]
    fn test_json_error_converts() {
        fn fails() -> Result<u32> {
            Ok(serde_json::from_str("\"not a number\"")?)
        }

        match fails() {
            Err(KeyFileError::JsonError(_)) => {}
            other => panic!("Expected JsonError, got {:?}", other),
        }
    }
}
