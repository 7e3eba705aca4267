//! Keyfile format detection and password-based encryption.
//!
//! Every keyfile is one of three formats, told apart purely by its leading
//! bytes:
//!
//! - [`KeyfileFormat::Vault`] starts with [`VAULT_MAGIC`] and is what this
//!   crate writes.
//! - [`KeyfileFormat::Legacy`] starts with [`LEGACY_MAGIC`] and is only read.
//! - [`KeyfileFormat::Plaintext`] is anything else.

use crate::crypto::legacy::{self, LEGACY_MAGIC};
use crate::crypto::vault::{self, VAULT_MAGIC};
use crate::error::{KeyFileError, Result};
use std::fmt;
use tracing::debug;

/// The on-disk format of keyfile bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyfileFormat {
    /// Ansible Vault envelope.
    Vault,
    /// Fernet token under the fixed-salt PBKDF2 key.
    Legacy,
    /// Unencrypted key record.
    Plaintext,
}

impl KeyfileFormat {
    /// Classify `data` by prefix. The vault marker is checked first.
    ///
    /// # Example
    ///
    /// ```
    /// use keyfile::crypto::encryption::KeyfileFormat;
    ///
    /// assert_eq!(KeyfileFormat::classify(b"$ANSIBLE_VAULT;1.1;AES256\n"), KeyfileFormat::Vault);
    /// assert_eq!(KeyfileFormat::classify(b"gAAAAABq1R2L"), KeyfileFormat::Legacy);
    /// assert_eq!(KeyfileFormat::classify(b"{\"secretSeed\": null}"), KeyfileFormat::Plaintext);
    /// ```
    pub fn classify(data: &[u8]) -> Self {
        if data.starts_with(VAULT_MAGIC) {
            KeyfileFormat::Vault
        } else if data.starts_with(LEGACY_MAGIC) {
            KeyfileFormat::Legacy
        } else {
            KeyfileFormat::Plaintext
        }
    }

    /// Whether this format needs a password to read.
    pub fn is_encrypted(self) -> bool {
        !matches!(self, KeyfileFormat::Plaintext)
    }
}

impl fmt::Display for KeyfileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyfileFormat::Vault => "vault",
            KeyfileFormat::Legacy => "legacy",
            KeyfileFormat::Plaintext => "plaintext",
        };
        f.write_str(name)
    }
}

/// Whether `data` is in an encrypted format.
pub fn keyfile_data_is_encrypted(data: &[u8]) -> bool {
    KeyfileFormat::classify(data).is_encrypted()
}

/// Encrypt keyfile data. The output is always in the vault format.
pub fn encrypt_keyfile_data(data: &[u8], password: &str) -> Result<Vec<u8>> {
    debug!("encrypting keyfile data");
    vault::seal(data, password)
}

/// Decrypt keyfile data in either encrypted format.
///
/// Plaintext input has no decryption path and fails with
/// [`KeyFileError::CorruptRecordError`].
///
/// # Example
///
/// ```
/// use keyfile::crypto::encryption::{decrypt_keyfile_data, encrypt_keyfile_data};
///
/// let sealed = encrypt_keyfile_data(b"record", "Tr0ub4dor&3").unwrap();
/// assert_eq!(decrypt_keyfile_data(&sealed, "Tr0ub4dor&3").unwrap(), b"record");
/// ```
pub fn decrypt_keyfile_data(data: &[u8], password: &str) -> Result<Vec<u8>> {
    let format = KeyfileFormat::classify(data);
    debug!(%format, "decrypting keyfile data");

    match format {
        KeyfileFormat::Vault => vault::open(data, password),
        KeyfileFormat::Legacy => legacy::open(data, password),
        KeyfileFormat::Plaintext => Err(KeyFileError::CorruptRecordError(
            "keyfile data is not in a known encrypted format".to_string(),
        )),
    }
}
