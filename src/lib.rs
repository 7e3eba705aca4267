//! Keyfile: a password-protected file holding one signing keypair.
//!
//! A keyfile stores a single keypair record either in plaintext or encrypted
//! under a password. It provides:
//!
//! - Vault-format encryption for new files and read support for the legacy
//!   Fernet format
//! - Owner-only file permissions and confirmation before overwriting
//! - Unlock passwords from an argument, the environment or a prompt
//! - A password strength policy for new passwords
//!
//! Key material is pluggable through [`crypto::keypair::KeyMaterial`]; the
//! bundled [`crypto::ed25519::Keypair`] uses Ed25519 with SS58 addresses.
//!
//! # Example
//!
//! ```rust,no_run
//! use keyfile::crypto::ed25519::generate_keypair;
//! use keyfile::{KeyStore, Keyfile, Result};
//!
//! fn example() -> Result<()> {
//!     let keyfile: Keyfile = Keyfile::new("~/.keys/default/coldkey");
//!     let keypair = generate_keypair(12)?;
//!
//!     // Prompts for a new password and stores the encrypted record.
//!     keyfile.set_keypair(&keypair, true, false, None)?;
//!
//!     // Reads BT_COLD_PW_DEFAULT, or prompts.
//!     let restored = keyfile.get_keypair(None)?;
//!     assert_eq!(restored.public_bytes(), keypair.public_bytes());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod prompt;
pub mod storage;

// Re-export commonly used types
pub use config::KeyfileConfig;
pub use crypto::keypair::KeyMaterial;
pub use error::{KeyFileError, Result};
pub use storage::keystore::{KeyStore, Keyfile, MockKeyfile};
