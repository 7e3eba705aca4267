//! Cryptographic operations module.
//!
//! - [`keypair`]: the key material capability a keyfile stores
//! - [`ed25519`]: the bundled Ed25519/SS58 key material
//! - [`password`]: password strength policy
//! - [`encryption`]: format detection and dispatch over [`vault`] and [`legacy`]
//!
//! # Example
//!
//! ```rust
//! use keyfile::crypto::ed25519::generate_keypair;
//! use keyfile::crypto::encryption::{decrypt_keyfile_data, encrypt_keyfile_data};
//! use keyfile::crypto::keypair::KeyMaterial;
//!
//! # fn example() -> keyfile::error::Result<()> {
//! let keypair = generate_keypair(12)?;
//! let seed = keypair.seed_hex().unwrap_or_default();
//!
//! let sealed = encrypt_keyfile_data(seed.as_bytes(), "secure-password")?;
//! let opened = decrypt_keyfile_data(&sealed, "secure-password")?;
//! assert_eq!(seed.as_bytes(), opened.as_slice());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod ed25519;
pub mod encryption;
pub mod keypair;
pub mod legacy;
pub mod password;
pub mod vault;
