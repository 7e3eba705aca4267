//! The key material capability stored by a keyfile.
//!
//! The keyfile never generates keys or derives addresses itself. It only needs
//! to read the public parts of a keypair and to rebuild one from whatever a
//! record holds, so any signature scheme can be stored by implementing
//! [`KeyMaterial`].

use crate::error::Result;

/// A cryptographic identity: public key, optional private seed or mnemonic,
/// and the derived human-readable address.
///
/// At least one of seed, mnemonic or address must be present for a record to
/// be reconstructable. A public key alone is not enough.
pub trait KeyMaterial: Clone {
    /// Rebuild a signing keypair from a hex seed, with or without `0x`.
    fn from_seed_hex(seed: &str) -> Result<Self>;

    /// Rebuild a signing keypair from a mnemonic phrase.
    fn from_mnemonic(phrase: &str) -> Result<Self>;

    /// Build a verify-only keypair from an encoded address.
    fn from_address(address: &str) -> Result<Self>;

    /// Encode a `0x`-prefixed hex public key as an address.
    fn address_from_public_key_hex(public_key: &str) -> Result<String>;

    /// The public key as `0x`-prefixed hex.
    fn public_key_hex(&self) -> Option<String>;

    /// The private seed as `0x`-prefixed hex, if this keypair can sign.
    fn seed_hex(&self) -> Option<String>;

    /// The mnemonic phrase the keypair was created from, if known.
    fn mnemonic(&self) -> Option<&str>;

    /// The encoded address.
    fn ss58_address(&self) -> Option<&str>;
}
