//! Key storage module.
//!
//! - [`record`]: the plaintext key record and its JSON codec
//! - [`source`]: non-interactive password sources
//! - [`keystore`]: the keyfile itself and an in-memory stand-in

pub mod keystore;
pub mod record;
pub mod source;
