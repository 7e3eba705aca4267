//! Ed25519 key operations.
//!
//! This module provides the default [`KeyMaterial`] implementation: Ed25519
//! keypairs addressed with SS58 (Substrate generic network prefix 42).
//! Mnemonics follow the Substrate convention, where the 32-byte seed is the
//! first half of PBKDF2-HMAC-SHA512 over the BIP-39 entropy.

use crate::crypto::keypair::KeyMaterial;
use crate::error::{KeyFileError, Result};
use bip39::Mnemonic;
use blake2::{Blake2b512, Digest};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use sha2::Sha512;
use std::fmt;
use zeroize::Zeroizing;

/// SS58 network prefix used for addresses (generic Substrate).
pub const SS58_FORMAT: u8 = 42;

/// Length of an Ed25519 seed and public key.
pub const KEY_LENGTH: usize = 32;

const SS58_PREFIX: &[u8] = b"SS58PRE";
const SS58_CHECKSUM_LENGTH: usize = 2;
const MNEMONIC_SEED_ROUNDS: u32 = 2048;

/// An Ed25519 keypair. Keypairs built from an address alone can verify but
/// not sign.
#[derive(Clone)]
pub struct Keypair {
    secret: Option<SigningKey>,
    public: [u8; KEY_LENGTH],
    mnemonic: Option<Zeroizing<String>>,
    ss58_address: String,
}

impl Keypair {
    /// Create a new keypair from a signing key.
    pub fn from_secret(secret: SigningKey) -> Self {
        let public = secret.verifying_key().to_bytes();
        Self {
            secret: Some(secret),
            public,
            mnemonic: None,
            ss58_address: ss58_encode(&public, SS58_FORMAT),
        }
    }

    /// Get the public key as bytes.
    pub fn public_bytes(&self) -> [u8; KEY_LENGTH] {
        self.public
    }

    /// Whether this keypair holds a private seed.
    pub fn can_sign(&self) -> bool {
        self.secret.is_some()
    }

    /// Get the private seed as bytes.
    pub fn secret_seed(&self) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
        self.signing_key().map(|secret| Zeroizing::new(secret.to_bytes()))
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        Ok(self.signing_key()?.sign(message))
    }

    /// Verify a signature.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let public = VerifyingKey::from_bytes(&self.public)
            .map_err(|e| KeyFileError::InvalidKeyError(format!("Invalid public key: {}", e)))?;
        public
            .verify(message, signature)
            .map_err(|e| KeyFileError::InvalidKeyError(format!("Signature verification failed: {}", e)))
    }

    fn signing_key(&self) -> Result<&SigningKey> {
        self.secret.as_ref().ok_or_else(|| {
            KeyFileError::InvalidKeyError(format!(
                "Keypair {} has no private seed",
                self.ss58_address
            ))
        })
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("ss58_address", &self.ss58_address)
            .field("public", &hex::encode(self.public))
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

impl KeyMaterial for Keypair {
    fn from_seed_hex(seed: &str) -> Result<Self> {
        let bytes = Zeroizing::new(decode_hex(seed)?);
        import_ed25519_from_bytes(&bytes)
    }

    fn from_mnemonic(phrase: &str) -> Result<Self> {
        let mnemonic = Mnemonic::parse_normalized(phrase.trim())
            .map_err(|e| KeyFileError::InvalidKeyError(format!("Invalid mnemonic: {}", e)))?;
        let (entropy, len) = mnemonic.to_entropy_array();
        let entropy = Zeroizing::new(entropy);
        let seed = mini_secret_from_entropy(&entropy[..len]);

        let mut keypair = Keypair::from_secret(SigningKey::from_bytes(&seed));
        keypair.mnemonic = Some(Zeroizing::new(mnemonic.to_string()));
        Ok(keypair)
    }

    fn from_address(address: &str) -> Result<Self> {
        let public = ss58_decode(address)?;
        Ok(Self {
            secret: None,
            public,
            mnemonic: None,
            ss58_address: address.to_string(),
        })
    }

    fn address_from_public_key_hex(public_key: &str) -> Result<String> {
        let bytes = decode_hex(public_key)?;
        let public: [u8; KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
            KeyFileError::InvalidKeyError(format!(
                "Expected {} bytes for public key, got {}",
                KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(ss58_encode(&public, SS58_FORMAT))
    }

    fn public_key_hex(&self) -> Option<String> {
        Some(format!("0x{}", hex::encode(self.public)))
    }

    fn seed_hex(&self) -> Option<String> {
        self.secret
            .as_ref()
            .map(|secret| format!("0x{}", hex::encode(secret.to_bytes())))
    }

    fn mnemonic(&self) -> Option<&str> {
        self.mnemonic.as_deref().map(String::as_str)
    }

    fn ss58_address(&self) -> Option<&str> {
        Some(&self.ss58_address)
    }
}

/// Generate a new mnemonic-backed keypair.
///
/// `words` must be a BIP-39 length: 12, 15, 18, 21 or 24.
///
/// # Example
///
/// ```
/// use keyfile::crypto::ed25519::generate_keypair;
/// use keyfile::crypto::keypair::KeyMaterial;
///
/// let keypair = generate_keypair(12).unwrap();
/// assert_eq!(keypair.mnemonic().unwrap().split_whitespace().count(), 12);
/// assert!(keypair.can_sign());
/// ```
pub fn generate_keypair(words: usize) -> Result<Keypair> {
    if !matches!(words, 12 | 15 | 18 | 21 | 24) {
        return Err(KeyFileError::InvalidKeyError(format!(
            "Mnemonic must have 12, 15, 18, 21 or 24 words, got {}",
            words
        )));
    }

    let mut entropy = Zeroizing::new(vec![0u8; words / 3 * 4]);
    rand::thread_rng().fill_bytes(&mut entropy);

    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| KeyFileError::InvalidKeyError(format!("Mnemonic generation failed: {}", e)))?;
    let phrase = Zeroizing::new(mnemonic.to_string());
    Keypair::from_mnemonic(&phrase)
}

/// Import an Ed25519 keypair from a 32-byte seed.
pub fn import_ed25519_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    let seed: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
        KeyFileError::InvalidKeyError(format!(
            "Expected {} bytes for Ed25519 seed, got {}",
            KEY_LENGTH,
            bytes.len()
        ))
    })?;
    let seed = Zeroizing::new(seed);

    Ok(Keypair::from_secret(SigningKey::from_bytes(&seed)))
}

/// Encode a public key as an SS58 address.
///
/// # Example
///
/// ```
/// use keyfile::crypto::ed25519::ss58_encode;
///
/// let public = hex::decode("32939b6abc4d81f02dff04d2b8d1d01cc8e71c5e4c7492e4fa6a238cdca3512f").unwrap();
/// let address = ss58_encode(public.as_slice().try_into().unwrap(), 42);
/// assert_eq!(address, "5DD26kC2kxajmwfbbZmVmxhrY9VeeyR1Gpzy9i8wxLUg6zxm");
/// ```
pub fn ss58_encode(public: &[u8; KEY_LENGTH], format: u8) -> String {
    let mut payload = Vec::with_capacity(1 + KEY_LENGTH + SS58_CHECKSUM_LENGTH);
    payload.push(format);
    payload.extend_from_slice(public);

    let checksum = ss58_checksum(&payload);
    payload.extend_from_slice(&checksum[..SS58_CHECKSUM_LENGTH]);

    bs58::encode(payload).into_string()
}

/// Decode an SS58 address with a single-byte network prefix into its public key.
pub fn ss58_decode(address: &str) -> Result<[u8; KEY_LENGTH]> {
    let data = bs58::decode(address.trim())
        .into_vec()
        .map_err(|e| KeyFileError::InvalidKeyError(format!("Invalid SS58 address: {}", e)))?;

    if data.len() != 1 + KEY_LENGTH + SS58_CHECKSUM_LENGTH || data[0] >= 64 {
        return Err(KeyFileError::InvalidKeyError(format!(
            "Unsupported SS58 address: {}",
            address
        )));
    }

    let (payload, checksum) = data.split_at(1 + KEY_LENGTH);
    if ss58_checksum(payload)[..SS58_CHECKSUM_LENGTH] != *checksum {
        return Err(KeyFileError::InvalidKeyError(format!(
            "Invalid SS58 checksum: {}",
            address
        )));
    }

    let mut public = [0u8; KEY_LENGTH];
    public.copy_from_slice(&payload[1..]);
    Ok(public)
}

fn ss58_checksum(payload: &[u8]) -> Vec<u8> {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_PREFIX);
    hasher.update(payload);
    hasher.finalize().to_vec()
}

/// Substrate mini-secret: PBKDF2-HMAC-SHA512 over the mnemonic entropy with an
/// empty passphrase, truncated to 32 bytes.
fn mini_secret_from_entropy(entropy: &[u8]) -> Zeroizing<[u8; KEY_LENGTH]> {
    let mut output = Zeroizing::new([0u8; 64]);
    pbkdf2::pbkdf2_hmac::<Sha512>(entropy, b"mnemonic", MNEMONIC_SEED_ROUNDS, &mut output[..]);

    let mut seed = Zeroizing::new([0u8; KEY_LENGTH]);
    seed.copy_from_slice(&output[..KEY_LENGTH]);
    seed
}

fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let value = value.trim();
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value).map_err(|e| KeyFileError::InvalidKeyError(format!("Invalid hex string: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_ENTROPY_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_generate_keypair_produces_different_keys() {
        let keypair1 = generate_keypair(12).unwrap();
        let keypair2 = generate_keypair(24).unwrap();

        assert_ne!(keypair1.public_bytes(), keypair2.public_bytes());
        assert_eq!(keypair2.mnemonic().unwrap().split_whitespace().count(), 24);
    }

    #[test]
    fn test_generate_keypair_rejects_bad_word_count() {
        match generate_keypair(13) {
            Err(KeyFileError::InvalidKeyError(msg)) => assert!(msg.contains("13")),
            other => panic!("Expected InvalidKeyError, got {:?}", other),
        }
    }

    #[test]
    fn test_mnemonic_seed_vector() {
        let keypair = Keypair::from_mnemonic(ZERO_ENTROPY_MNEMONIC).unwrap();

        assert_eq!(
            keypair.seed_hex().unwrap(),
            "0x4ed8d4b17698ddeaa1f1559f152f87b5d472f725ca86d341bd0276f1b61197e2"
        );
        assert_eq!(
            keypair.public_key_hex().unwrap(),
            "0x9125f505bdef2cb5825b9931769316d3e2f22150786489a04f39b434ec9fb294"
        );
        assert_eq!(
            keypair.ss58_address().unwrap(),
            "5FM25N8HGtacre9TnWQGRK32d1kUp1Gs6Dd7YiYpSPZLjmj6"
        );
        assert_eq!(keypair.mnemonic().unwrap(), ZERO_ENTROPY_MNEMONIC);
    }

    #[test]
    fn test_invalid_mnemonic() {
        let result = Keypair::from_mnemonic("correct horse battery staple");
        assert!(matches!(result, Err(KeyFileError::InvalidKeyError(_))));
    }

    #[test]
    fn test_seed_hex_vector() {
        let seed: Vec<u8> = (0u8..32).collect();
        let keypair = Keypair::from_seed_hex(&format!("0x{}", hex::encode(&seed))).unwrap();

        assert_eq!(
            keypair.public_key_hex().unwrap(),
            "0x03a107bff3ce10be1d70dd18e74bc09967e4d6309ba50d5f1ddc8664125531b8"
        );
        assert_eq!(
            keypair.ss58_address().unwrap(),
            "5C9TqVEs5Q51zUdjvp6tSsjHAfLseJKq1Dq6ULcuSLqEuRSf"
        );
        assert_eq!(keypair.secret_seed().unwrap().as_slice(), seed.as_slice());

        // The 0x prefix is optional.
        let bare = Keypair::from_seed_hex(&hex::encode(&seed)).unwrap();
        assert_eq!(bare.public_bytes(), keypair.public_bytes());
    }

    #[test]
    fn test_import_from_bytes_invalid_length() {
        match import_ed25519_from_bytes(&[0u8; 16]) {
            Err(KeyFileError::InvalidKeyError(msg)) => assert!(msg.contains("Expected 32 bytes")),
            other => panic!("Expected InvalidKeyError, got {:?}", other),
        }
    }

    #[test]
    fn test_import_from_hex_invalid() {
        let result = Keypair::from_seed_hex("0xnot-valid-hex");
        assert!(matches!(result, Err(KeyFileError::InvalidKeyError(_))));
    }

    #[test]
    fn test_ss58_roundtrip_and_checksum() {
        let address = "5DD26kC2kxajmwfbbZmVmxhrY9VeeyR1Gpzy9i8wxLUg6zxm";
        let public = ss58_decode(address).unwrap();
        assert_eq!(
            hex::encode(public),
            "32939b6abc4d81f02dff04d2b8d1d01cc8e71c5e4c7492e4fa6a238cdca3512f"
        );
        assert_eq!(ss58_encode(&public, SS58_FORMAT), address);

        // Flip the last character to break the checksum.
        let tampered = format!("{}n", &address[..address.len() - 1]);
        assert!(ss58_decode(&tampered).is_err());
    }

    #[test]
    fn test_address_only_keypair_cannot_sign() {
        let keypair = Keypair::from_address("5DD26kC2kxajmwfbbZmVmxhrY9VeeyR1Gpzy9i8wxLUg6zxm").unwrap();

        assert!(!keypair.can_sign());
        assert!(keypair.seed_hex().is_none());
        assert!(keypair.mnemonic().is_none());
        assert_eq!(
            keypair.public_key_hex().unwrap(),
            "0x32939b6abc4d81f02dff04d2b8d1d01cc8e71c5e4c7492e4fa6a238cdca3512f"
        );
        assert!(matches!(keypair.secret_seed(), Err(KeyFileError::InvalidKeyError(_))));
        assert!(matches!(keypair.sign(b"message"), Err(KeyFileError::InvalidKeyError(_))));
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = generate_keypair(12).unwrap();
        let message = b"Hello, world!";

        let signature = keypair.sign(message).unwrap();
        assert!(keypair.verify(message, &signature).is_ok());
        assert!(keypair.verify(b"Goodbye, world!", &signature).is_err());

        // A verify-only copy accepts the same signature.
        let watcher = Keypair::from_address(keypair.ss58_address().unwrap()).unwrap();
        assert!(watcher.verify(message, &signature).is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let keypair = Keypair::from_mnemonic(ZERO_ENTROPY_MNEMONIC).unwrap();
        let debug = format!("{:?}", keypair);

        assert!(!debug.contains("abandon"));
        assert!(!debug.contains("4ed8d4b1"));
        assert!(debug.contains("5FM25N8HGtacre9TnWQGRK32d1kUp1Gs6Dd7YiYpSPZLjmj6"));
    }
}
