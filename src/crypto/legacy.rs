//! Legacy format: Fernet tokens under a fixed-salt PBKDF2 key.
//!
//! Keyfiles written by older tooling are a single Fernet token. The token key
//! is the URL-safe base64 of PBKDF2-HMAC-SHA256 over the password with a
//! fixed salt and 10 000 000 rounds. This format is only ever read; writes
//! always use the vault format.

use crate::error::{KeyFileError, Result};
use aes::Aes128;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

/// Leading bytes of every legacy keyfile (base64 of the Fernet version byte
/// followed by the high bytes of the timestamp).
pub const LEGACY_MAGIC: &[u8] = b"gAAAAA";

/// Fixed salt of the legacy key derivation.
pub const LEGACY_SALT: &[u8] = b"Iguesscyborgslikemyselfhaveatendencytobeparanoidaboutourorigins";

/// PBKDF2 rounds of the legacy key derivation.
pub const LEGACY_ITERATIONS: u32 = 10_000_000;

const FERNET_VERSION: u8 = 0x80;
const TIMESTAMP_LENGTH: usize = 8;
const IV_LENGTH: usize = 16;
const HMAC_LENGTH: usize = 32;
const BLOCK_SIZE: usize = 16;
const FERNET_KEY_LENGTH: usize = 32;

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Derive the base64 Fernet key for `password`. Takes seconds.
pub fn derive_legacy_key(password: &str) -> Zeroizing<String> {
    let mut key = Zeroizing::new([0u8; FERNET_KEY_LENGTH]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), LEGACY_SALT, LEGACY_ITERATIONS, &mut key[..]);
    Zeroizing::new(URL_SAFE.encode(&key[..]))
}

/// Decrypt a legacy keyfile with `password`.
pub fn open(token: &[u8], password: &str) -> Result<Vec<u8>> {
    debug!("deriving legacy keyfile key");
    let key = derive_legacy_key(password);
    fernet_decrypt(token, &key)
}

/// Decrypt a Fernet token with a base64 key. Token age is not checked.
///
/// Every failure, including a malformed token, reports
/// [`KeyFileError::InvalidPasswordError`]: a token that fails to verify is
/// indistinguishable from one sealed under another key.
pub fn fernet_decrypt(token: &[u8], key: &str) -> Result<Vec<u8>> {
    let key = Zeroizing::new(
        URL_SAFE
            .decode(key.trim())
            .map_err(|e| KeyFileError::InvalidKeyError(format!("Invalid Fernet key: {}", e)))?,
    );
    if key.len() != FERNET_KEY_LENGTH {
        return Err(KeyFileError::InvalidKeyError(format!(
            "Fernet key must be {} bytes, got {}",
            FERNET_KEY_LENGTH,
            key.len()
        )));
    }
    let (signing_key, encryption_key) = key.split_at(FERNET_KEY_LENGTH / 2);

    let token: Vec<u8> = token.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    let data = URL_SAFE
        .decode(&token)
        .map_err(|_| KeyFileError::InvalidPasswordError)?;

    let header = 1 + TIMESTAMP_LENGTH + IV_LENGTH;
    if data.len() < header + HMAC_LENGTH
        || data[0] != FERNET_VERSION
        || (data.len() - header - HMAC_LENGTH) % BLOCK_SIZE != 0
    {
        return Err(KeyFileError::InvalidPasswordError);
    }

    let (signed, tag) = data.split_at(data.len() - HMAC_LENGTH);
    let mut mac = <HmacSha256 as Mac>::new_from_slice(signing_key)
        .map_err(|e| KeyFileError::InvalidKeyError(format!("Invalid Fernet key: {}", e)))?;
    mac.update(signed);
    mac.verify_slice(tag)
        .map_err(|_| KeyFileError::InvalidPasswordError)?;

    let iv = &signed[1 + TIMESTAMP_LENGTH..header];
    let mut buffer = signed[header..].to_vec();
    let plaintext = Aes128CbcDec::new_from_slices(encryption_key, iv)
        .map_err(|e| KeyFileError::InvalidKeyError(format!("Invalid Fernet key: {}", e)))?
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| KeyFileError::InvalidPasswordError)?;

    Ok(plaintext.to_vec())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cbc::cipher::BlockEncryptMut;

    const LEGACY_PASSWORD: &str = "fakepasssword238947239";
    const LEGACY_KEY: &str = "Jj4xodYQwIh8qsRV7JRVtqKxvA40Aoc5LhkJgAtbE7s=";
    const LEGACY_TOKEN: &[u8] =
        b"gAAAAABq1R2LXf_wIF_oGBqzcfntzsy0BEHlkA7NywKo2H5hQZ4queylRgB_uDwBpJ9bvgm5xdbQuwDWq6svri_K1ANXwh-DSA==";

    /// Seal a Fernet token with a fixed timestamp and IV.
    pub(crate) fn fernet_encrypt(plaintext: &[u8], key: &str, iv: [u8; IV_LENGTH]) -> Vec<u8> {
        let key = URL_SAFE.decode(key).unwrap();
        let (signing_key, encryption_key) = key.split_at(FERNET_KEY_LENGTH / 2);

        let mut buffer = vec![0u8; plaintext.len() + BLOCK_SIZE];
        buffer[..plaintext.len()].copy_from_slice(plaintext);
        let ciphertext = cbc::Encryptor::<Aes128>::new_from_slices(encryption_key, &iv)
            .unwrap()
            .encrypt_padded_mut::<Pkcs7>(&mut buffer, plaintext.len())
            .unwrap()
            .to_vec();

        let mut data = vec![FERNET_VERSION];
        data.extend_from_slice(&0x6000_0000u64.to_be_bytes());
        data.extend_from_slice(&iv);
        data.extend_from_slice(&ciphertext);

        let mut mac = <HmacSha256 as Mac>::new_from_slice(signing_key).unwrap();
        mac.update(&data);
        data.extend_from_slice(&mac.finalize().into_bytes());

        URL_SAFE.encode(data).into_bytes()
    }

    #[test]
    fn test_fernet_reference_token() {
        let token = b"gAAAAAAdwJ6wAAECAwQFBgcICQoLDA0ODy021cpGVWKZ_eEwCGM4BLLF_5CV9dOPmrhuVUPgJobwOz7JcbmrR64jVmpU4IwqDA==";
        let plaintext = fernet_decrypt(token, "cw_0x689RpI-jtRR7oE8h_eQsKImvJapLeSbXpwF4e4=").unwrap();
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn test_legacy_key_and_token() {
        let key = derive_legacy_key(LEGACY_PASSWORD);
        assert_eq!(key.as_str(), LEGACY_KEY);

        let plaintext = fernet_decrypt(LEGACY_TOKEN, &key).unwrap();
        assert_eq!(plaintext, b"encrypt me!");
    }

    #[test]
    fn test_wrong_key_is_invalid_password() {
        let other_key = URL_SAFE.encode([9u8; FERNET_KEY_LENGTH]);
        match fernet_decrypt(LEGACY_TOKEN, &other_key) {
            Err(KeyFileError::InvalidPasswordError) => {}
            other => panic!("Expected InvalidPasswordError, got {:?}", other),
        }
    }

    #[test]
    fn test_sealed_token_opens() {
        let key = URL_SAFE.encode([3u8; FERNET_KEY_LENGTH]);
        let token = fernet_encrypt(b"{\"secretSeed\": null}", &key, [5u8; IV_LENGTH]);

        assert!(token.starts_with(LEGACY_MAGIC));
        assert_eq!(fernet_decrypt(&token, &key).unwrap(), b"{\"secretSeed\": null}");
    }

    #[test]
    fn test_truncated_token_is_invalid_password() {
        match fernet_decrypt(&LEGACY_TOKEN[..40], LEGACY_KEY) {
            Err(KeyFileError::InvalidPasswordError) => {}
            other => panic!("Expected InvalidPasswordError, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_key_is_invalid_key() {
        match fernet_decrypt(LEGACY_TOKEN, "c2hvcnQ=") {
            Err(KeyFileError::InvalidKeyError(_)) => {}
            other => panic!("Expected InvalidKeyError, got {:?}", other),
        }
    }
}
