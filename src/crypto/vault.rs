//! Vault format: the Ansible Vault 1.1 envelope.
//!
//! ```text
//! $ANSIBLE_VAULT;1.1;AES256
//! hex( hex(salt) \n hex(hmac) \n hex(ciphertext) ), wrapped at 80 columns
//! ```
//!
//! PBKDF2-HMAC-SHA256 (10 000 rounds, 32-byte random salt) yields 80 bytes:
//! the AES-256-CTR key, the HMAC-SHA256 key and the initial counter block.
//! The plaintext is PKCS#7 padded before encryption and the HMAC covers the
//! ciphertext, so a wrong password is detected before anything is decrypted.

use crate::error::{KeyFileError, Result};
use aes::Aes256;
use ctr::cipher::block_padding::{Padding, Pkcs7};
use ctr::cipher::consts::U16;
use ctr::cipher::generic_array::GenericArray;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Leading bytes of every vault-format keyfile.
pub const VAULT_MAGIC: &[u8] = b"$ANSIBLE_VAULT";

/// Header line written on encryption.
pub const VAULT_HEADER: &str = "$ANSIBLE_VAULT;1.1;AES256";

const SALT_LENGTH: usize = 32;
const KEY_LENGTH: usize = 32;
const IV_LENGTH: usize = 16;
const BLOCK_SIZE: usize = 16;
const KDF_ROUNDS: u32 = 10_000;
const LINE_WIDTH: usize = 80;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

#[derive(Zeroize, ZeroizeOnDrop)]
struct VaultKeys {
    cipher: [u8; KEY_LENGTH],
    mac: [u8; KEY_LENGTH],
    iv: [u8; IV_LENGTH],
}

/// Encrypt `plaintext` into a vault envelope under a fresh random salt.
///
/// # Example
///
/// ```
/// use keyfile::crypto::vault::{open, seal, VAULT_MAGIC};
///
/// let sealed = seal(b"{\"ss58Address\": null}", "correct horse").unwrap();
/// assert!(sealed.starts_with(VAULT_MAGIC));
/// assert_eq!(open(&sealed, "correct horse").unwrap(), b"{\"ss58Address\": null}");
/// ```
pub fn seal(plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    seal_with_salt(plaintext, password, &salt)
}

pub(crate) fn seal_with_salt(plaintext: &[u8], password: &str, salt: &[u8]) -> Result<Vec<u8>> {
    let keys = derive_keys(password, salt);

    let mut ciphertext = pkcs7_pad(plaintext);
    let mut cipher = Aes256Ctr::new_from_slices(&keys.cipher, &keys.iv)
        .map_err(|e| KeyFileError::InvalidKeyError(format!("Invalid vault key: {}", e)))?;
    cipher.apply_keystream(&mut ciphertext);

    let tag = mac_for(&keys, &ciphertext)?.finalize().into_bytes();

    let inner = format!(
        "{}\n{}\n{}",
        hex::encode(salt),
        hex::encode(tag),
        hex::encode(&ciphertext)
    );
    let body = hex::encode(inner.as_bytes());

    let mut out = String::with_capacity(VAULT_HEADER.len() + body.len() + body.len() / LINE_WIDTH + 2);
    out.push_str(VAULT_HEADER);
    out.push('\n');
    for line in body.as_bytes().chunks(LINE_WIDTH) {
        // hex output is ASCII, so every chunk boundary is a char boundary
        out.push_str(std::str::from_utf8(line).unwrap_or_default());
        out.push('\n');
    }
    Ok(out.into_bytes())
}

/// Decrypt a vault envelope.
///
/// Fails with [`KeyFileError::InvalidPasswordError`] when the HMAC does not
/// match and with [`KeyFileError::CorruptRecordError`] when the envelope
/// itself is malformed.
pub fn open(blob: &[u8], password: &str) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(blob)
        .map_err(|_| corrupt("vault envelope is not valid UTF-8"))?;
    let (header, body) = text.split_once('\n').unwrap_or((text, ""));
    check_header(header.trim_end())?;

    let body: String = body.split_whitespace().collect();
    let inner = hex::decode(body).map_err(|e| corrupt(&format!("vault body is not hex: {}", e)))?;

    let mut parts = inner.split(|b| *b == b'\n');
    let (salt, tag, ciphertext) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(salt), Some(tag), Some(ciphertext), None) => (
            decode_part(salt, "salt")?,
            decode_part(tag, "hmac")?,
            decode_part(ciphertext, "ciphertext")?,
        ),
        _ => return Err(corrupt("vault body must hold salt, hmac and ciphertext")),
    };

    let keys = derive_keys(password, &salt);
    mac_for(&keys, &ciphertext)?
        .verify_slice(&tag)
        .map_err(|_| KeyFileError::InvalidPasswordError)?;

    let mut plaintext = ciphertext;
    let mut cipher = Aes256Ctr::new_from_slices(&keys.cipher, &keys.iv)
        .map_err(|e| KeyFileError::InvalidKeyError(format!("Invalid vault key: {}", e)))?;
    cipher.apply_keystream(&mut plaintext);

    pkcs7_unpad(plaintext)
}

fn check_header(header: &str) -> Result<()> {
    let fields: Vec<&str> = header.split(';').map(str::trim).collect();
    match fields.as_slice() {
        ["$ANSIBLE_VAULT", "1.1", "AES256"] | ["$ANSIBLE_VAULT", "1.2", "AES256", _] => Ok(()),
        _ => Err(corrupt(&format!("unsupported vault header {:?}", header))),
    }
}

fn derive_keys(password: &str, salt: &[u8]) -> VaultKeys {
    let mut derived = Zeroizing::new([0u8; 2 * KEY_LENGTH + IV_LENGTH]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ROUNDS, &mut derived[..]);

    let mut keys = VaultKeys {
        cipher: [0u8; KEY_LENGTH],
        mac: [0u8; KEY_LENGTH],
        iv: [0u8; IV_LENGTH],
    };
    keys.cipher.copy_from_slice(&derived[..KEY_LENGTH]);
    keys.mac.copy_from_slice(&derived[KEY_LENGTH..2 * KEY_LENGTH]);
    keys.iv.copy_from_slice(&derived[2 * KEY_LENGTH..]);
    keys
}

fn mac_for(keys: &VaultKeys, ciphertext: &[u8]) -> Result<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(&keys.mac)
        .map_err(|e| KeyFileError::InvalidKeyError(format!("Invalid vault key: {}", e)))?;
    mac.update(ciphertext);
    Ok(mac)
}

fn decode_part(part: &[u8], what: &str) -> Result<Vec<u8>> {
    hex::decode(part).map_err(|e| corrupt(&format!("vault {} is not hex: {}", what, e)))
}

/// PKCS#7 over the final block; the cipher is CTR, so only the padding
/// sees block boundaries.
fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let full = data.len() - data.len() % BLOCK_SIZE;
    let mut last = GenericArray::<u8, U16>::default();
    last[..data.len() - full].copy_from_slice(&data[full..]);
    <Pkcs7 as Padding<U16>>::pad(&mut last, data.len() - full);

    let mut out = Vec::with_capacity(full + BLOCK_SIZE);
    out.extend_from_slice(&data[..full]);
    out.extend_from_slice(&last);
    out
}

fn pkcs7_unpad(mut data: Vec<u8>) -> Result<Vec<u8>> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(corrupt("invalid vault padding"));
    }
    let start = data.len() - BLOCK_SIZE;
    let kept = <Pkcs7 as Padding<U16>>::unpad(GenericArray::from_slice(&data[start..]))
        .map_err(|_| corrupt("invalid vault padding"))?
        .len();
    data.truncate(start + kept);
    Ok(data)
}

fn corrupt(reason: &str) -> KeyFileError {
    KeyFileError::CorruptRecordError(reason.to_string())
}
