//! The plaintext key record stored inside a keyfile.
//!
//! A record is a JSON object with five nullable fields. All of them are always
//! written; a `null` means unknown, not empty.

use crate::crypto::keypair::KeyMaterial;
use crate::error::{KeyFileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Prefix of a keyfile that holds nothing but a hex public key.
const RAW_PUBLIC_KEY_PREFIX: &str = "0x";

/// The on-disk shape of a keypair.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase", from = "StoredRecord")]
pub struct KeyRecord {
    /// Public key as `0x` hex. Older files call this `accountId`.
    pub address: Option<String>,

    /// Public key as `0x` hex.
    pub public_key: Option<String>,

    /// Mnemonic phrase.
    pub secret_phrase: Option<String>,

    /// Private seed as `0x` hex.
    pub secret_seed: Option<String>,

    /// SS58 address.
    pub ss58_address: Option<String>,
}

/// What a record may look like on disk, including the older `accountId` name.
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    address: Option<String>,
    account_id: Option<String>,
    public_key: Option<String>,
    secret_phrase: Option<String>,
    secret_seed: Option<String>,
    ss58_address: Option<String>,
}

impl From<StoredRecord> for KeyRecord {
    fn from(mut stored: StoredRecord) -> Self {
        Self {
            address: stored.address.take().or_else(|| stored.account_id.take()),
            public_key: stored.public_key.take(),
            secret_phrase: stored.secret_phrase.take(),
            secret_seed: stored.secret_seed.take(),
            ss58_address: stored.ss58_address.take(),
        }
    }
}

impl KeyRecord {
    /// Build the record for a keypair.
    pub fn from_keypair<K: KeyMaterial>(keypair: &K) -> Self {
        let public_key = keypair.public_key_hex();
        Self {
            address: public_key.clone(),
            public_key,
            secret_phrase: keypair.mnemonic().map(str::to_string),
            secret_seed: keypair.seed_hex(),
            ss58_address: keypair.ss58_address().map(str::to_string),
        }
    }

    /// Rebuild a keypair, preferring the seed, then the mnemonic, then the
    /// address. A public key alone is not enough.
    pub fn to_keypair<K: KeyMaterial>(&self) -> Result<K> {
        let rebuilt = if let Some(seed) = self.secret_seed.as_deref() {
            K::from_seed_hex(seed).map(|keypair| self.checked(self.with_matching_phrase(keypair)))
        } else if let Some(phrase) = self.secret_phrase.as_deref() {
            K::from_mnemonic(phrase).map(|keypair| self.checked(keypair))
        } else if let Some(address) = self.ss58_address.as_deref() {
            K::from_address(address)
        } else {
            return Err(KeyFileError::CorruptRecordError(format!(
                "Keypair could not be created from keyfile data: {:?}",
                self
            )));
        };

        rebuilt.map_err(|e| match e {
            KeyFileError::InvalidKeyError(reason) => KeyFileError::CorruptRecordError(reason),
            other => other,
        })
    }

    /// Keep the mnemonic of a seed-built keypair when the phrase derives the
    /// same seed, so rewriting the record does not drop it.
    fn with_matching_phrase<K: KeyMaterial>(&self, keypair: K) -> K {
        self.secret_phrase
            .as_deref()
            .and_then(|phrase| K::from_mnemonic(phrase).ok())
            .filter(|from_phrase| from_phrase.seed_hex() == keypair.seed_hex())
            .unwrap_or(keypair)
    }

    /// The stored SS58 address when it disagrees with the one `keypair`
    /// derives. Records written by other key schemes rebuild to a
    /// different address.
    fn address_mismatch<K: KeyMaterial>(&self, keypair: &K) -> Option<&str> {
        let stored = self.ss58_address.as_deref()?;
        (keypair.ss58_address() != Some(stored)).then_some(stored)
    }

    fn checked<K: KeyMaterial>(&self, keypair: K) -> K {
        if let Some(stored) = self.address_mismatch(&keypair) {
            warn!(
                stored = stored,
                derived = keypair.ss58_address().unwrap_or("-"),
                "rebuilt key does not match the stored address"
            );
        }
        keypair
    }

    /// Whether the record holds anything a keypair can be rebuilt from.
    pub fn is_reconstructable(&self) -> bool {
        self.secret_seed.is_some() || self.secret_phrase.is_some() || self.ss58_address.is_some()
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redacted(value: &Option<String>) -> Option<&'static str> {
            value.as_ref().map(|_| "<redacted>")
        }

        f.debug_struct("KeyRecord")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("secret_phrase", &redacted(&self.secret_phrase))
            .field("secret_seed", &redacted(&self.secret_seed))
            .field("ss58_address", &self.ss58_address)
            .finish()
    }
}

/// Serialize a keypair into keyfile data.
///
/// # Example
///
/// ```
/// use keyfile::crypto::ed25519::Keypair;
/// use keyfile::crypto::keypair::KeyMaterial;
/// use keyfile::storage::record::{deserialize_keypair, serialize_keypair};
///
/// let keypair = Keypair::from_address("5DD26kC2kxajmwfbbZmVmxhrY9VeeyR1Gpzy9i8wxLUg6zxm").unwrap();
/// let data = serialize_keypair(&keypair).unwrap();
/// let restored: Keypair = deserialize_keypair(&data).unwrap();
/// assert_eq!(restored.ss58_address(), keypair.ss58_address());
/// ```
pub fn serialize_keypair<K: KeyMaterial>(keypair: &K) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&KeyRecord::from_keypair(keypair))?)
}

/// Parse keyfile data into a record.
///
/// Data that is not a JSON object but starts with `0x` is a bare public key
/// from an older keyfile layout; it becomes an address-only record.
pub fn parse_record<K: KeyMaterial>(data: &[u8]) -> Result<KeyRecord> {
    let text = std::str::from_utf8(data).map_err(|_| {
        KeyFileError::CorruptRecordError("keyfile data is not valid UTF-8".to_string())
    })?;

    if let Ok(record) = serde_json::from_str::<KeyRecord>(text) {
        return Ok(record);
    }

    let raw = text.trim();
    if raw.starts_with(RAW_PUBLIC_KEY_PREFIX) {
        let address = K::address_from_public_key_hex(raw).map_err(|e| {
            KeyFileError::CorruptRecordError(format!("Invalid raw public key: {}", e))
        })?;
        return Ok(KeyRecord {
            address: None,
            public_key: None,
            secret_phrase: None,
            secret_seed: None,
            ss58_address: Some(address),
        });
    }

    Err(KeyFileError::CorruptRecordError(format!(
        "Keypair could not be created from keyfile data: {}",
        raw
    )))
}

/// Deserialize a keypair from keyfile data.
pub fn deserialize_keypair<K: KeyMaterial>(data: &[u8]) -> Result<K> {
    parse_record::<K>(data)?.to_keypair()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ed25519::{generate_keypair, Keypair};

    const RAW_PUBLIC_KEY: &str = "0x32939b6abc4d81f02dff04d2b8d1d01cc8e71c5e4c7492e4fa6a238cdca3512f";
    const RAW_ADDRESS: &str = "5DD26kC2kxajmwfbbZmVmxhrY9VeeyR1Gpzy9i8wxLUg6zxm";

    #[test]
    fn test_serialize_writes_all_fields() {
        let keypair = Keypair::from_address(RAW_ADDRESS).unwrap();
        let data = serialize_keypair(&keypair).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();
        let object = value.as_object().unwrap();
        for field in ["address", "publicKey", "secretPhrase", "secretSeed", "ss58Address"] {
            assert!(object.contains_key(field), "missing field {}", field);
        }
        assert!(object["secretSeed"].is_null());
        assert!(object["secretPhrase"].is_null());
        assert_eq!(object["address"], RAW_PUBLIC_KEY);
        assert_eq!(object["publicKey"], RAW_PUBLIC_KEY);
        assert_eq!(object["ss58Address"], RAW_ADDRESS);
    }

    #[test]
    fn test_roundtrip_with_seed() {
        let keypair = generate_keypair(12).unwrap();
        let restored: Keypair = deserialize_keypair(&serialize_keypair(&keypair).unwrap()).unwrap();

        assert_eq!(restored.ss58_address(), keypair.ss58_address());
        assert_eq!(restored.public_key_hex(), keypair.public_key_hex());
        assert_eq!(restored.seed_hex(), keypair.seed_hex());
    }

    #[test]
    fn test_seed_wins_over_phrase() {
        let from_phrase = generate_keypair(12).unwrap();
        let other = generate_keypair(12).unwrap();
        let mut record = KeyRecord::default();
        record.secret_seed = other.seed_hex();
        record.secret_phrase = from_phrase.mnemonic().map(str::to_string);

        let restored: Keypair = record.to_keypair().unwrap();
        assert_eq!(restored.ss58_address(), other.ss58_address());
    }

    #[test]
    fn test_roundtrip_keeps_matching_phrase() {
        let keypair = generate_keypair(12).unwrap();
        let restored: Keypair = deserialize_keypair(&serialize_keypair(&keypair).unwrap()).unwrap();

        assert_eq!(restored.mnemonic(), keypair.mnemonic());
    }

    #[test]
    fn test_phrase_wins_over_address() {
        let keypair = generate_keypair(12).unwrap();
        let mut record = KeyRecord::default();
        record.secret_phrase = keypair.mnemonic().map(str::to_string);
        record.ss58_address = Some(RAW_ADDRESS.to_string());

        let restored: Keypair = record.to_keypair().unwrap();
        assert!(restored.can_sign());
        assert_eq!(restored.ss58_address(), keypair.ss58_address());
    }

    #[test]
    fn test_account_id_alias() {
        let data = format!(
            r#"{{"accountId": "{}", "publicKey": "{}", "secretPhrase": null, "secretSeed": null, "ss58Address": "{}"}}"#,
            RAW_PUBLIC_KEY, RAW_PUBLIC_KEY, RAW_ADDRESS
        );
        let record = parse_record::<Keypair>(data.as_bytes()).unwrap();
        assert_eq!(record.address.as_deref(), Some(RAW_PUBLIC_KEY));
    }

    #[test]
    fn test_address_preferred_over_account_id() {
        let keypair = generate_keypair(12).unwrap();
        let data = format!(
            r#"{{"accountId": "{}", "address": "{}", "ss58Address": "{}"}}"#,
            keypair.public_key_hex().unwrap(),
            RAW_PUBLIC_KEY,
            RAW_ADDRESS
        );
        let record = parse_record::<Keypair>(data.as_bytes()).unwrap();
        assert_eq!(record.address.as_deref(), Some(RAW_PUBLIC_KEY));

        let written: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert!(written.get("accountId").is_none());
    }

    #[test]
    fn test_seed_with_foreign_address_reports_mismatch() {
        let keypair = generate_keypair(12).unwrap();
        let mut record = KeyRecord::from_keypair(&keypair);
        assert_eq!(record.address_mismatch(&keypair), None);

        record.ss58_address = Some(RAW_ADDRESS.to_string());
        let restored: Keypair = record.to_keypair().unwrap();
        assert_eq!(restored.ss58_address(), keypair.ss58_address());
        assert_eq!(record.address_mismatch(&restored), Some(RAW_ADDRESS));
    }

    #[test]
    fn test_missing_fields_are_unknown() {
        let restored: Keypair = deserialize_keypair(format!(r#"{{"ss58Address": "{}"}}"#, RAW_ADDRESS).as_bytes()).unwrap();
        assert_eq!(restored.ss58_address(), Some(RAW_ADDRESS));
        assert!(!restored.can_sign());
    }

    #[test]
    fn test_raw_public_key_file() {
        let keypair: Keypair = deserialize_keypair(format!("{}\n", RAW_PUBLIC_KEY).as_bytes()).unwrap();

        assert_eq!(keypair.ss58_address(), Some(RAW_ADDRESS));
        assert!(keypair.seed_hex().is_none());
        match keypair.secret_seed() {
            Err(KeyFileError::InvalidKeyError(_)) => {}
            other => panic!("Expected InvalidKeyError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_public_key_only_is_corrupt() {
        let data = format!(r#"{{"publicKey": "{}"}}"#, RAW_PUBLIC_KEY);
        match deserialize_keypair::<Keypair>(data.as_bytes()) {
            Err(KeyFileError::CorruptRecordError(msg)) => assert!(msg.contains(RAW_PUBLIC_KEY)),
            other => panic!("Expected CorruptRecordError, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_is_corrupt() {
        for data in [&b"not a keyfile"[..], &b"0xnothex"[..], &b"\xff\xfe"[..], &b""[..]] {
            match deserialize_keypair::<Keypair>(data) {
                Err(KeyFileError::CorruptRecordError(_)) => {}
                other => panic!("Expected CorruptRecordError for {:?}, got {:?}", data, other),
            }
        }
    }

    #[test]
    fn test_invalid_seed_is_corrupt() {
        match deserialize_keypair::<Keypair>(br#"{"secretSeed": "0x1234"}"#) {
            Err(KeyFileError::CorruptRecordError(_)) => {}
            other => panic!("Expected CorruptRecordError, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let keypair = generate_keypair(12).unwrap();
        let record = KeyRecord::from_keypair(&keypair);
        let debug = format!("{:?}", record);

        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(keypair.seed_hex().unwrap().as_str()));
    }
}
