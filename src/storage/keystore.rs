//! Keyfile implementation for storing one keypair per file.
//!
//! A [`Keyfile`] is only a path plus the collaborators it consults for
//! passwords. Nothing is cached: every call reads the file again, so the
//! answer always reflects what is on disk.

use crate::config::KeyfileConfig;
use crate::crypto::ed25519::Keypair;
use crate::crypto::encryption::{decrypt_keyfile_data, encrypt_keyfile_data, KeyfileFormat};
use crate::crypto::keypair::KeyMaterial;
use crate::crypto::password::PasswordPolicy;
use crate::error::{KeyFileError, Result};
use crate::prompt::{Prompter, TerminalPrompter};
use crate::storage::record::{deserialize_keypair, serialize_keypair};
use crate::storage::source::{EnvPasswordSource, PasswordSource};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Prompt used when a password is needed to read an encrypted keyfile.
pub const UNLOCK_PROMPT: &str = "Enter password to unlock key: ";

/// Owner read/write only.
#[cfg(unix)]
const KEYFILE_MODE: u32 = 0o600;

/// Owner only, for directories this crate creates.
#[cfg(unix)]
const KEYFILE_DIR_MODE: u32 = 0o700;

/// Storage for a single keypair.
pub trait KeyStore {
    /// The key material kept in this store.
    type Keypair: KeyMaterial;

    /// Location of the store.
    fn path(&self) -> &Path;

    /// Whether the store holds any data.
    fn exists(&self) -> bool;

    /// Whether this process can read the store.
    fn is_readable(&self) -> bool;

    /// Whether this process can write the store.
    fn is_writable(&self) -> bool;

    /// Whether the stored data is encrypted. False when missing or unreadable.
    fn is_encrypted(&self) -> bool;

    /// Store `keypair`, optionally encrypted.
    ///
    /// Without a `password`, encryption prompts for a new one. Replacing
    /// existing data without `overwrite` asks for confirmation first.
    fn set_keypair(
        &self,
        keypair: &Self::Keypair,
        encrypt: bool,
        overwrite: bool,
        password: Option<&str>,
    ) -> Result<()>;

    /// Load the stored keypair, decrypting it if needed.
    fn get_keypair(&self, password: Option<&str>) -> Result<Self::Keypair>;

    /// Encrypt the stored data in place.
    fn encrypt(&self, password: Option<&str>) -> Result<()>;

    /// Decrypt the stored data in place.
    fn decrypt(&self, password: Option<&str>) -> Result<()>;
}

/// A keypair stored in a file.
pub struct Keyfile<K = Keypair> {
    path: PathBuf,
    name: String,
    password_source: Arc<dyn PasswordSource>,
    prompter: Arc<dyn Prompter>,
    policy: PasswordPolicy,
    _keypair: PhantomData<fn() -> K>,
}

impl<K: KeyMaterial> Keyfile<K> {
    /// Open the keyfile at `path` with default settings: passwords from
    /// `BT_COLD_PW_*` environment variables, then the terminal.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::from_config(path, &KeyfileConfig::default())
    }

    /// Open the keyfile at `path` with settings from `config`.
    pub fn from_config(path: impl AsRef<Path>, config: &KeyfileConfig) -> Self {
        let path = expand_home(path.as_ref());
        let name = keyfile_name(&path);

        Self {
            path,
            name,
            password_source: Arc::new(EnvPasswordSource::new(config.env_prefix.clone())),
            prompter: Arc::new(TerminalPrompter),
            policy: PasswordPolicy::from(&config.policy),
            _keypair: PhantomData,
        }
    }

    /// Use `prompter` for passwords and confirmations.
    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    /// Use `source` for non-interactive unlock passwords.
    pub fn with_password_source(mut self, source: Arc<dyn PasswordSource>) -> Self {
        self.password_source = source;
        self
    }

    /// Use `policy` for new passwords.
    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Logical name: the name of the directory holding the keyfile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw file contents.
    pub fn data(&self) -> Result<Vec<u8>> {
        self.ensure_readable()?;
        Ok(fs::read(&self.path)?)
    }

    /// Create the parent directory if missing. New directories are owner-only.
    pub fn make_dirs(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => return Ok(()),
        };
        if dir.exists() {
            return Ok(());
        }

        debug!(dir = %dir.display(), "creating keyfile directory");
        fs::create_dir_all(dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir, fs::Permissions::from_mode(KEYFILE_DIR_MODE))?;
        }
        Ok(())
    }

    fn ensure_readable(&self) -> Result<()> {
        if !self.exists() {
            return Err(KeyFileError::NotFoundError(self.path.clone()));
        }
        if !self.is_readable() {
            return Err(KeyFileError::NotReadableError(self.path.clone()));
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_readable()?;
        if !self.is_writable() {
            return Err(KeyFileError::NotWritableError(self.path.clone()));
        }
        Ok(())
    }

    /// Directory that receives the temp file on every write.
    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Writes replace the file by rename, so the directory must take new
    /// entries. A directory without any write bit counts as read-only even
    /// for privileged users.
    fn dir_is_writable(&self) -> bool {
        let dir = self.dir();
        match fs::metadata(dir) {
            Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => {
                tempfile::tempfile_in(dir).is_ok()
            }
            _ => false,
        }
    }

    fn not_writable(&self, error: std::io::Error) -> KeyFileError {
        if error.kind() == std::io::ErrorKind::PermissionDenied {
            KeyFileError::NotWritableError(self.path.clone())
        } else {
            KeyFileError::StorageError(error)
        }
    }

    /// Password for reading: argument, then the password source, then a prompt.
    fn unlock_password(&self, password: Option<&str>) -> Result<SecretString> {
        if let Some(password) = password {
            debug!(keyfile = %self.name, source = "argument", "using unlock password");
            return Ok(SecretString::from(password.to_string()));
        }
        if let Some(password) = self.password_source.password_for(&self.name) {
            debug!(keyfile = %self.name, source = "password_source", "using unlock password");
            return Ok(password);
        }

        debug!(keyfile = %self.name, source = "prompt", "using unlock password");
        let password = self
            .prompter
            .password(UNLOCK_PROMPT)
            .map_err(KeyFileError::PromptError)?;
        Ok(SecretString::from(password))
    }

    /// Password for writing: argument, else a new one that passes the policy.
    fn encryption_password(&self, password: Option<&str>) -> Result<SecretString> {
        match password {
            Some(password) => Ok(SecretString::from(password.to_string())),
            None => self.policy.prompt_for_new_password(self.prompter.as_ref()),
        }
    }

    fn read_plaintext(&self, data: Zeroizing<Vec<u8>>, password: Option<&str>) -> Result<Zeroizing<Vec<u8>>> {
        if !KeyfileFormat::classify(&data).is_encrypted() {
            return Ok(data);
        }
        let password = self.unlock_password(password)?;
        Ok(Zeroizing::new(decrypt_keyfile_data(&data, password.expose_secret())?))
    }

    fn write_data(&self, data: &[u8], overwrite: bool) -> Result<()> {
        if self.exists() {
            if !overwrite && !self.may_overwrite()? {
                warn!(path = %self.path.display(), "overwrite declined");
                return Err(KeyFileError::OverwriteDeniedError(self.path.clone()));
            }
            if !self.is_writable() {
                return Err(KeyFileError::NotWritableError(self.path.clone()));
            }
        }

        let mut file = tempfile::NamedTempFile::new_in(self.dir()).map_err(|e| self.not_writable(e))?;
        file.write_all(data)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| self.not_writable(e.error))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(KEYFILE_MODE))
                .map_err(|e| self.not_writable(e))?;
        }

        info!(path = %self.path.display(), "wrote keyfile");
        Ok(())
    }

    fn may_overwrite(&self) -> Result<bool> {
        let prompt = format!(
            "File {} already exists. Overwrite? (y/N) ",
            self.path.display()
        );
        self.prompter.confirm(&prompt).map_err(KeyFileError::PromptError)
    }
}

impl<K: KeyMaterial> KeyStore for Keyfile<K> {
    type Keypair = K;

    fn path(&self) -> &Path {
        &self.path
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn is_readable(&self) -> bool {
        self.exists() && File::open(&self.path).is_ok()
    }

    fn is_writable(&self) -> bool {
        self.exists() && OpenOptions::new().write(true).open(&self.path).is_ok() && self.dir_is_writable()
    }

    fn is_encrypted(&self) -> bool {
        if !self.is_readable() {
            return false;
        }
        fs::read(&self.path)
            .map(|data| KeyfileFormat::classify(&data).is_encrypted())
            .unwrap_or(false)
    }

    fn set_keypair(&self, keypair: &K, encrypt: bool, overwrite: bool, password: Option<&str>) -> Result<()> {
        self.make_dirs()?;
        if !self.dir_is_writable() || (self.exists() && !self.is_writable()) {
            return Err(KeyFileError::NotWritableError(self.path.clone()));
        }

        let mut data = Zeroizing::new(serialize_keypair(keypair)?);
        if encrypt {
            let password = self.encryption_password(password)?;
            data = Zeroizing::new(encrypt_keyfile_data(&data, password.expose_secret())?);
        }

        self.write_data(&data, overwrite)
    }

    fn get_keypair(&self, password: Option<&str>) -> Result<K> {
        let data = Zeroizing::new(self.data()?);
        let plaintext = self.read_plaintext(data, password)?;
        deserialize_keypair(&plaintext)
    }

    fn encrypt(&self, password: Option<&str>) -> Result<()> {
        self.ensure_writable()?;

        let mut data = Zeroizing::new(fs::read(&self.path)?);
        if KeyfileFormat::classify(&data).is_encrypted() {
            debug!(path = %self.path.display(), "keyfile already encrypted");
        } else {
            let keypair: K = deserialize_keypair(&data)?;
            let plaintext = Zeroizing::new(serialize_keypair(&keypair)?);
            let password = self.encryption_password(password)?;
            data = Zeroizing::new(encrypt_keyfile_data(&plaintext, password.expose_secret())?);
        }

        self.write_data(&data, true)
    }

    fn decrypt(&self, password: Option<&str>) -> Result<()> {
        self.ensure_writable()?;

        let data = Zeroizing::new(fs::read(&self.path)?);
        let plaintext = self.read_plaintext(data, password)?;
        let keypair: K = deserialize_keypair(&plaintext)?;

        let plaintext = Zeroizing::new(serialize_keypair(&keypair)?);
        self.write_data(&plaintext, true)
    }
}

impl<K: KeyMaterial> fmt::Display for Keyfile<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if !self.exists() {
            "empty"
        } else if self.is_encrypted() {
            "encrypted"
        } else {
            "decrypted"
        };
        write!(f, "Keyfile ({}, {})", state, self.path.display())
    }
}

impl<K> fmt::Debug for Keyfile<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyfile")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish()
    }
}

/// In-memory keystore. It always exists and never encrypts.
#[derive(Debug)]
pub struct MockKeyfile<K = Keypair> {
    path: PathBuf,
    keypair: Mutex<Option<K>>,
}

impl<K: KeyMaterial> MockKeyfile<K> {
    /// Create an empty mock keystore.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keypair: Mutex::new(None),
        }
    }

    /// Create a mock keystore already holding `keypair`.
    pub fn with_keypair(path: impl Into<PathBuf>, keypair: K) -> Self {
        Self {
            path: path.into(),
            keypair: Mutex::new(Some(keypair)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<K>> {
        self.keypair
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K: KeyMaterial> KeyStore for MockKeyfile<K> {
    type Keypair = K;

    fn path(&self) -> &Path {
        &self.path
    }

    fn exists(&self) -> bool {
        true
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn is_encrypted(&self) -> bool {
        false
    }

    fn set_keypair(&self, keypair: &K, _encrypt: bool, _overwrite: bool, _password: Option<&str>) -> Result<()> {
        *self.slot() = Some(keypair.clone());
        Ok(())
    }

    fn get_keypair(&self, _password: Option<&str>) -> Result<K> {
        self.slot()
            .clone()
            .ok_or_else(|| KeyFileError::NotFoundError(self.path.clone()))
    }

    fn encrypt(&self, _password: Option<&str>) -> Result<()> {
        Err(KeyFileError::UnsupportedError(
            "mock keyfile cannot be encrypted".to_string(),
        ))
    }

    fn decrypt(&self, _password: Option<&str>) -> Result<()> {
        Ok(())
    }
}

impl<K> fmt::Display for MockKeyfile<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MockKeyfile ({})", self.path.display())
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

fn keyfile_name(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
