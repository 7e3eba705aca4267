//! Non-interactive password sources.
//!
//! Before prompting, a keyfile asks its [`PasswordSource`] for the password of
//! its logical name. The default source reads the process environment; tests
//! and embedders inject their own.

use secrecy::SecretString;
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

/// Default prefix of password environment variables.
pub const DEFAULT_ENV_PREFIX: &str = "BT_COLD_PW_";

/// Supplies passwords by keyfile name.
pub trait PasswordSource: Send + Sync {
    /// The password for the keyfile called `name`, if this source has one.
    fn password_for(&self, name: &str) -> Option<SecretString>;
}

impl<F> PasswordSource for F
where
    F: Fn(&str) -> Option<SecretString> + Send + Sync,
{
    fn password_for(&self, name: &str) -> Option<SecretString> {
        self(name)
    }
}

/// Never has a password.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPasswordSource;

impl PasswordSource for NoPasswordSource {
    fn password_for(&self, _name: &str) -> Option<SecretString> {
        None
    }
}

/// Reads passwords from environment variables such as `BT_COLD_PW_DEFAULT`.
#[derive(Debug, Clone)]
pub struct EnvPasswordSource {
    prefix: String,
}

impl EnvPasswordSource {
    /// Create a source for variables starting with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The variable prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for EnvPasswordSource {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_PREFIX)
    }
}

impl PasswordSource for EnvPasswordSource {
    fn password_for(&self, name: &str) -> Option<SecretString> {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));
        resolve_env_password(&self.prefix, name, vars)
    }
}

/// Find the password for `name` among `vars`.
///
/// A variable matches when its name, compared case-insensitively, starts with
/// `prefix` and ends with `name`. The first match wins. An empty `name`
/// matches nothing.
///
/// # Example
///
/// ```
/// use keyfile::storage::source::resolve_env_password;
/// use secrecy::ExposeSecret;
///
/// let vars = vec![("bt_cold_pw_Default".to_string(), "hunter2".to_string())];
/// let password = resolve_env_password("BT_COLD_PW_", "default", vars).unwrap();
/// assert_eq!(password.expose_secret(), "hunter2");
/// ```
pub fn resolve_env_password<I>(prefix: &str, name: &str, vars: I) -> Option<SecretString>
where
    I: IntoIterator<Item = (String, String)>,
{
    if name.is_empty() {
        return None;
    }

    let prefix = prefix.to_uppercase();
    let name = name.to_uppercase();
    vars.into_iter().find_map(|(key, value)| {
        let value = Zeroizing::new(value);
        let key = key.to_uppercase();
        (key.starts_with(&prefix) && key.ends_with(&name)).then(|| SecretString::from(value.to_string()))
    })
}

/// Fixed passwords by keyfile name, matched case-insensitively.
#[derive(Default)]
pub struct StaticPasswordSource {
    passwords: HashMap<String, Zeroizing<String>>,
}

impl StaticPasswordSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the password for `name`.
    pub fn with_password(mut self, name: &str, password: impl Into<String>) -> Self {
        self.passwords
            .insert(name.to_uppercase(), Zeroizing::new(password.into()));
        self
    }
}

impl fmt::Debug for StaticPasswordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticPasswordSource")
            .field("names", &self.passwords.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PasswordSource for StaticPasswordSource {
    fn password_for(&self, name: &str) -> Option<SecretString> {
        self.passwords
            .get(&name.to_uppercase())
            .map(|password| SecretString::from(password.to_string()))
    }
}
