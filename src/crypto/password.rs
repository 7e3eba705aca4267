//! Password policy for keyfile encryption.
//!
//! A new encryption password must be non-empty, long enough, carry a minimum
//! entropy estimate and pass a strength heuristic, and then be typed a second
//! time. Failing the policy is an expected user-input event: it is reported
//! through the prompter and returned as `false`, never as an error.

use crate::error::{KeyFileError, Result};
use crate::prompt::Prompter;
use secrecy::SecretString;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;
use zeroize::Zeroizing;

/// Minimum password length in characters.
pub const MIN_LENGTH: usize = 6;

/// Minimum entropy estimate in bits.
pub const MIN_ENTROPY_BITS: f64 = 10.0;

/// Minimum strength on a 0 to 1 scale.
pub const MIN_STRENGTH: f64 = 0.20;

/// Entropy below which a password is considered weak.
const WEAK_BITS: f64 = 30.0;
const WEAK_MAX: f64 = 1.0 / 3.0;
const HARD_VALUE: f64 = 0.95;

/// Shortest run counted as a sequence or repetition.
const MIN_PATTERN_RUN: usize = 3;

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "passwd",
    "qwerty",
    "qwertyuiop",
    "letmein",
    "welcome",
    "admin",
    "administrator",
    "iloveyou",
    "monkey",
    "dragon",
    "football",
    "baseball",
    "master",
    "sunshine",
    "princess",
    "trustno1",
    "shadow",
    "superman",
    "starwars",
    "whatever",
    "changeme",
    "secret",
];

const NEW_PASSWORD_PROMPT: &str = "Specify password for key encryption: ";
const CONFIRM_PROMPT: &str = "Retype your password: ";
const TOO_WEAK_MESSAGE: &str =
    "Password not strong enough. Try increasing the length of the password or the password complexity";
const MISMATCH_MESSAGE: &str = "Passwords do not match";

/// Estimates password strength on a 0 to 1 scale.
pub type StrengthFn = fn(&str) -> f64;

/// A single policy rule a password failed.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyViolation {
    /// The password is empty.
    Empty,
    /// Fewer characters than required.
    Length { min: usize, actual: usize },
    /// Entropy estimate below the minimum.
    Entropy { min: f64, actual: f64 },
    /// Strength heuristic below the minimum.
    Strength { min: f64, actual: f64 },
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyViolation::Empty => write!(f, "password is empty"),
            PolicyViolation::Length { min, actual } => {
                write!(f, "length {} is below the minimum of {}", actual, min)
            }
            PolicyViolation::Entropy { min, actual } => {
                write!(f, "entropy {:.1} bits is below the minimum of {:.1}", actual, min)
            }
            PolicyViolation::Strength { min, actual } => {
                write!(f, "strength {:.2} is below the minimum of {:.2}", actual, min)
            }
        }
    }
}

/// Rules a new encryption password must meet.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    /// Minimum length in characters.
    pub min_length: usize,
    /// Minimum entropy estimate in bits.
    pub min_entropy_bits: f64,
    /// Minimum score from the strength function.
    pub min_strength: f64,
    strength: StrengthFn,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::new(MIN_LENGTH, MIN_ENTROPY_BITS, MIN_STRENGTH)
    }
}

impl PasswordPolicy {
    /// Create a policy using the built-in strength heuristic.
    pub fn new(min_length: usize, min_entropy_bits: f64, min_strength: f64) -> Self {
        Self {
            min_length,
            min_entropy_bits,
            min_strength,
            strength: estimate_strength,
        }
    }

    /// Replace the strength heuristic.
    pub fn with_strength_fn(mut self, strength: StrengthFn) -> Self {
        self.strength = strength;
        self
    }

    /// List every rule the password fails. Empty means the password passes.
    pub fn check(&self, password: &str) -> Vec<PolicyViolation> {
        if password.is_empty() {
            return vec![PolicyViolation::Empty];
        }

        let mut violations = Vec::new();

        let length = password.chars().count();
        if length < self.min_length {
            violations.push(PolicyViolation::Length {
                min: self.min_length,
                actual: length,
            });
        }

        let bits = entropy_bits(password);
        if bits < self.min_entropy_bits {
            violations.push(PolicyViolation::Entropy {
                min: self.min_entropy_bits,
                actual: bits,
            });
        }

        let strength = (self.strength)(password);
        if strength < self.min_strength {
            violations.push(PolicyViolation::Strength {
                min: self.min_strength,
                actual: strength,
            });
        }

        violations
    }

    /// Check the password against the policy, then ask for it again and
    /// require an exact match.
    ///
    /// Returns `Ok(false)` with a message to the user on any policy failure.
    /// Only a failing confirmation prompt is an error.
    pub fn validate(&self, password: Option<&str>, prompter: &dyn Prompter) -> Result<bool> {
        let password = match password {
            Some(password) if !password.is_empty() => password,
            _ => return Ok(false),
        };

        let violations = self.check(password);
        if !violations.is_empty() {
            debug!(
                violations = %violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "),
                "password rejected by policy"
            );
            prompter.warn(TOO_WEAK_MESSAGE);
            return Ok(false);
        }

        let confirmation = Zeroizing::new(
            prompter
                .password(CONFIRM_PROMPT)
                .map_err(KeyFileError::PromptError)?,
        );
        if password != confirmation.as_str() {
            prompter.warn(MISMATCH_MESSAGE);
            return Ok(false);
        }

        Ok(true)
    }

    /// Prompt until the user enters a password that passes [`validate`].
    ///
    /// There is no retry limit.
    ///
    /// [`validate`]: PasswordPolicy::validate
    pub fn prompt_for_new_password(&self, prompter: &dyn Prompter) -> Result<SecretString> {
        loop {
            let password = Zeroizing::new(
                prompter
                    .password(NEW_PASSWORD_PROMPT)
                    .map_err(KeyFileError::PromptError)?,
            );
            if self.validate(Some(password.as_str()), prompter)? {
                return Ok(SecretString::from(password.as_str().to_string()));
            }
        }
    }
}

/// Entropy estimate in bits: length times log2 of the distinct characters used.
pub fn entropy_bits(password: &str) -> f64 {
    let length = password.chars().count();
    let distinct = password.chars().collect::<HashSet<_>>().len();
    if distinct < 2 {
        return 0.0;
    }
    length as f64 * (distinct as f64).log2()
}

/// Built-in strength heuristic.
///
/// Entropy maps onto a curve that reaches 1/3 at 30 bits and 0.95 at 120 bits.
/// The result is scaled down by the share of characters in ascending or
/// descending runs (`abc`, `4321`) and repeated runs (`aaa`). Well-known
/// passwords, including common digit-for-letter substitutions, score zero.
///
/// # Example
///
/// ```
/// use keyfile::crypto::password::estimate_strength;
///
/// assert_eq!(estimate_strength("password"), 0.0);
/// assert!(estimate_strength("123456789") < 0.2);
/// assert!(estimate_strength("biTTensor") >= 0.2);
/// ```
pub fn estimate_strength(password: &str) -> f64 {
    if password.is_empty() || is_common_password(password) {
        return 0.0;
    }

    let bits = entropy_bits(password);
    let base = if bits <= WEAK_BITS {
        WEAK_MAX * bits / WEAK_BITS
    } else {
        let hard_bits = WEAK_BITS * 3.0;
        let k = -((1.0 - HARD_VALUE) / (1.0 - WEAK_MAX)).ln() / hard_bits;
        1.0 - (1.0 - WEAK_MAX) * (-k * (bits - WEAK_BITS)).exp()
    };

    base * (1.0 - weakness_factor(password))
}

/// Share of characters that sit in sequences or repetitions.
fn weakness_factor(password: &str) -> f64 {
    let chars: Vec<u32> = password.chars().map(u32::from).collect();
    if chars.len() < MIN_PATTERN_RUN {
        return 0.0;
    }

    let mut weak = vec![false; chars.len()];
    let mut start = 0;
    while start + 1 < chars.len() {
        let step = i64::from(chars[start + 1]) - i64::from(chars[start]);
        let mut end = start + 1;
        if step.abs() <= 1 {
            while end + 1 < chars.len() && i64::from(chars[end + 1]) - i64::from(chars[end]) == step {
                end += 1;
            }
            if end - start + 1 >= MIN_PATTERN_RUN {
                weak[start..=end].iter_mut().for_each(|flag| *flag = true);
            }
        }
        start = end;
    }

    weak.iter().filter(|&&flag| flag).count() as f64 / chars.len() as f64
}

fn is_common_password(password: &str) -> bool {
    let normalized = normalize_substitutions(password);
    COMMON_PASSWORDS
        .iter()
        .any(|common| normalize_substitutions(common) == normalized)
}

fn normalize_substitutions(password: &str) -> String {
    password
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            '0' => 'o',
            '1' | '!' => 'i',
            '3' => 'e',
            '4' | '@' => 'a',
            '5' | '$' => 's',
            '7' => 't',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use secrecy::ExposeSecret;

    #[test]
    fn test_rejects_empty_and_missing() {
        let policy = PasswordPolicy::default();
        let prompter = ScriptedPrompter::new();

        assert!(!policy.validate(None, &prompter).unwrap());
        assert!(!policy.validate(Some(""), &prompter).unwrap());
        assert_eq!(policy.check(""), vec![PolicyViolation::Empty]);
    }

    #[test]
    fn test_rejects_weak_passwords_without_confirmation() {
        let policy = PasswordPolicy::default();
        let prompter = ScriptedPrompter::new();

        for weak in ["password", "passw0rd", "123456789", "pass", "qwerty", "abcdefgh", "aaaaaaaa"] {
            assert!(!policy.validate(Some(weak), &prompter).unwrap(), "{} accepted", weak);
        }

        // Weak passwords never reach the confirmation prompt.
        assert_eq!(prompter.warnings().len(), 7);
        assert!(prompter.warnings().iter().all(|w| w == TOO_WEAK_MESSAGE));
    }

    #[test]
    fn test_short_numeric_rejected() {
        let policy = PasswordPolicy::default();
        assert!(!policy.check("482913").is_empty());
        assert!(!policy.check("12345").is_empty());
    }

    #[test]
    fn test_accepts_strong_password_with_matching_confirmation() {
        let policy = PasswordPolicy::default();
        let prompter = ScriptedPrompter::new().with_passwords(["biTTensor"]);

        assert!(policy.validate(Some("biTTensor"), &prompter).unwrap());
        assert_eq!(prompter.remaining_passwords(), 0);
    }

    #[test]
    fn test_rejects_mismatched_confirmation() {
        let policy = PasswordPolicy::default();
        let prompter = ScriptedPrompter::new().with_passwords(["biTTenso"]);

        assert!(!policy.validate(Some("biTTensor"), &prompter).unwrap());
        assert_eq!(prompter.warnings(), vec![MISMATCH_MESSAGE.to_string()]);
    }

    #[test]
    fn test_confirmation_prompt_failure_is_error() {
        let policy = PasswordPolicy::default();
        let prompter = ScriptedPrompter::new();

        let result = policy.validate(Some("biTTensor"), &prompter);
        assert!(matches!(result, Err(KeyFileError::PromptError(_))));
    }

    #[test]
    fn test_prompt_loops_until_valid() {
        let policy = PasswordPolicy::default();
        let prompter =
            ScriptedPrompter::new().with_passwords(["pass", "password", "asdury3294y", "asdury3294y"]);

        let password = policy.prompt_for_new_password(&prompter).unwrap();
        assert_eq!(password.expose_secret(), "asdury3294y");
        assert_eq!(prompter.remaining_passwords(), 0);
    }

    #[test]
    fn test_custom_strength_fn() {
        let lenient = PasswordPolicy::default().with_strength_fn(|_| 1.0);
        assert!(lenient.check("password").is_empty());

        let strict = PasswordPolicy::default().with_strength_fn(|_| 0.0);
        assert!(matches!(
            strict.check("correct-Horse-battery-staple!").as_slice(),
            [PolicyViolation::Strength { .. }]
        ));
    }

    #[test]
    fn test_strength_is_monotonic_in_complexity() {
        assert!(estimate_strength("biTTensor") < estimate_strength("biTTensor#2023xq"));
        assert!(estimate_strength("Tr0ub4dor&3-horse") > 0.5);
    }

    #[test]
    fn test_entropy_bits() {
        assert_eq!(entropy_bits("aaaa"), 0.0);
        assert!((entropy_bits("abcd") - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_weakness_factor() {
        assert_eq!(weakness_factor("123456789"), 1.0);
        assert_eq!(weakness_factor("zyxw"), 1.0);
        assert_eq!(weakness_factor("asdury3294y"), 0.0);
        assert!((weakness_factor("abcXq9") - 0.5).abs() < 1e-9);
    }
}
