//! Interactive prompts.
//!
//! The keyfile asks for passwords and overwrite confirmation through a
//! [`Prompter`], so the terminal can be swapped for scripted answers in
//! headless runs and tests.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;

/// Source of interactive answers.
pub trait Prompter: Send + Sync {
    /// Read a password without echoing it.
    fn password(&self, prompt: &str) -> io::Result<String>;

    /// Ask a yes/no question. Anything but an explicit yes is a no.
    fn confirm(&self, prompt: &str) -> io::Result<bool>;

    /// Show a non-fatal message to the user.
    fn warn(&self, message: &str);
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn password(&self, prompt: &str) -> io::Result<String> {
        rpassword::prompt_password(prompt)
    }

    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(matches!(answer.trim(), "y" | "Y"))
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Replays queued answers. Running out of answers is an I/O error, the same
/// way a closed stdin would be.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    passwords: Mutex<VecDeque<String>>,
    confirmations: Mutex<VecDeque<bool>>,
    warnings: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    /// Create a prompter with no queued answers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue password answers, consumed in order.
    pub fn with_passwords<I, S>(self, passwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.passwords).extend(passwords.into_iter().map(Into::into));
        self
    }

    /// Queue yes/no answers, consumed in order.
    pub fn with_confirmations<I>(self, answers: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        lock(&self.confirmations).extend(answers);
        self
    }

    /// Warnings shown so far.
    pub fn warnings(&self) -> Vec<String> {
        lock(&self.warnings).clone()
    }

    /// Number of password answers not yet consumed.
    pub fn remaining_passwords(&self) -> usize {
        lock(&self.passwords).len()
    }
}

impl Prompter for ScriptedPrompter {
    fn password(&self, prompt: &str) -> io::Result<String> {
        lock(&self.passwords)
            .pop_front()
            .ok_or_else(|| exhausted(prompt))
    }

    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        lock(&self.confirmations)
            .pop_front()
            .ok_or_else(|| exhausted(prompt))
    }

    fn warn(&self, message: &str) {
        lock(&self.warnings).push(message.to_string());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn exhausted(prompt: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("no scripted answer left for prompt {:?}", prompt),
    )
}
