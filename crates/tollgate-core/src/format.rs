//! Email and password format checks.

use std::fmt::Debug;
use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("static email pattern compiles")
});

/// Pluggable format validation used before any account write or lookup.
pub trait FormatChecker: Send + Sync + Debug {
    fn email_valid(&self, email: &str) -> bool;
    fn password_valid(&self, password: &str) -> bool;
}

/// Default checker: an email-shape regex and a minimum password length.
#[derive(Debug, Clone)]
pub struct SimpleChecker {
    min_password_length: usize,
}

impl SimpleChecker {
    pub fn new(min_password_length: usize) -> Self {
        Self {
            min_password_length,
        }
    }

    pub fn min_password_length(&self) -> usize {
        self.min_password_length
    }
}

impl Default for SimpleChecker {
    fn default() -> Self {
        Self::new(9)
    }
}

impl FormatChecker for SimpleChecker {
    fn email_valid(&self, email: &str) -> bool {
        email.len() <= 254 && EMAIL_RE.is_match(email)
    }

    fn password_valid(&self, password: &str) -> bool {
        password.chars().count() >= self.min_password_length
    }
}
