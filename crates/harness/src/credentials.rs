//! Run identities for the application under test

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Password given to generated users
pub const DEFAULT_PASSWORD: &str = "password123";

/// Prefix of generated usernames
pub const DEFAULT_PREFIX: &str = "user_";

const SUFFIX_MIN: u32 = 100_000;
const SUFFIX_MAX: u32 = 999_999;

/// How the run obtains its identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CredentialMode {
    /// Fresh username per run, `<prefix><6 random digits>`
    Random { prefix: String, password: String },
    /// Seeded account that already exists in the application
    Fixed { username: String, password: String },
}

impl Default for CredentialMode {
    fn default() -> Self {
        CredentialMode::Random {
            prefix: DEFAULT_PREFIX.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

/// Identity used by one run; never persisted
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn fixed(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Username with a random six-digit suffix. Collisions are improbable,
    /// not impossible: there is no cross-run coordination.
    pub fn generate(prefix: &str, password: &str) -> Self {
        Self::generate_with(&mut rand::thread_rng(), prefix, password)
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, prefix: &str, password: &str) -> Self {
        let suffix = rng.gen_range(SUFFIX_MIN..=SUFFIX_MAX);
        Self {
            username: format!("{}{}", prefix, suffix),
            password: password.to_string(),
        }
    }

    pub fn from_mode(mode: &CredentialMode) -> Self {
        match mode {
            CredentialMode::Random { prefix, password } => Self::generate(prefix, password),
            CredentialMode::Fixed { username, password } => Self::fixed(username, password),
        }
    }
}
