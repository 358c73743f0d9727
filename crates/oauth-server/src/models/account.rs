use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The slice of an account the protocol core needs: identity, login name and a
/// password check. Profile data lives elsewhere.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub login: String,
    salt: String,
    password_digest: String,
}

impl Account {
    /// Create an account with a fresh id and a salted password digest.
    #[must_use]
    pub fn new(login: impl Into<String>, password: &str) -> Self {
        let salt = uuid::Uuid::new_v4().simple().to_string();
        let password_digest = digest(&salt, password);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            login: login.into(),
            salt,
            password_digest,
        }
    }

    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        digest(&self.salt, password) == self.password_digest
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account").field("id", &self.id).field("login", &self.login).finish()
    }
}
