use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const USER_ID_ENV: &str = "SEEKR_USER_ID";
pub const TOKEN_ENV: &str = "SEEKR_TOKEN";

/// Who is calling, and a bearer token for the record store.
///
/// Either may be absent; callers treat that as "not signed in".
pub trait AuthProvider {
    fn current_user(&self) -> Option<String>;
    fn store_token(&self) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: String,
    pub token: String,
}

pub fn credentials(auth: &dyn AuthProvider) -> Option<Credentials> {
    let user_id = auth.current_user().filter(|u| !u.is_empty())?;
    let token = auth.store_token().filter(|t| !t.is_empty())?;
    Some(Credentials { user_id, token })
}

/// Credentials persisted by `seekr login`, optionally overridden by
/// `SEEKR_USER_ID` / `SEEKR_TOKEN`.
#[derive(Debug, Clone, Default)]
pub struct SessionAuth {
    session: Option<Credentials>,
}

impl SessionAuth {
    pub fn new(session: Option<Credentials>) -> Self {
        Self { session }
    }

    /// Loads the session file; a missing file means nobody is signed in.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file: {}", path.display()))?;
        let session: Credentials = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed session file: {}", path.display()))?;
        Ok(Self::new(Some(session)))
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(std::env::var(USER_ID_ENV).ok(), std::env::var(TOKEN_ENV).ok())
    }

    /// Both values replace the session outright; one alone patches an
    /// existing session.
    fn with_overrides(mut self, user_id: Option<String>, token: Option<String>) -> Self {
        if let (Some(user_id), Some(token)) = (&user_id, &token) {
            self.session = Some(Credentials {
                user_id: user_id.clone(),
                token: token.clone(),
            });
        } else if let Some(session) = self.session.as_mut() {
            if let Some(user_id) = user_id {
                session.user_id = user_id;
            }
            if let Some(token) = token {
                session.token = token;
            }
        }
        self
    }

    pub fn save(credentials: &Credentials, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(credentials)?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write session file: {}", path.display()))?;
        Ok(())
    }

    /// Removes the session file. Returns whether one existed.
    pub fn clear(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove session file: {}", path.display()))?;
        Ok(true)
    }
}

impl AuthProvider for SessionAuth {
    fn current_user(&self) -> Option<String> {
        self.session.as_ref().map(|s| s.user_id.clone())
    }

    fn store_token(&self) -> Option<String> {
        self.session.as_ref().map(|s| s.token.clone())
    }
}

pub fn default_session_path() -> PathBuf {
    crate::config::data_dir().join("session.json")
}
