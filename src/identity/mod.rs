//! Who the ledger is stored for. Without an identity the ledger lives under
//! the `local` root; with one, under `users/{id}`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{BudgetError, Result};

pub(crate) const LOCAL_ROOT: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct UserId(String);

impl UserId {
    pub(crate) fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BudgetError::Identity("user name cannot be empty".into()));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '-'))
        {
            return Err(BudgetError::Identity(format!(
                "'{name}' may only contain letters, digits, '_', '.', '@' and '-'"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage root for an optional identity.
pub(crate) fn storage_root(user: Option<&UserId>) -> String {
    match user {
        Some(id) => format!("users/{id}"),
        None => LOCAL_ROOT.to_string(),
    }
}

pub(crate) trait IdentityProvider {
    fn current_user(&self) -> Option<UserId>;
    fn sign_up(&mut self, name: &str) -> Result<UserId>;
    fn sign_in(&mut self, name: &str) -> Result<UserId>;
    fn sign_out(&mut self) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    users: BTreeSet<UserId>,
    #[serde(default)]
    active: Option<UserId>,
}

/// Registered names and the active session, kept in a JSON file.
pub(crate) struct LocalIdentity {
    path: Option<PathBuf>,
    state: SessionFile,
}

impl LocalIdentity {
    /// A missing file means nobody has signed up yet.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let state = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                BudgetError::Identity(format!("corrupt session file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionFile::default(),
            Err(e) => {
                return Err(BudgetError::Identity(format!(
                    "cannot read session file {}: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            state,
        })
    }

    #[cfg(test)]
    pub(crate) fn ephemeral() -> Self {
        Self {
            path: None,
            state: SessionFile::default(),
        }
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let text = serde_json::to_string_pretty(&self.state)?;
            std::fs::write(path, text)
        };
        write().map_err(|e| {
            BudgetError::Identity(format!("cannot write session file {}: {e}", path.display()))
        })
    }
}

impl IdentityProvider for LocalIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.state.active.clone()
    }

    fn sign_up(&mut self, name: &str) -> Result<UserId> {
        let id = UserId::parse(name)?;
        if !self.state.users.insert(id.clone()) {
            return Err(BudgetError::Identity(format!("user '{id}' already exists")));
        }
        self.state.active = Some(id.clone());
        self.save()?;
        info!(user = %id, "signed up");
        Ok(id)
    }

    fn sign_in(&mut self, name: &str) -> Result<UserId> {
        let id = UserId::parse(name)?;
        if !self.state.users.contains(&id) {
            return Err(BudgetError::Identity(format!("unknown user '{id}'")));
        }
        self.state.active = Some(id.clone());
        self.save()?;
        info!(user = %id, "signed in");
        Ok(id)
    }

    fn sign_out(&mut self) -> Result<()> {
        if let Some(id) = self.state.active.take() {
            self.save()?;
            info!(user = %id, "signed out");
        }
        Ok(())
    }
}
