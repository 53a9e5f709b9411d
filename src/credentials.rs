use log::{error, info};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::db::{Database, CREDENTIAL_KEY};

/// The secret authorizing calls to the Gemini API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Error)]
pub enum StorageFailure {
    #[error("API key must not be empty")]
    Empty,
    #[error("Failed to save API key")]
    Write(#[source] anyhow::Error),
}

/// Single point of access to the stored API credential.
#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<Database>,
}

impl CredentialStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Absence is a normal outcome; storage errors are logged and read as absence.
    pub fn get(&self) -> Option<Credential> {
        match self.db.get(CREDENTIAL_KEY) {
            Ok(Some(value)) if !value.is_empty() => Some(Credential(value)),
            Ok(_) => None,
            Err(e) => {
                error!("failed to read credential: {:#}", e);
                None
            }
        }
    }

    pub fn set(&self, value: &str) -> Result<(), StorageFailure> {
        let value = value.trim();
        if value.is_empty() {
            return Err(StorageFailure::Empty);
        }
        self.db.set(CREDENTIAL_KEY, value).map_err(|e| {
            error!("failed to persist credential: {:#}", e);
            StorageFailure::Write(e)
        })?;
        info!("credential saved");
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.get().is_some()
    }

    /// When the credential was last written, as stored by SQLite (UTC).
    pub fn saved_at(&self) -> Option<String> {
        self.db.updated_at(CREDENTIAL_KEY).ok().flatten()
    }
}
