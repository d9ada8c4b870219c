// ABOUTME: Registry of recently used servers, most recent first, capped in size
// ABOUTME: Holds host, user, port and client count only; credentials are never stored

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::storage::{load_json, save_json};

pub const MAX_SAVED_SERVERS: usize = 8;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedServer {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients_count: Option<u32>,
}

impl SavedServer {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    fn merge(&mut self, newer: SavedServer) {
        if newer.user.is_some() {
            self.user = newer.user;
        }
        if newer.listen_port.is_some() {
            self.listen_port = newer.listen_port;
        }
        if newer.clients_count.is_some() {
            self.clients_count = newer.clients_count;
        }
    }
}

pub struct ServerRegistry {
    path: Option<PathBuf>,
    entries: Vec<SavedServer>,
}

impl ServerRegistry {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Vec::new(),
        }
    }

    /// Opens the registry file. Fields other than the known ones are dropped
    /// on load, so anything sensitive left by older clients is not written back.
    pub fn open(path: PathBuf) -> Result<Self> {
        let mut entries: Vec<SavedServer> = load_json(&path)?;
        entries.retain(|entry| !entry.host.trim().is_empty());
        entries.truncate(MAX_SAVED_SERVERS);
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    pub fn list(&self) -> &[SavedServer] {
        &self.entries
    }

    pub fn most_recent(&self) -> Option<&SavedServer> {
        self.entries.first()
    }

    /// Merges by host, moves the entry to the front and keeps at most
    /// [`MAX_SAVED_SERVERS`] entries.
    pub fn upsert(&mut self, entry: SavedServer) -> Result<()> {
        let host = entry.host.trim().to_string();
        if host.is_empty() {
            return Ok(());
        }

        let mut merged = match self.entries.iter().position(|e| e.host == host) {
            Some(idx) => self.entries.remove(idx),
            None => SavedServer::new(host.clone()),
        };
        merged.merge(SavedServer { host, ..entry });

        self.entries.insert(0, merged);
        self.entries.truncate(MAX_SAVED_SERVERS);

        if let Some(path) = &self.path {
            save_json(path, &self.entries)?;
        }
        Ok(())
    }
}
