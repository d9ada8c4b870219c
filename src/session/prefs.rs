// ABOUTME: Persisted non-secret preferences: API base URL and language
// ABOUTME: Explicit choices are remembered for later runs

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::i18n::Lang;
use crate::storage::{load_json, save_json};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Lang>,
}

pub struct PreferenceStore {
    path: PathBuf,
    prefs: Preferences,
}

impl PreferenceStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let prefs = load_json(&path)?;
        Ok(Self { path, prefs })
    }

    pub fn get(&self) -> &Preferences {
        &self.prefs
    }

    pub fn remember_api_base(&mut self, api_base: &str) -> Result<()> {
        let trimmed = api_base.trim();
        if trimmed.is_empty() || self.prefs.api_base.as_deref() == Some(trimmed) {
            return Ok(());
        }
        self.prefs.api_base = Some(trimmed.to_string());
        save_json(&self.path, &self.prefs)
    }

    pub fn remember_language(&mut self, lang: Lang) -> Result<()> {
        if self.prefs.language == Some(lang) {
            return Ok(());
        }
        self.prefs.language = Some(lang);
        save_json(&self.path, &self.prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remembered_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut store = PreferenceStore::open(path.clone()).unwrap();
        assert_eq!(store.get(), &Preferences::default());
        store.remember_api_base(" https://vpn.example.com ").unwrap();
        store.remember_language(Lang::Ru).unwrap();

        let reopened = PreferenceStore::open(path).unwrap();
        assert_eq!(
            reopened.get().api_base.as_deref(),
            Some("https://vpn.example.com")
        );
        assert_eq!(reopened.get().language, Some(Lang::Ru));
    }

    #[test]
    fn test_blank_api_base_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let mut store = PreferenceStore::open(path.clone()).unwrap();
        store.remember_api_base("   ").unwrap();
        assert!(!path.exists());
    }
}
