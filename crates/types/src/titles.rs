//! Key → label lookup used when rendering menu items.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use thiserror::Error;

use crate::MenuKey;

/// Maps a menu key to the text shown for it.
///
/// Returning `None` drops the key from the rendered menu.
pub trait LabelResolver: Send + Sync {
    fn resolve(&self, key: &MenuKey) -> Option<String>;
}

/// Resolver that shows every key as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawKeys;

impl LabelResolver for RawKeys {
    fn resolve(&self, key: &MenuKey) -> Option<String> {
        Some(key.as_str().to_string())
    }
}

/// Errors raised while loading a title map.
#[derive(Debug, Error)]
pub enum TitlesError {
    #[error("titles I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not a JSON object of string values.
    #[error("titles parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Closed map of recognized menu keys to localized labels.
///
/// Keys the backend returns that are missing here are not rendered, so the
/// map has to track the backend's menu vocabulary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuTitles {
    titles: IndexMap<String, String>,
}

impl MenuTitles {
    /// Empty map; resolves nothing.
    pub fn empty() -> Self {
        Self { titles: IndexMap::new() }
    }

    /// The stock Russian labels for the admin sections.
    pub fn russian_defaults() -> Self {
        let titles = [
            ("users", "Пользователи"),
            ("roles", "Роли"),
            ("audit", "Аудит"),
            ("dashboard", "Дашборд"),
            ("settings", "Настройки"),
        ]
        .into_iter()
        .map(|(key, label)| (key.to_string(), label.to_string()))
        .collect();
        Self { titles }
    }

    /// Parse a JSON object such as `{"users": "Users"}`.
    pub fn from_json_str(content: &str) -> Result<Self, TitlesError> {
        let titles: IndexMap<String, String> = serde_json::from_str(content)?;
        Ok(Self { titles })
    }

    /// Load a title map from a JSON file.
    pub fn load(path: &Path) -> Result<Self, TitlesError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn insert(&mut self, key: impl Into<String>, label: impl Into<String>) {
        self.titles.insert(key.into(), label.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.titles.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.titles.iter().map(|(key, label)| (key.as_str(), label.as_str()))
    }
}

impl LabelResolver for MenuTitles {
    fn resolve(&self, key: &MenuKey) -> Option<String> {
        self.get(key.as_str()).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_cover_admin_sections() {
        let titles = MenuTitles::russian_defaults();
        let keys: Vec<_> = titles.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["users", "roles", "audit", "dashboard", "settings"]);
        assert_eq!(titles.resolve(&MenuKey::from("users")).as_deref(), Some("Пользователи"));
        assert_eq!(titles.resolve(&MenuKey::from("settings")).as_deref(), Some("Настройки"));
    }

    #[test]
    fn unknown_key_does_not_resolve() {
        let titles = MenuTitles::russian_defaults();
        assert!(titles.resolve(&MenuKey::from("unknown_key")).is_none());
        assert!(titles.resolve(&MenuKey::from("Users")).is_none());
    }

    #[test]
    fn raw_keys_resolve_to_themselves() {
        assert_eq!(RawKeys.resolve(&MenuKey::from("foo")).as_deref(), Some("foo"));
    }

    #[test]
    fn loads_titles_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("titles.json");
        fs::write(&path, r#"{"users": "Users", "billing": "Billing"}"#).unwrap();

        let titles = MenuTitles::load(&path).unwrap();
        assert_eq!(titles.len(), 2);
        assert_eq!(titles.get("billing"), Some("Billing"));
    }

    #[test]
    fn rejects_non_string_labels() {
        assert!(matches!(MenuTitles::from_json_str(r#"{"users": 1}"#), Err(TitlesError::Parse(_))));
    }
}
