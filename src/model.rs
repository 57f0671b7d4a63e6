use std::path::{Path, PathBuf};

use indexmap::IndexMap;

/// A parsed `KEY=VALUE` entry from a `.env` file or input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
    pub source: Option<PathBuf>,
    pub line: u32,
}

/// A resolved `.env` file and the entries read from it, in parse order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvFile {
    pub path: PathBuf,
    pub entries: Vec<Entry>,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>, entries: Vec<Entry>) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key/value view that keeps parse order.
    pub fn to_map(&self) -> IndexMap<&str, &str> {
        self.entries
            .iter()
            .map(|entry| (entry.key.as_str(), entry.value.as_str()))
            .collect()
    }

    /// Check a single key against this file.
    pub fn lookup(&self, key: &str) -> KeyLookup<'_> {
        match self.get(key) {
            Some(value) => KeyLookup::Found {
                path: &self.path,
                key: key.to_owned(),
                value,
            },
            None => KeyLookup::NotFound {
                path: &self.path,
                key: key.to_owned(),
            },
        }
    }
}

/// Outcome of checking one key in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLookup<'a> {
    Found {
        path: &'a Path,
        key: String,
        value: &'a str,
    },
    NotFound {
        path: &'a Path,
        key: String,
    },
}

impl KeyLookup<'_> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Variable expansion behavior for loader values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubstitutionMode {
    /// Keep values as parsed with no expansion.
    Disabled,
    /// Expand `$VAR`, `${VAR}` and `${VAR:-default}` placeholders.
    #[default]
    Expand,
}

/// Key validation behavior for parser and loader entry parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyParsingMode {
    /// Keys match `[A-Za-z0-9_.-]+`; `KEY: value` is also accepted.
    #[default]
    Strict,
    /// Any printable ASCII key except `=`, so `KEY: value` is not recognized.
    Permissive,
}
