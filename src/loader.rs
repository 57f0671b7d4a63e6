use std::path::{Path, PathBuf};

use crate::env::HostEnv;
use crate::error::Error;
use crate::expand::expand;
use crate::model::{Entry, EnvFile, KeyParsingMode, SubstitutionMode};
use crate::parser::parse_str_with_source;
use crate::resolver::resolve_paths;

/// Load every file matching `pattern`, relative to the current directory,
/// expanding against a snapshot of the process environment.
pub fn from_pattern(pattern: &str) -> Result<LoadReport, Error> {
    let cwd = std::env::current_dir().map_err(|err| Error::io(".", err))?;
    EnvLoader::new()
        .pattern(pattern)
        .current_dir(cwd)
        .host(HostEnv::capture())
        .load()
}

/// Per-file results of a load, in resolution order.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub outcomes: Vec<Result<EnvFile, Error>>,
}

impl LoadReport {
    pub fn files(&self) -> impl Iterator<Item = &EnvFile> {
        self.outcomes.iter().filter_map(|outcome| outcome.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &Error> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().err())
    }

    pub fn files_read(&self) -> usize {
        self.files().count()
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Builder-style dotenv loader.
///
/// Nothing is written to the process environment; the host environment is
/// only read, through the [`HostEnv`] snapshot given to [`EnvLoader::host`].
#[derive(Debug, Clone)]
pub struct EnvLoader {
    pattern: Option<String>,
    current_dir: PathBuf,
    substitution_mode: SubstitutionMode,
    key_parsing_mode: KeyParsingMode,
    host: HostEnv,
}

impl EnvLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// File path, directory or glob pattern. Unset means upward `.env`
    /// discovery.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn substitution_mode(mut self, substitution_mode: SubstitutionMode) -> Self {
        self.substitution_mode = substitution_mode;
        self
    }

    pub fn key_parsing_mode(mut self, key_parsing_mode: KeyParsingMode) -> Self {
        self.key_parsing_mode = key_parsing_mode;
        self
    }

    pub fn host(mut self, host: HostEnv) -> Self {
        self.host = host;
        self
    }

    pub fn resolve(&self) -> Result<Vec<PathBuf>, Error> {
        resolve_paths(self.pattern.as_deref(), &self.current_dir)
    }

    /// Resolve, then read every file. Only resolution failures are returned
    /// as `Err`; a file that cannot be read is recorded in the report and
    /// the remaining files are still loaded.
    pub fn load(&self) -> Result<LoadReport, Error> {
        let paths = self.resolve()?;
        tracing::info!(count = paths.len(), "resolved dotenv files");

        let outcomes = paths
            .into_iter()
            .map(|path| {
                let outcome = self.load_file(&path);
                if let Err(err) = &outcome {
                    tracing::debug!(error = %err, "file failed to load");
                }
                outcome
            })
            .collect();
        Ok(LoadReport { outcomes })
    }

    /// Read, decode, parse and expand a single file.
    ///
    /// Relative paths are taken from the loader's current directory.
    pub fn load_file(&self, path: &Path) -> Result<EnvFile, Error> {
        let full_path = self.current_dir.join(path);
        let bytes = std::fs::read(&full_path).map_err(|err| Error::io(path, err))?;
        let content = std::str::from_utf8(&bytes).map_err(|source| Error::InvalidEncoding {
            path: path.to_path_buf(),
            source,
        })?;

        let entries = self.parse_only(content, Some(path));
        tracing::debug!(path = %path.display(), entries = entries.len(), "loaded dotenv file");
        Ok(EnvFile::new(path, entries))
    }

    /// Parse and expand text that did not come from disk.
    pub fn parse_only(&self, content: &str, source: Option<&Path>) -> Vec<Entry> {
        let expanding = self.substitution_mode == SubstitutionMode::Expand;
        let mut entries =
            parse_str_with_source(content, source, self.key_parsing_mode, expanding);
        if expanding {
            expand(&mut entries, &self.host);
        }
        entries
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self {
            pattern: None,
            current_dir: PathBuf::from("."),
            substitution_mode: SubstitutionMode::Expand,
            key_parsing_mode: KeyParsingMode::Strict,
            host: HostEnv::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_only_respects_substitution_mode() {
        let content = "FOO=bar\nBAZ=${FOO}baz\nLIT='$FOO'\n";

        let expanded = EnvLoader::new().parse_only(content, None);
        let values: Vec<_> = expanded.iter().map(|entry| entry.value.as_str()).collect();
        assert_eq!(values, ["bar", "barbaz", "$FOO"]);

        let raw = EnvLoader::new()
            .substitution_mode(SubstitutionMode::Disabled)
            .parse_only(content, None);
        let values: Vec<_> = raw.iter().map(|entry| entry.value.as_str()).collect();
        assert_eq!(values, ["bar", "${FOO}baz", "$FOO"]);
    }

    #[test]
    fn parse_only_consults_host_env() {
        let host: HostEnv = [("HOME", "/home/me")].into_iter().collect();
        let entries = EnvLoader::new()
            .host(host)
            .parse_only("DATA=$HOME/data\n", None);
        assert_eq!(entries[0].value, "/home/me/data");
    }

    #[test]
    fn backslashes_survive_expansion() {
        let host: HostEnv = [("HOME", "/home/me")].into_iter().collect();
        let content = "A=\"C:\\\\$HOME\"\nB='C:\\$HOME'\nC=C:\\dir\\$HOME\n";

        let entries = EnvLoader::new().host(host).parse_only(content, None);
        let values: Vec<_> = entries.iter().map(|entry| entry.value.as_str()).collect();
        assert_eq!(values, ["C:\\/home/me", "C:\\$HOME", "C:\\dir$HOME"]);
    }

    #[test]
    fn default_loader_does_not_see_process_env() {
        let entries = EnvLoader::new().parse_only("P=${PATH}\n", None);
        assert_eq!(entries[0].value, "${PATH}");
    }
}
