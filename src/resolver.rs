use std::path::{Path, PathBuf};

use crate::error::Error;

/// File name looked for when no path is given, or a directory is matched.
pub const DEFAULT_FILE: &str = ".env";

/// Turn the optional path argument into the list of files to check.
///
/// Without a pattern the nearest `.env` in `cwd` or one of its ancestors is
/// used. With a pattern, every glob match is returned in enumeration order;
/// directories stand for the `.env` file inside them. Relative patterns are
/// evaluated against `cwd` and reported relative to it.
pub fn resolve_paths(pattern: Option<&str>, cwd: &Path) -> Result<Vec<PathBuf>, Error> {
    let Some(pattern) = pattern else {
        return match find_upward(cwd, DEFAULT_FILE) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "found default dotenv file");
                Ok(vec![path])
            }
            None => Err(Error::NoEnvFile { pattern: None }),
        };
    };

    let paths = glob_paths(pattern, cwd)?;
    if paths.is_empty() {
        return Err(Error::NoEnvFile {
            pattern: Some(pattern.to_owned()),
        });
    }
    Ok(paths)
}

/// Search `start` and its ancestors for `file_name`, nearest first.
pub fn find_upward(start: &Path, file_name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(file_name))
        .inspect(|candidate| tracing::trace!(candidate = %candidate.display(), "probing"))
        .find(|candidate| candidate.is_file())
}

fn glob_paths(pattern: &str, cwd: &Path) -> Result<Vec<PathBuf>, Error> {
    let relative = Path::new(pattern).is_relative();
    let full_pattern = if relative {
        let base = glob::Pattern::escape(&cwd.to_string_lossy());
        format!("{base}{}{pattern}", std::path::MAIN_SEPARATOR)
    } else {
        pattern.to_owned()
    };

    let mut matches = Vec::new();
    for item in glob::glob(&full_pattern)? {
        match item {
            Ok(path) => matches.push(path),
            Err(err) => {
                tracing::warn!(
                    path = %err.path().display(),
                    error = %err.error(),
                    "skipping unreadable path"
                );
            }
        }
    }

    if matches.is_empty() {
        let literal = if relative {
            cwd.join(pattern)
        } else {
            PathBuf::from(pattern)
        };
        if literal.exists() {
            tracing::debug!(
                path = %literal.display(),
                "pattern matched nothing, using literal path"
            );
            matches.push(literal);
        }
    }

    let mut paths = Vec::with_capacity(matches.len());
    for path in matches {
        let path = if path.is_dir() {
            let candidate = path.join(DEFAULT_FILE);
            if !candidate.exists() {
                tracing::warn!(
                    dir = %path.display(),
                    "directory has no {DEFAULT_FILE} file, skipping"
                );
                continue;
            }
            candidate
        } else {
            path
        };

        let path = if relative {
            path.strip_prefix(cwd).map(Path::to_path_buf).unwrap_or(path)
        } else {
            path
        };
        paths.push(path);
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent");
        }
        std::fs::write(path, "A=1\n").expect("failed to write fixture file");
    }

    #[test]
    fn default_discovery_walks_up_to_nearest_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        touch(&dir.path().join(".env"));
        touch(&dir.path().join("a").join(".env"));

        let paths = resolve_paths(None, &nested).expect("should resolve");
        assert_eq!(paths, vec![dir.path().join("a").join(".env")]);
    }

    #[test]
    fn default_discovery_ignores_directories_named_env() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("child").join(".env")).expect("mkdir");
        touch(&dir.path().join(".env"));

        let found = find_upward(&dir.path().join("child"), DEFAULT_FILE);
        assert_eq!(found, Some(dir.path().join(".env")));
    }

    #[test]
    fn glob_returns_relative_matches_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("envs").join("b.env"));
        touch(&dir.path().join("envs").join("a.env"));
        touch(&dir.path().join("envs").join("c.env"));
        touch(&dir.path().join("envs").join("notes.txt"));

        let paths = resolve_paths(Some("envs/*.env"), dir.path()).expect("should resolve");
        assert_eq!(
            paths,
            vec![
                PathBuf::from("envs/a.env"),
                PathBuf::from("envs/b.env"),
                PathBuf::from("envs/c.env"),
            ]
        );
    }

    #[test]
    fn directory_match_uses_env_file_inside() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("svc").join(".env"));
        std::fs::create_dir_all(dir.path().join("empty")).expect("mkdir");

        let paths = resolve_paths(Some("svc"), dir.path()).expect("should resolve");
        assert_eq!(paths, vec![PathBuf::from("svc/.env")]);

        let err = resolve_paths(Some("empty"), dir.path()).expect_err("no file inside");
        assert!(matches!(err, Error::NoEnvFile { .. }));
    }

    #[test]
    fn literal_path_with_glob_metacharacters_is_accepted() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("[prod].env"));

        let paths = resolve_paths(Some("[prod].env"), dir.path()).expect("should resolve");
        assert_eq!(paths, vec![PathBuf::from("[prod].env")]);
    }

    #[test]
    fn absolute_pattern_stays_absolute() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("abs.env");
        touch(&file);

        let pattern = file.to_string_lossy().into_owned();
        let paths = resolve_paths(Some(pattern.as_str()), Path::new("/")).expect("should resolve");
        assert_eq!(paths, vec![file]);
    }

    #[test]
    fn zero_matches_is_no_env_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = resolve_paths(Some("*.env"), dir.path()).expect_err("nothing to match");
        assert!(matches!(
            err,
            Error::NoEnvFile { pattern: Some(ref pattern) } if pattern == "*.env"
        ));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = resolve_paths(Some("***"), dir.path()).expect_err("bad pattern");
        assert!(matches!(err, Error::Pattern(_)));
    }
}
