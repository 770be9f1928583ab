//! Wakefile discovery and loading.

use crate::interpreter::Environ;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File names searched for, in order, in each directory.
pub const WAKEFILE_NAMES: [&str; 3] = ["wakefile", "Wakefile", "wake"];

/// Environment variable naming the wakefile to use.
pub const WAKEFILE_ENV: &str = "WAKEFILE";

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "WAKE_LOG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no wakefile found in {} or any parent directory", .start.display())]
    NotFound { start: PathBuf },

    #[error("wakefile `{}` does not exist", .path.display())]
    Missing { path: PathBuf },

    #[error("failed to read `{}`: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A located wakefile and its contents.
#[derive(Debug, Clone)]
pub struct Wakefile {
    pub path: PathBuf,
    pub contents: String,
}

impl Wakefile {
    /// The path as shown in diagnostics.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Look for a wakefile directly inside `dir`.
fn in_directory(dir: &Path) -> Option<PathBuf> {
    WAKEFILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Search `start` and its ancestors for a wakefile; the nearest one wins.
#[must_use]
pub fn find_upwards(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(in_directory)
}

/// Resolve which wakefile to use.
///
/// An explicit path wins (a directory is searched for a wakefile), then the
/// `WAKEFILE` environment variable, then the current directory and its parents.
///
/// # Errors
///
/// Returns [`ConfigError::Missing`] when an explicit path does not lead to a
/// wakefile and [`ConfigError::NotFound`] when the search comes up empty.
pub fn find_wakefile(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(WAKEFILE_ENV).map(PathBuf::from));

    if let Some(path) = explicit {
        if path.is_dir() {
            return in_directory(&path).ok_or(ConfigError::Missing { path });
        }
        if path.is_file() {
            return Ok(path);
        }
        return Err(ConfigError::Missing { path });
    }

    let start = std::env::current_dir().map_err(|source| ConfigError::Read {
        path: PathBuf::from("."),
        source,
    })?;
    find_upwards(&start).ok_or(ConfigError::NotFound { start })
}

/// Find and read the wakefile.
///
/// # Errors
///
/// Returns an error if no wakefile is found or it cannot be read.
pub fn load(explicit: Option<&Path>) -> Result<Wakefile, ConfigError> {
    let path = find_wakefile(explicit)?;
    debug!(path = %path.display(), "using wakefile");
    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    Ok(Wakefile { path, contents })
}

/// Snapshot of this process's environment. Non-UTF-8 entries are converted lossily.
#[must_use]
pub fn environ() -> Environ {
    std::env::vars_os()
        .map(|(key, value)| {
            (
                key.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_upwards_from_nested_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("Wakefile"), "build:\n  true\n").unwrap();

        let found = find_upwards(&nested).unwrap();
        assert_eq!(found, dir.path().join("Wakefile"));
    }

    #[test]
    fn test_nearest_wakefile_wins() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("sub");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("wakefile"), "").unwrap();
        fs::write(nested.join("wake"), "").unwrap();

        assert_eq!(find_upwards(&nested).unwrap(), nested.join("wake"));
    }

    #[test]
    fn test_name_order_within_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("wake"), "").unwrap();
        fs::write(dir.path().join("wakefile"), "").unwrap();

        assert_eq!(in_directory(dir.path()).unwrap(), dir.path().join("wakefile"));
    }

    #[test]
    fn test_explicit_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("wakefile");
        fs::write(&file, "build:\n  true\n").unwrap();

        assert_eq!(find_wakefile(Some(dir.path())).unwrap(), file);
        assert_eq!(find_wakefile(Some(file.as_path())).unwrap(), file);

        let loaded = load(Some(file.as_path())).unwrap();
        assert_eq!(loaded.contents, "build:\n  true\n");
    }

    #[test]
    fn test_explicit_path_missing() {
        let dir = TempDir::new().unwrap();
        let err = find_wakefile(Some(dir.path().join("nope").as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));

        let err = find_wakefile(Some(dir.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
    }

    #[test]
    fn test_environ_contains_path() {
        let env = environ();
        assert!(env.contains_key("PATH") || env.contains_key("Path"));
    }
}
