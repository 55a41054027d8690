//! Filesystem helpers shared by the config store and the stages.

use crate::errors::{ConfigError, StageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Reads a YAML document into `T`.
///
/// A missing file, an unreadable file, a document with no content and a
/// document that does not parse into `T` are all distinct [`ConfigError`]s.
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let is_blank = content
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#') || line == "---");
    if is_blank {
        return Err(ConfigError::Empty {
            path: path.to_path_buf(),
        });
    }

    let value = serde_yaml::from_str(&content).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "yaml file loaded successfully");
    Ok(value)
}

/// Creates each directory (and its parents) if it does not exist yet.
pub async fn create_directories<P: AsRef<Path>>(paths: &[P]) -> Result<(), StageError> {
    for path in paths {
        let path = path.as_ref();
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StageError::io(path, e))?;
        info!(path = %path.display(), "created directory");
    }
    Ok(())
}

/// Creates the parent directory of `path`, if it has one.
pub async fn ensure_parent(path: &Path) -> Result<(), StageError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_directories(&[parent]).await,
        _ => Ok(()),
    }
}

/// Writes `data` as pretty-printed JSON.
pub async fn save_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), StageError> {
    let body = serde_json::to_vec_pretty(data)?;
    ensure_parent(path).await?;
    tokio::fs::write(path, body)
        .await
        .map_err(|e| StageError::io(path, e))?;
    info!(path = %path.display(), "json file saved");
    Ok(())
}

/// Reads a JSON document into `T`.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StageError> {
    let body = tokio::fs::read(path)
        .await
        .map_err(|e| StageError::io(path, e))?;
    let value = serde_json::from_slice(&body)?;
    info!(path = %path.display(), "json file loaded");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_read_yaml_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_yaml::<BTreeMap<String, String>>(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
    }

    #[test]
    fn test_read_yaml_empty_and_comment_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.yaml");
        std::fs::write(&path, "# nothing here\n---\n\n").unwrap();

        let err = read_yaml::<BTreeMap<String, String>>(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Empty { .. }));
    }

    #[test]
    fn test_read_yaml_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "key: [unterminated\n").unwrap();

        let err = read_yaml::<BTreeMap<String, String>>(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_json_round_trip_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("scores.json");

        let mut scores = BTreeMap::new();
        scores.insert("rmse".to_string(), 0.5_f64);
        save_json(&path, &scores).await.unwrap();

        let loaded: BTreeMap<String, f64> = load_json(&path).await.unwrap();
        assert_eq!(loaded, scores);
    }
}
