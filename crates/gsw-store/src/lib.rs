#![deny(missing_docs)]
#![doc = "Durable file-per-result store. The filesystem is the only record of completed work."]

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use gsw_config::{Configuration, StorageKey};
use gsw_core::errors::{ErrorInfo, SweepError};
use gsw_core::provenance::RunProvenance;
use gsw_core::serde::{from_json_slice, to_canonical_json_bytes};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

/// File extension of stored results.
pub const RESULT_EXTENSION: &str = "json";

/// On-disk envelope around one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult<R> {
    /// Key the result was written under.
    pub key: StorageKey,
    /// Configuration that produced the result.
    pub config: Configuration,
    /// Opaque payload from the compute function.
    pub result: R,
    /// When and by what the result was written.
    pub provenance: RunProvenance,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, R> {
    key: &'a StorageKey,
    config: &'a Configuration,
    result: &'a R,
    provenance: RunProvenance,
}

/// Handle on a result directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStore {
    root: PathBuf,
}

fn store_error(code: &str, err: impl ToString, path: &Path) -> SweepError {
    SweepError::StoreIo(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

impl ResultStore {
    /// Opens (creating if needed) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SweepError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| store_error("store_root", err, &root))?;
        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds the result for `key`.
    pub fn path_for(&self, key: &StorageKey) -> PathBuf {
        self.root.join(format!("{key}.{RESULT_EXTENSION}"))
    }

    /// Whether a result for `key` has been written.
    pub fn exists(&self, key: &StorageKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Writes (or replaces) the result for `key`.
    ///
    /// The envelope is written to a temporary file inside the root and renamed
    /// over the final path, so a reader sees either the previous result or the
    /// new one in full.
    pub fn write<R: Serialize>(
        &self,
        key: &StorageKey,
        config: &Configuration,
        result: &R,
    ) -> Result<PathBuf, SweepError> {
        let envelope = EnvelopeRef {
            key,
            config,
            result,
            provenance: RunProvenance::now("gsw-store", env!("CARGO_PKG_VERSION")),
        };
        let bytes = to_canonical_json_bytes(&envelope)?;
        let path = self.path_for(key);
        let mut file = NamedTempFile::new_in(&self.root)
            .map_err(|err| store_error("store_tempfile", err, &self.root))?;
        file.write_all(&bytes)
            .and_then(|_| file.as_file().sync_all())
            .map_err(|err| store_error("store_write", err, file.path()))?;
        file.persist(&path)
            .map_err(|err| store_error("store_persist", err.error, &path))?;
        tracing::debug!(key = %key, path = %path.display(), "stored result");
        Ok(path)
    }

    /// Reads the envelope stored under `key`.
    pub fn read<R: DeserializeOwned>(&self, key: &StorageKey) -> Result<StoredResult<R>, SweepError> {
        let path = self.path_for(key);
        let bytes = fs::read(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => SweepError::NotFound(
                ErrorInfo::new("result_missing", "no stored result for key")
                    .with_context("key", key.as_str()),
            ),
            _ => store_error("store_read", err, &path),
        })?;
        let stored: StoredResult<R> = from_json_slice(&bytes)
            .map_err(|err| err.with_context("path", path.display().to_string()))?;
        if &stored.key != key {
            return Err(SweepError::StoreIo(
                ErrorInfo::new("key_mismatch", "envelope key differs from its file name")
                    .with_context("key", key.as_str())
                    .with_context("envelope_key", stored.key.as_str()),
            ));
        }
        Ok(stored)
    }

    /// Every key currently stored under the root.
    ///
    /// Files that are not `<key>.json` (including in-flight temporary files)
    /// are ignored.
    pub fn list_keys(&self) -> Result<BTreeSet<StorageKey>, SweepError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(err) => return Err(store_error("store_list", err, &self.root)),
        };
        let mut keys = BTreeSet::new();
        for entry in entries {
            let path = entry
                .map_err(|err| store_error("store_list", err, &self.root))?
                .path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(RESULT_EXTENSION)
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match StorageKey::parse(stem) {
                Ok(key) => {
                    keys.insert(key);
                }
                Err(_) => tracing::debug!(path = %path.display(), "skipping foreign file"),
            }
        }
        Ok(keys)
    }

    /// Configuration stored in the envelope under `key`, payload skipped.
    ///
    /// Digest keys cannot be decoded, so the envelope is the only way back
    /// to their configuration.
    pub fn read_config(&self, key: &StorageKey) -> Result<Configuration, SweepError> {
        self.read::<IgnoredAny>(key).map(|stored| stored.config)
    }

    /// Rebuilds the configuration of every stored result from its envelope.
    ///
    /// Fails on the first unreadable envelope; callers that must skip bad
    /// entries use [`list_keys`](Self::list_keys) and
    /// [`read_config`](Self::read_config).
    pub fn read_all_configs(&self) -> Result<Vec<Configuration>, SweepError> {
        self.list_keys()?
            .iter()
            .map(|key| self.read_config(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_key_plus_extension() {
        let store = ResultStore {
            root: PathBuf::from("/results"),
        };
        let key = StorageKey::parse("num_rows=10").expect("key");
        assert_eq!(
            store.path_for(&key),
            PathBuf::from("/results/num_rows=10.json")
        );
    }
}
