//! Content-addressed external file store
//!
//! Payloads are keyed by checksum: byte-identical content coming from any
//! number of resources is persisted once and always reported under the same
//! relative path. The checksum map is the only shared mutable state of a
//! conversion run; every lookup, path synthesis, write and insert happens under
//! one lock so two workers can never both treat a checksum as new.
//!
//! Where bytes end up is decided by a [`FileSink`]: [`DirectorySink`] writes
//! into the output pack, [`MemorySink`] keeps them in memory (dry runs, tests).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::Serialize;

use crate::classify::{ClassifiedValue, ContentType};
use crate::config::StoreConfig;
use crate::error::{ConvertError, Result};
use crate::naming::{sanitize_path, sanitize_segment};

/// Destination for externalized bytes
pub trait FileSink: Send + Sync {
    /// Write `content` at the pack-relative `path`
    fn persist(&self, path: &str, content: &[u8]) -> std::io::Result<()>;
}

/// Writes files below a root directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSink for DirectorySink {
    fn persist(&self, path: &str, content: &[u8]) -> std::io::Result<()> {
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, content)
    }
}

/// In-memory sink
#[derive(Debug, Default)]
pub struct MemorySink {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.files.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileSink for MemorySink {
    fn persist(&self, path: &str, content: &[u8]) -> std::io::Result<()> {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }
}

/// Reference to an externalized payload
///
/// `path` and `checksum` are the identity; `source_resource` is provenance of
/// the resource that asked for this reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalFileRef {
    pub path: String,
    pub checksum: String,
    pub detected_type: ContentType,
    pub source_resource: String,
}

#[derive(Debug)]
struct StoredFile {
    reference: ExternalFileRef,
    provenance: Vec<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    by_checksum: HashMap<String, StoredFile>,
    /// path -> checksum
    by_path: HashMap<String, String>,
    /// checksums in first-insert order
    order: Vec<String>,
}

/// Content-addressed store for one conversion run
pub struct FileStore {
    directory: String,
    persist_retries: u32,
    sink: Arc<dyn FileSink>,
    state: Mutex<StoreState>,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("directory", &self.directory)
            .field("persist_retries", &self.persist_retries)
            .field("files", &self.len())
            .finish()
    }
}

impl FileStore {
    pub fn new(config: &StoreConfig, sink: Arc<dyn FileSink>) -> Self {
        Self {
            directory: config.directory.trim_matches('/').to_string(),
            persist_retries: config.persist_retries,
            sink,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Store backed by a fresh [`MemorySink`]
    pub fn in_memory(config: &StoreConfig) -> Self {
        Self::new(config, Arc::new(MemorySink::new()))
    }

    /// Relative directory every stored path starts with
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Store a classified payload, or return the reference already holding it
    ///
    /// On persistence failure nothing is recorded and the error is returned;
    /// the caller decides whether to inline the value instead.
    pub fn add_from_classified(
        &self,
        source_resource: &str,
        key: &str,
        value: &ClassifiedValue,
    ) -> Result<ExternalFileRef> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(stored) = state.by_checksum.get_mut(&value.checksum) {
            if !stored.provenance.iter().any(|p| p == source_resource) {
                stored.provenance.push(source_resource.to_string());
            }
            tracing::debug!(
                path = %stored.reference.path,
                source = source_resource,
                "external file reused"
            );
            return Ok(ExternalFileRef {
                source_resource: source_resource.to_string(),
                ..stored.reference.clone()
            });
        }

        let path = self.free_path(&state, source_resource, key, value);
        self.persist(&path, &value.raw)?;

        let reference = ExternalFileRef {
            path: path.clone(),
            checksum: value.checksum.clone(),
            detected_type: value.detected_type,
            source_resource: source_resource.to_string(),
        };
        state.by_path.insert(path.clone(), value.checksum.clone());
        state.order.push(value.checksum.clone());
        state.by_checksum.insert(
            value.checksum.clone(),
            StoredFile {
                reference: reference.clone(),
                provenance: vec![source_resource.to_string()],
            },
        );
        tracing::debug!(%path, size = value.size(), "external file stored");

        Ok(reference)
    }

    /// Every stored file, in first-stored order
    pub fn files(&self) -> Vec<ExternalFileRef> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .order
            .iter()
            .filter_map(|checksum| state.by_checksum.get(checksum))
            .map(|stored| stored.reference.clone())
            .collect()
    }

    /// Every resource that referenced the payload with `checksum`
    pub fn provenance(&self, checksum: &str) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .by_checksum
            .get(checksum)
            .map(|stored| stored.provenance.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `<dir>/<source segments>/<key>`, suffixed with a checksum prefix when
    /// the path already holds different content
    fn free_path(
        &self,
        state: &StoreState,
        source_resource: &str,
        key: &str,
        value: &ClassifiedValue,
    ) -> String {
        let mut file_name = sanitize_segment(key);
        if !file_name.contains('.') {
            if let Some(ext) = value.detected_type.extension() {
                file_name = format!("{}.{}", file_name, ext);
            }
        }
        let base = format!(
            "{}/{}/{}",
            self.directory,
            sanitize_path(source_resource),
            file_name
        );
        if !state.by_path.contains_key(&base) {
            return base;
        }

        let short = with_suffix(&base, &value.checksum[..8.min(value.checksum.len())]);
        if !state.by_path.contains_key(&short) {
            return short;
        }
        with_suffix(&base, &value.checksum)
    }

    fn persist(&self, path: &str, content: &[u8]) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.sink.persist(path, content) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.persist_retries => {
                    attempt += 1;
                    tracing::warn!(path, attempt, error = %e, "external file write failed, retrying");
                }
                Err(e) => {
                    return Err(ConvertError::Persist {
                        path: path.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

/// `a/b/name.ext` -> `a/b/name-<suffix>.ext`
fn with_suffix(path: &str, suffix: &str) -> String {
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let renamed = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, suffix, ext),
        _ => format!("{}-{}", file, suffix),
    };
    match dir {
        Some(dir) => format!("{}/{}", dir, renamed),
        None => renamed,
    }
}
