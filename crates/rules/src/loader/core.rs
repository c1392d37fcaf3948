//! Core [`RuleLoader`] struct: filesystem-backed document loading with optional hot-reload.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::memory::InMemoryRuleRepository;
use crate::schema::{DocumentEnvelope, DocumentKind, RuleDocument};
use crate::validation::validate_document;

use super::error::{LoadResult, LoadStatus, Result, RuleError};
use super::watcher::handle_fs_event;

type DocumentKey = (DocumentKind, String);

/// State shared between the loader and its watcher callback.
pub(super) struct LoaderState {
    /// Every loaded document by kind and `metadata.id`.
    documents: RwLock<HashMap<DocumentKey, RuleDocument>>,
    /// Which document each file holds, so a deleted file can be unloaded.
    paths: RwLock<HashMap<PathBuf, DocumentKey>>,
    repository: Arc<InMemoryRuleRepository>,
}

impl LoaderState {
    /// Store `doc` as the content of `path`, replacing whatever the file held before.
    pub(super) fn upsert(&self, path: &Path, doc: RuleDocument) {
        let key = (doc.kind(), doc.metadata().id.clone());
        let previous = self
            .paths
            .write()
            .expect("paths lock poisoned")
            .insert(path.to_path_buf(), key.clone());
        if let Some(previous) = previous.filter(|p| *p != key) {
            self.unload(&previous);
        }

        self.repository.apply_document(&doc);
        self.documents
            .write()
            .expect("documents lock poisoned")
            .insert(key, doc);
    }

    /// Unload whatever document `path` held. Returns its key, if any.
    pub(super) fn remove_path(&self, path: &Path) -> Option<DocumentKey> {
        let key = self.paths.write().expect("paths lock poisoned").remove(path)?;
        self.unload(&key);
        Some(key)
    }

    fn unload(&self, key: &DocumentKey) {
        self.documents
            .write()
            .expect("documents lock poisoned")
            .remove(key);
        self.repository.remove(key.0, &key.1);
    }
}

/// Filesystem-backed document loader with optional hot-reload.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files, deserializes
/// them into [`RuleDocument`] instances via two-pass deserialization, and
/// applies each to the shared repository.
pub struct RuleLoader {
    rules_dir: PathBuf,
    state: Arc<LoaderState>,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl RuleLoader {
    /// Create a new loader for the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(rules_dir: PathBuf, repository: Arc<InMemoryRuleRepository>) -> Self {
        if !rules_dir.exists() {
            if let Err(e) = fs::create_dir_all(&rules_dir) {
                warn!(path = %rules_dir.display(), error = %e, "failed to create rules directory");
            }
        }
        Self {
            rules_dir,
            state: Arc::new(LoaderState {
                documents: RwLock::new(HashMap::new()),
                paths: RwLock::new(HashMap::new()),
                repository,
            }),
            _watcher: None,
        }
    }

    #[cfg(test)]
    pub(super) fn state(&self) -> &LoaderState {
        &self.state
    }

    /// Recursively scan the rules directory and load all YAML files.
    ///
    /// Dotfiles and non-YAML files are skipped. Parse errors are reported
    /// per-file but do not abort the scan.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        self.scan_dir_recursive(&self.rules_dir, &mut results)?;
        Ok(results)
    }

    fn scan_dir_recursive(&self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        // Later files win on duplicate ids; make that order stable.
        paths.sort();

        for path in paths {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    if path.is_file() {
                        results.push(LoadResult {
                            path,
                            status: LoadStatus::Skipped {
                                reason: "dotfile".to_string(),
                            },
                        });
                    }
                    continue;
                }
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            if !is_yaml(&path) {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            match self.load_file(&path) {
                Ok(doc) => {
                    let kind = doc.kind();
                    let id = doc.metadata().id.clone();
                    info!(id = %id, kind = %kind, path = %path.display(), "loaded document");
                    self.state.upsert(&path, doc);
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded { kind, id },
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load document");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// Parse and validate a single YAML file into a [`RuleDocument`] without storing it.
    pub fn load_file(&self, path: &Path) -> Result<RuleDocument> {
        let contents = fs::read_to_string(path)?;
        parse_document(&contents)
    }

    /// Start a filesystem watcher with 500ms debounce.
    ///
    /// On file create/modify the document is re-parsed and upserted. On file
    /// delete it is removed from the repository. Parse errors are logged as
    /// warnings and the previous version is kept.
    pub fn watch(&mut self) -> Result<()> {
        let state = Arc::clone(&self.state);

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => handle_fs_event(&event, &state),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )?;

        watcher.watch(&self.rules_dir, RecursiveMode::Recursive)?;

        let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %self.rules_dir.display(), "watching rules directory for changes (recursive)");
        self._watcher = Some(watcher);
        Ok(())
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    pub fn repository(&self) -> Arc<InMemoryRuleRepository> {
        Arc::clone(&self.state.repository)
    }

    /// Snapshot of every loaded document, ordered by kind and id.
    pub fn documents(&self) -> Vec<RuleDocument> {
        let guard = self.state.documents.read().expect("documents lock poisoned");
        let mut docs: Vec<(&DocumentKey, &RuleDocument)> = guard.iter().collect();
        docs.sort_by(|a, b| (a.0 .0 as u8, &a.0 .1).cmp(&(b.0 .0 as u8, &b.0 .1)));
        docs.into_iter().map(|(_, doc)| doc.clone()).collect()
    }

    pub fn document(&self, kind: DocumentKind, id: &str) -> Option<RuleDocument> {
        let guard = self.state.documents.read().expect("documents lock poisoned");
        guard.get(&(kind, id.to_string())).cloned()
    }

    /// Atomically write a document to `{id}.yml` and load it.
    ///
    /// Writes to a `.tmp` file first, then renames to the final path to
    /// avoid partial writes on crash.
    pub fn write_document(&self, doc: &RuleDocument) -> Result<PathBuf> {
        check_document(doc)?;
        let meta = doc.metadata();
        let final_path = self.rules_dir.join(format!("{}.yml", meta.id));
        let tmp_path = self.rules_dir.join(format!(".{}.tmp", meta.id));

        let yaml = doc.to_yaml().map_err(RuleError::Parse)?;
        fs::write(&tmp_path, yaml)?;
        fs::rename(&tmp_path, &final_path)?;

        info!(id = %meta.id, kind = %doc.kind(), path = %final_path.display(), "wrote document");

        self.state.upsert(&final_path, doc.clone());
        Ok(final_path)
    }

    /// Delete the file holding the given document and unload it.
    pub fn delete_document(&self, kind: DocumentKind, id: &str) -> Result<()> {
        let key = (kind, id.to_string());
        let path = {
            let paths = self.state.paths.read().expect("paths lock poisoned");
            paths
                .iter()
                .find(|(_, k)| **k == key)
                .map(|(p, _)| p.clone())
        };
        let Some(path) = path else {
            return Err(RuleError::Validation(format!("no {kind} document found for id '{id}'")));
        };

        fs::remove_file(&path)?;
        self.state.remove_path(&path);
        info!(id = %id, kind = %kind, "deleted document");
        Ok(())
    }
}

pub(super) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false)
}

/// Two-pass parse: read the envelope for `kind`, then the full document.
pub(super) fn parse_document(contents: &str) -> Result<RuleDocument> {
    let envelope: DocumentEnvelope = serde_yaml::from_str(contents)?;

    if envelope.metadata.id.is_empty() {
        return Err(RuleError::Validation(
            "metadata.id must not be empty".to_string(),
        ));
    }

    let doc = envelope.parse_full().map_err(|e| {
        RuleError::Validation(format!("failed to parse '{}': {}", envelope.metadata.id, e))
    })?;
    check_document(&doc)?;
    Ok(doc)
}

/// Reject documents with validation errors. Warnings are logged and let through.
fn check_document(doc: &RuleDocument) -> Result<()> {
    let result = validate_document(doc);
    let id = &doc.metadata().id;
    for warning in &result.warnings {
        warn!(id = %id, path = %warning.path, "{}", warning.message);
    }
    if result.valid {
        return Ok(());
    }
    let errors: Vec<String> = result
        .errors
        .iter()
        .map(|e| format!("{}: {}", e.path, e.message))
        .collect();
    Err(RuleError::Validation(format!(
        "{} '{}' is invalid: {}",
        doc.kind(),
        id,
        errors.join("; ")
    )))
}
