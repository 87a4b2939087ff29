//! The document store: owns the canonical in-memory document and its
//! backing JSON file.
//!
//! Saving is best-effort after every committed mutation; a write failure is
//! logged and swallowed, the in-memory document stays authoritative. Import
//! replaces the whole document (last-writer-wins), with malformed JSON as the
//! only failure. Observers subscribe to a single "data changed" notification
//! fired after each committed mutation.

use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::Value;
use shared::Document;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::storage::normalize::normalize;

/// Failure loading or importing a document. Anything parseable is accepted
/// (the normalizer coerces it), so this only covers I/O and JSON syntax.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read document file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed document JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Which part of the document a committed mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    Students,
    Classes,
    Teachers,
    Enrollments,
    Sessions,
    Meta,
    Import,
}

type ChangeListener = Box<dyn Fn(ChangeSource) + Send + Sync>;

/// Owner of the canonical document. Services mutate it through
/// [`DocumentStore::mutate`] / [`DocumentStore::try_mutate`] so every commit
/// saves and notifies exactly once.
pub struct DocumentStore {
    document: Mutex<Document>,
    file_path: Option<PathBuf>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl DocumentStore {
    /// Store with no backing file; saves are skipped. Used by tests and by
    /// callers that only want the import/export surface.
    pub fn in_memory() -> Self {
        Self {
            document: Mutex::new(Document::default()),
            file_path: None,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Open a store backed by a JSON file. A missing file starts an empty
    /// document; an existing file is parsed and normalized. Unparseable JSON
    /// is the only load failure.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let path = path.as_ref().to_path_buf();
        let document = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let value: Value = serde_json::from_str(&raw)?;
            info!("Loaded tuition document from {}", path.display());
            normalize(&value)
        } else {
            info!(
                "No document at {}, starting with an empty one",
                path.display()
            );
            Document::default()
        };
        Ok(Self {
            document: Mutex::new(document),
            file_path: Some(path),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Register an observer called after every committed mutation.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(ChangeSource) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    /// Read-only access to the current document.
    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        let doc = self.document.lock().unwrap();
        f(&doc)
    }

    /// Apply a mutation, then save (best-effort) and notify observers.
    pub fn mutate<R>(&self, source: ChangeSource, f: impl FnOnce(&mut Document) -> R) -> R {
        let out = {
            let mut doc = self.document.lock().unwrap();
            let out = f(&mut doc);
            self.persist(&doc);
            out
        };
        self.notify(source);
        out
    }

    /// Apply a mutation that may find nothing to change. Saves and notifies
    /// only when the closure returns `Some`.
    pub fn try_mutate<R>(
        &self,
        source: ChangeSource,
        f: impl FnOnce(&mut Document) -> Option<R>,
    ) -> Option<R> {
        let out = {
            let mut doc = self.document.lock().unwrap();
            let out = f(&mut doc);
            if out.is_some() {
                self.persist(&doc);
            }
            out
        };
        if out.is_some() {
            self.notify(source);
        }
        out
    }

    /// Replace the whole document with normalized external JSON text.
    /// Malformed JSON leaves the in-memory document unchanged.
    pub fn import_json(&self, text: &str) -> Result<(), DocumentError> {
        let value: Value = serde_json::from_str(text)?;
        self.import_value(&value);
        Ok(())
    }

    /// Replace the whole document with a normalized JSON value. Any shape is
    /// accepted; there is no merge with the previous document.
    pub fn import_value(&self, value: &Value) {
        {
            let mut doc = self.document.lock().unwrap();
            *doc = normalize(value);
            self.persist(&doc);
        }
        info!("Imported document, previous contents replaced");
        self.notify(ChangeSource::Import);
    }

    /// Pretty-printed canonical document, as written to disk and to exports.
    pub fn export_pretty(&self) -> Result<String> {
        let doc = self.document.lock().unwrap();
        serde_json::to_string_pretty(&*doc).context("failed to serialize document")
    }

    /// Write the canonical document to an explicit path. Unlike the
    /// after-mutation save, failures here are reported to the caller.
    pub fn export_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = self.export_pretty()?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("failed to write export to {}", path.as_ref().display()))?;
        info!("Exported document to {}", path.as_ref().display());
        Ok(())
    }

    /// Best-effort save to the backing file. The store is a cache, not the
    /// system of record, so failures are logged and swallowed.
    fn persist(&self, doc: &Document) {
        let Some(path) = &self.file_path else {
            return;
        };
        match serde_json::to_string_pretty(doc) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    warn!("Failed to persist document to {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("Failed to serialize document for saving: {}", e),
        }
    }

    fn notify(&self, source: ChangeSource) {
        for listener in self.listeners.lock().unwrap().iter() {
            listener(source);
        }
    }
}
