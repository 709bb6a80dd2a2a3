use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::{
    fmt, fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::mapping::{self, DriverMappingShape};

/// The document families kept per season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    TeamMapping,
    DriverMapping,
    Schedule,
    FantasyScores,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::TeamMapping,
        DocumentKind::DriverMapping,
        DocumentKind::Schedule,
        DocumentKind::FantasyScores,
    ];

    pub fn file_stem(self) -> &'static str {
        match self {
            DocumentKind::TeamMapping => "team_mapping",
            DocumentKind::DriverMapping => "driver_mapping",
            DocumentKind::Schedule => "schedule",
            DocumentKind::FantasyScores => "fantasy_scores",
        }
    }

    /// What `load` hands back when nothing has been stored yet.
    pub fn empty(self) -> Value {
        match self {
            DocumentKind::TeamMapping => Value::Array(Vec::new()),
            _ => Value::Object(Map::new()),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// JSON documents on disk, one file per `(kind, year)`:
/// `<root>/<kind>_<year>.json`.
///
/// Writers are serialised so that merges see a consistent document. Files
/// are replaced atomically, so readers never observe a partial write.
pub struct DocumentStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, kind: DocumentKind, year: u16) -> PathBuf {
        self.root.join(format!("{}_{}.json", kind.file_stem(), year))
    }

    pub fn load(&self, kind: DocumentKind, year: u16) -> Result<Value, StoreError> {
        let path = self.path_for(kind, year);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(kind.empty()),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::json(path, e))
    }

    /// Replaces the stored document wholesale.
    pub fn save(&self, kind: DocumentKind, year: u16, doc: &Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        self.write_document(kind, year, doc)?;
        info!(%kind, year, "document saved");
        Ok(())
    }

    /// Shallow key-wise merge of `patch` into the stored object. A stored
    /// document that is not an object is discarded. Returns the merged
    /// document.
    pub fn merge(
        &self,
        kind: DocumentKind,
        year: u16,
        patch: Map<String, Value>,
    ) -> Result<Value, StoreError> {
        let _guard = self.write_lock.lock();
        let mut merged = match self.load(kind, year)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let touched = patch.len();
        for (key, value) in patch {
            merged.insert(key, value);
        }
        let merged = Value::Object(merged);
        self.write_document(kind, year, &merged)?;
        info!(%kind, year, keys = touched, "document merged");
        Ok(merged)
    }

    /// Returns whether a document was actually removed.
    pub fn delete(&self, kind: DocumentKind, year: u16) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock();
        let path = self.path_for(kind, year);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(%kind, year, "document deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%kind, year, "delete of missing document ignored");
                Ok(false)
            }
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Team mapping in its current shape.
    pub fn team_mapping(&self, year: u16) -> Result<Value, StoreError> {
        let raw = self.load(DocumentKind::TeamMapping, year)?;
        Ok(mapping::normalize_team_mapping(raw))
    }

    /// Driver mapping in its current shape. The season's team mapping is
    /// only read when the stored document predates team ids.
    pub fn driver_mapping(&self, year: u16) -> Result<Value, StoreError> {
        let shape = DriverMappingShape::parse(self.load(DocumentKind::DriverMapping, year)?);
        if !shape.is_legacy() {
            return Ok(shape.into_current(&[]));
        }
        debug!(year, "upgrading legacy driver mapping");
        let teams = mapping::team_entries(&self.team_mapping(year)?);
        Ok(shape.into_current(&teams))
    }

    fn write_document(&self, kind: DocumentKind, year: u16, doc: &Value) -> Result<(), StoreError> {
        let path = self.path_for(kind, year);
        fs::create_dir_all(&self.root).map_err(|e| StoreError::io(&self.root, e))?;

        let mut body = serde_json::to_vec_pretty(doc).map_err(|e| StoreError::json(&path, e))?;
        body.push(b'\n');

        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        tmp.write_all(&body).map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| StoreError::io(&path, e.error))?;
        Ok(())
    }
}
