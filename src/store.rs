//! Shared project records
//!
//! Build workers for the same project agree on one locate endpoint through a
//! JSON document in the build output directory:
//!
//! ```json
//! { "/abs/project": { "port": 5678, "previousPort": 5677, "entry": "src/main.tsx", "outputDir": "..." } }
//! ```
//!
//! The document is re-read on every access so writes from other processes are
//! observed. Writes rewrite the whole document atomically (temp file + rename)
//! and keep any fields this crate does not know about.
//!
//! When the output directory cannot be read or written the store silently
//! degrades to an in-process map. That map is never authoritative across
//! processes and is evicted as soon as a durable write succeeds again.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// File name of the durable document inside the output directory
pub const RECORD_FILE_NAME: &str = "record.json";

/// Interval between reads while waiting for a published port
pub const FIND_PORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Coordination state for one project root
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    /// Published locate port, 0 when no listener is known
    #[serde(default)]
    pub port: u16,

    /// Port of the previous generation, only set by [`RecordStore::reset`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_port: Option<u16>,

    /// Build entry chosen for client injection (opaque here)
    #[serde(default)]
    pub entry: String,

    /// Directory backing the durable store
    #[serde(default)]
    pub output_dir: String,

    /// Fields written by other tools, preserved on rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single field update applied by [`RecordStore::set`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordField {
    Port(u16),
    PreviousPort(Option<u16>),
    Entry(String),
}

impl RecordField {
    fn apply(self, record: &mut ProjectRecord) {
        match self {
            Self::Port(port) => record.port = port,
            Self::PreviousPort(port) => record.previous_port = port,
            Self::Entry(entry) => record.entry = entry,
        }
    }
}

/// Record store error types. Only waiting can fail; I/O problems degrade
/// to the memory fallback instead.
#[derive(Debug)]
pub enum StoreError {
    PortTimeout { project_root: String, waited: Duration },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PortTimeout {
                project_root,
                waited,
            } => write!(
                f,
                "No locate port was published for {} within {:?}",
                project_root, waited
            ),
        }
    }
}

impl std::error::Error for StoreError {}

/// Process-shared record store keyed by absolute project root
pub struct RecordStore {
    output_dir: PathBuf,
    path: PathBuf,
    fallback: Mutex<HashMap<String, ProjectRecord>>,
}

impl RecordStore {
    /// Create a store backed by `<output_dir>/record.json`. Nothing is touched
    /// on disk until the first write.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        let path = output_dir.join(RECORD_FILE_NAME);
        Self {
            output_dir,
            path,
            fallback: Mutex::new(HashMap::new()),
        }
    }

    /// Path of the durable document
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Current record for a project, `None` if nothing was ever written
    pub async fn get(&self, project_root: &Path) -> Option<ProjectRecord> {
        let key = record_key(project_root);
        // A fallback entry only exists while the durable write for it failed
        if let Some(record) = self.fallback_get(&key) {
            return Some(record);
        }
        match self.read_document().await {
            Ok(document) => document.get(&key).and_then(decode_record),
            Err(e) => {
                tracing::debug!("Record store unreadable ({}), using memory fallback", e);
                self.fallback_get(&key)
            }
        }
    }

    /// Update one field of a project's record, creating the record if needed
    pub async fn set(&self, project_root: &Path, field: RecordField) {
        let key = record_key(project_root);
        self.update(&key, |record| field.apply(record)).await;
    }

    /// Begin a new generation: remember the old port and clear the live one
    pub async fn reset(&self, project_root: &Path) {
        let key = record_key(project_root);
        let previous_port = self.get(project_root).await.map(|record| record.port);
        self.update(&key, |record| {
            record.previous_port = previous_port;
            record.port = 0;
            record.entry.clear();
        })
        .await;
        tracing::debug!(
            "Reset record for {} (previous port {:?})",
            key,
            previous_port
        );
    }

    /// Wait until some process publishes a positive port for the project.
    ///
    /// Only the calling task is suspended. Fails once `timeout` elapses so a
    /// crashed publisher cannot hang its followers forever.
    pub async fn find_port(
        &self,
        project_root: &Path,
        timeout: Duration,
    ) -> Result<u16, StoreError> {
        let poll = async {
            loop {
                if let Some(port) = self
                    .get(project_root)
                    .await
                    .map(|record| record.port)
                    .filter(|port| *port > 0)
                {
                    return port;
                }
                tokio::time::sleep(FIND_PORT_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| StoreError::PortTimeout {
                project_root: record_key(project_root),
                waited: timeout,
            })
    }

    async fn update(&self, key: &str, modify: impl FnOnce(&mut ProjectRecord)) {
        let mut document = match self.read_document().await {
            Ok(document) => document,
            Err(e) => {
                tracing::debug!("Record store unreadable ({}), writing to memory", e);
                self.fallback_update(key, modify);
                return;
            }
        };

        let mut record = self
            .fallback_get(key)
            .or_else(|| document.get(key).and_then(decode_record))
            .unwrap_or_default();
        modify(&mut record);
        record.output_dir = self.output_dir.to_string_lossy().into_owned();

        let value = match serde_json::to_value(&record) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Failed to encode record for {}: {}", key, e);
                self.fallback_put(key, record);
                return;
            }
        };
        document.insert(key.to_string(), value);

        match self.write_document(&document).await {
            Ok(()) => self.fallback_remove(key),
            Err(e) => {
                tracing::debug!("Record store not writable ({}), writing to memory", e);
                self.fallback_put(key, record);
            }
        }
    }

    /// Read the whole document. A missing or malformed file is an empty document.
    async fn read_document(&self) -> io::Result<Map<String, Value>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e),
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                tracing::debug!("Ignoring malformed record store at {:?}", self.path);
                Ok(Map::new())
            }
        }
    }

    async fn write_document(&self, document: &Map<String, Value>) -> io::Result<()> {
        let content = serde_json::to_string_pretty(document)?;
        tokio::fs::create_dir_all(&self.output_dir).await?;

        // Per-process temp name: concurrent writers must not share one
        let temp_path = self
            .path
            .with_extension(format!("json.{}.tmp", std::process::id()));
        if let Err(e) = tokio::fs::write(&temp_path, content).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }
        Ok(())
    }

    fn fallback_get(&self, key: &str) -> Option<ProjectRecord> {
        self.fallback
            .lock()
            .ok()
            .and_then(|map| map.get(key).cloned())
    }

    fn fallback_update(&self, key: &str, modify: impl FnOnce(&mut ProjectRecord)) {
        if let Ok(mut map) = self.fallback.lock() {
            let record = map.entry(key.to_string()).or_default();
            modify(record);
            record.output_dir = self.output_dir.to_string_lossy().into_owned();
        }
    }

    fn fallback_put(&self, key: &str, record: ProjectRecord) {
        if let Ok(mut map) = self.fallback.lock() {
            map.insert(key.to_string(), record);
        }
    }

    fn fallback_remove(&self, key: &str) {
        if let Ok(mut map) = self.fallback.lock() {
            map.remove(key);
        }
    }
}

/// Key used in the shared document for a project root
pub fn record_key(project_root: &Path) -> String {
    project_root.to_string_lossy().into_owned()
}

fn decode_record(value: &Value) -> Option<ProjectRecord> {
    serde_json::from_value(value.clone())
        .map_err(|e| tracing::debug!("Ignoring unreadable project record: {}", e))
        .ok()
}
