//! Task records handed to the ingestion queue, and the naming helpers that
//! keep task ids and stored file names unique.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue payload: one ingestion task per accepted file.
///
/// Serialized as `{"task_id": "...", "file_path": "..."}`. Ownership passes to
/// the queue once published; the gateway keeps no reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_id: String,
    pub file_path: String,
}

impl TaskMessage {
    /// Build a task for a file that has already been persisted at `path`.
    pub fn for_saved_file(path: &Path) -> Self {
        Self {
            task_id: new_task_id(),
            file_path: path.to_string_lossy().into_owned(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Generate a task id.
///
/// Uniqueness comes from a random UUID, so it does not depend on clock
/// resolution under high request rates.
pub fn new_task_id() -> String {
    format!("task_{}", Uuid::new_v4().simple())
}

/// Name under which an upload is stored: `<unix-nanos>_<8 hex>_<base name>`.
///
/// The timestamp keeps listings roughly chronological, the random component
/// separates uploads that land on the same clock tick.
pub fn stored_file_name(original: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{nanos}_{}_{}", &uuid[..8], base_name(original))
}

/// Last path component of a client-supplied file name.
///
/// Both `/` and `\` are treated as separators so a name cannot point outside
/// the storage root. Returns an empty string for names like `..` or `a/`.
pub fn base_name(original: &str) -> &str {
    let name = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    match name {
        "." | ".." => "",
        other => other,
    }
}

/// Lower-cased extension including the leading dot, or an empty string.
///
/// Matches the usual "last dot in the base name" rule: `archive.tar.GZ` gives
/// `.gz`, `README` gives `""`, and a dotfile like `.env` gives `.env`.
pub fn extension_of(filename: &str) -> String {
    let name = base_name(filename);
    match name.rfind('.') {
        Some(idx) => name[idx..].to_ascii_lowercase(),
        None => String::new(),
    }
}
