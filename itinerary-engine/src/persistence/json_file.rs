//! Repository that keeps one JSON document per trip on disk.
//!
//! Files are named `<trip-id>.json` inside the repository directory, with
//! characters outside `[A-Za-z0-9._-]` percent-encoded. Each write goes to a
//! temporary file first and is renamed into place. All file access goes
//! through `tokio::fs`.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::{Day, DayId, Item, ItemId, Link, LinkId, Trip, TripId};
use crate::store::TripRecord;

use super::document::{self, Documents, TripDocument};
use super::{PersistenceError, TripRepository};

/// JSON-file repository rooted at a directory.
#[derive(Debug)]
pub struct JsonFileRepository {
    dir: PathBuf,
    /// Serializes read-modify-write cycles.
    lock: RwLock<()>,
}

fn storage_error(context: &str, e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Storage {
        message: format!("{context}: {e}"),
    }
}

/// File name for a trip's document.
fn file_name(trip_id: &TripId) -> String {
    let mut name = String::with_capacity(trip_id.as_str().len() + 5);
    for b in trip_id.as_str().bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-') {
            name.push(b as char);
        } else {
            name.push_str(&format!("%{b:02X}"));
        }
    }
    name.push_str(".json");
    name
}

impl JsonFileRepository {
    /// Repository rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for a trip.
    pub fn path_of(&self, trip_id: &TripId) -> PathBuf {
        self.dir.join(file_name(trip_id))
    }

    async fn read_document(&self, path: &Path) -> Result<Option<TripDocument>, PersistenceError> {
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(&format!("failed to read {}", path.display()), e)),
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| PersistenceError::Corrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }

    /// Load every document in the directory.
    async fn read_all(&self) -> Result<Documents, PersistenceError> {
        let mut docs = Documents::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(docs),
            Err(e) => return Err(storage_error("failed to read repository directory", e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_error("failed to read directory entry", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let is_file = entry
                .file_type()
                .await
                .map_err(|e| storage_error("failed to read directory entry", e))?
                .is_file();
            if !is_file {
                continue;
            }
            if let Some(doc) = self.read_document(&path).await? {
                docs.insert(doc.trip.id.clone(), doc);
            }
        }
        Ok(docs)
    }

    async fn write_document(&self, doc: &TripDocument) -> Result<(), PersistenceError> {
        let path = self.path_of(&doc.trip.id);
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| storage_error("failed to serialize document", e))?;

        let tmp = path.with_extension("json.tmp");
        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage_error(&format!("failed to replace {}", path.display()), e));
        }
        Ok(())
    }

    /// Run `change` over all documents and write back the ones it touched.
    async fn modify<R>(
        &self,
        change: impl FnOnce(&mut Documents) -> Result<R, PersistenceError>,
    ) -> Result<R, PersistenceError> {
        let _guard = self.lock.write().await;
        let before = self.read_all().await?;
        let mut after = before.clone();
        let result = change(&mut after)?;

        if after.iter().any(|(id, doc)| before.get(id) != Some(doc)) {
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| storage_error("failed to create repository directory", e))?;
        }
        for (id, doc) in &after {
            if before.get(id) != Some(doc) {
                self.write_document(doc).await?;
                debug!(trip = %id, "trip document written");
            }
        }
        for id in before.keys().filter(|id| !after.contains_key(*id)) {
            let path = self.path_of(id);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(storage_error(&format!("failed to remove {}", path.display()), e));
                }
                warn!(trip = %id, "trip document already gone");
            }
        }
        Ok(result)
    }
}

impl TripRepository for JsonFileRepository {
    async fn load_trip_graph(&self, trip_id: &TripId) -> Result<Option<TripRecord>, PersistenceError> {
        let _guard = self.lock.read().await;
        Ok(self
            .read_document(&self.path_of(trip_id))
            .await?
            .map(|doc| doc.to_record()))
    }

    async fn save_trip(&self, trip: &Trip) -> Result<(), PersistenceError> {
        self.modify(|docs| {
            document::save_trip(docs, trip);
            Ok(())
        })
        .await
    }

    async fn save_days(&self, days: &[Day]) -> Result<(), PersistenceError> {
        self.modify(|docs| document::save_days(docs, days)).await
    }

    async fn save_items(&self, items: &[Item]) -> Result<(), PersistenceError> {
        self.modify(|docs| document::save_items(docs, items)).await
    }

    async fn save_links(&self, links: &[Link]) -> Result<(), PersistenceError> {
        self.modify(|docs| document::save_links(docs, links)).await
    }

    async fn reorder(&self, day_id: &DayId, ordered_ids: &[ItemId]) -> Result<(), PersistenceError> {
        self.modify(|docs| document::reorder(docs, day_id, ordered_ids))
            .await
    }

    async fn delete_days(&self, ids: &[DayId]) -> Result<(), PersistenceError> {
        self.modify(|docs| {
            document::delete_days(docs, ids);
            Ok(())
        })
        .await
    }

    async fn delete_items(&self, ids: &[ItemId]) -> Result<(), PersistenceError> {
        self.modify(|docs| {
            document::delete_items(docs, ids);
            Ok(())
        })
        .await
    }

    async fn delete_links(&self, ids: &[LinkId]) -> Result<(), PersistenceError> {
        self.modify(|docs| {
            document::delete_links(docs, ids);
            Ok(())
        })
        .await
    }

    async fn delete_trip(&self, trip_id: &TripId) -> Result<(), PersistenceError> {
        self.modify(|docs| {
            docs.remove(trip_id);
            Ok(())
        })
        .await
    }
}
