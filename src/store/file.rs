//! File-backed resource store
//!
//! Each object is a JSON file at `<root>/<kind>/<namespace>/<name>.json`.
//! Writes within one process are serialized; the version check is made
//! against what is on disk, so a stale copy is rejected with `Conflict`.

use crate::error::{CorralError, CorralResult};
use crate::model::{Kind, LabelSelector, ObjectRef};
use crate::names;
use crate::store::client::{ResourceStore, StoredObject};
use crate::store::provision_on_create;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// Resource store persisting objects as JSON files
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: Kind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    /// Path of an object; names are validated so they stay inside `root`
    fn object_path(&self, kind: Kind, r: &ObjectRef) -> CorralResult<PathBuf> {
        names::validate("namespace", &r.namespace)?;
        names::validate(kind.as_str(), &r.name)?;
        Ok(self
            .kind_dir(kind)
            .join(&r.namespace)
            .join(format!("{}.json", r.name)))
    }

    async fn read(&self, path: &Path) -> CorralResult<Option<StoredObject>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| unavailable(format!("reading {}", path.display()), e))?;

        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn write(&self, path: &Path, object: &StoredObject) -> CorralResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| unavailable(format!("creating {}", parent.display()), e))?;
        }

        // Write to a sibling and rename so readers never see a partial file
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(object)?;
        fs::write(&tmp, content)
            .await
            .map_err(|e| unavailable(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| unavailable(format!("renaming {}", tmp.display()), e))?;
        Ok(())
    }

    async fn dir_entries(dir: &Path) -> CorralResult<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut files = vec![];
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| unavailable(format!("reading {}", dir.display()), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| unavailable(format!("reading entry in {}", dir.display()), e))?
        {
            files.push(entry.path());
        }

        files.sort();
        Ok(files)
    }
}

fn unavailable(context: String, source: std::io::Error) -> CorralError {
    CorralError::Unavailable(format!("{}: {}", context, source))
}

#[async_trait]
impl ResourceStore for FileStore {
    async fn get(&self, kind: Kind, r: &ObjectRef) -> CorralResult<Option<StoredObject>> {
        self.read(&self.object_path(kind, r)?).await
    }

    async fn list(
        &self,
        kind: Kind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> CorralResult<Vec<StoredObject>> {
        let namespace_dirs = match namespace {
            Some(ns) => {
                names::validate("namespace", ns)?;
                vec![self.kind_dir(kind).join(ns)]
            }
            None => Self::dir_entries(&self.kind_dir(kind))
                .await?
                .into_iter()
                .filter(|p| p.is_dir())
                .collect(),
        };

        let mut objects = vec![];
        for dir in namespace_dirs {
            for path in Self::dir_entries(&dir).await? {
                if !path.extension().is_some_and(|ext| ext == "json") {
                    continue;
                }
                if let Some(object) = self.read(&path).await? {
                    if selector.matches(&object.meta.labels) {
                        objects.push(object);
                    }
                }
            }
        }

        Ok(objects)
    }

    async fn create(&self, kind: Kind, mut object: StoredObject) -> CorralResult<StoredObject> {
        let _guard = self.write_lock.lock().await;
        let path = self.object_path(kind, &object.object_ref())?;

        if path.exists() {
            return Err(CorralError::AlreadyExists {
                kind: kind.to_string(),
                name: object.meta.name,
            });
        }

        object.meta.version = 1;
        provision_on_create(kind, &mut object)?;
        self.write(&path, &object).await?;
        debug!("Created {} {} at {}", kind, object.object_ref(), path.display());
        Ok(object)
    }

    async fn update(&self, kind: Kind, mut object: StoredObject) -> CorralResult<StoredObject> {
        let _guard = self.write_lock.lock().await;
        let path = self.object_path(kind, &object.object_ref())?;

        let current = self
            .read(&path)
            .await?
            .ok_or_else(|| CorralError::not_found(kind.as_str(), &object.meta.name))?;
        if current.meta.version != object.meta.version {
            return Err(CorralError::conflict(kind.as_str(), &object.meta.name));
        }

        object.meta.version = current.meta.version + 1;
        object.meta.created_at = current.meta.created_at;
        self.write(&path, &object).await?;
        Ok(object)
    }

    async fn delete(&self, kind: Kind, r: &ObjectRef) -> CorralResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.object_path(kind, r)?;

        if !path.exists() {
            return Err(CorralError::not_found(kind.as_str(), &r.name));
        }

        fs::remove_file(&path)
            .await
            .map_err(|e| unavailable(format!("deleting {}", path.display()), e))?;
        debug!("Deleted {} {}", kind, r);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
