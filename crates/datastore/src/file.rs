use crate::{Collections, Error, Repository, Result};
use domain::{Admin, Live};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Repository persisted as a single JSON document
///
/// The whole document is rewritten after every mutation, via a temporary
/// file renamed over the original.
pub struct JsonFileRepository {
    path: PathBuf,
    data: RwLock<Collections>,
}

impl JsonFileRepository {
    /// Open the store at `path`; a missing file starts an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| Error::Corrupt {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "store file not found, starting empty");
                Collections::default()
            }
            Err(source) => {
                return Err(Error::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &Collections) -> Result<()> {
        let encoded = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| Error::Io {
            path: self.path.display().to_string(),
            source,
        };
        std::fs::write(&tmp, encoded).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        tracing::debug!(path = %self.path.display(), "store persisted");
        Ok(())
    }

    /// Apply `f` to a copy under the write lock; the copy replaces the
    /// in-memory data only once it has been written to disk
    fn mutate<T>(&self, f: impl FnOnce(&mut Collections) -> (T, bool)) -> Result<T> {
        let mut data = self
            .data
            .write()
            .expect("Failed to acquire write lock on store");
        let mut next = data.clone();
        let (out, changed) = f(&mut next);
        if changed {
            self.persist(&next)?;
            *data = next;
        }
        Ok(out)
    }
}

impl Repository for JsonFileRepository {
    fn list_lives(&self, is_live: Option<bool>) -> Result<Vec<Live>> {
        Ok(self
            .data
            .read()
            .expect("Failed to acquire read lock on store")
            .list_lives(is_live))
    }

    fn get_live(&self, id: &str) -> Result<Option<Live>> {
        Ok(self
            .data
            .read()
            .expect("Failed to acquire read lock on store")
            .lives
            .get(id)
            .cloned())
    }

    fn add_live(&self, live: Live) -> Result<()> {
        self.mutate(|data| {
            data.lives.insert(live.id.clone(), live);
            ((), true)
        })
    }

    fn delete_live(&self, id: &str) -> Result<bool> {
        self.mutate(|data| {
            let removed = data.lives.remove(id).is_some();
            (removed, removed)
        })
    }

    fn get_admin(&self, email: &str) -> Result<Option<Admin>> {
        Ok(self
            .data
            .read()
            .expect("Failed to acquire read lock on store")
            .admins
            .get(email)
            .cloned())
    }

    fn add_admin(&self, admin: Admin) -> Result<bool> {
        self.mutate(|data| {
            let added = data.add_admin(admin);
            (added, added)
        })
    }
}
