use chrono::{TimeZone, Utc};
use domain::{Admin, Live};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

mod file;

pub use file::JsonFileRepository;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store document {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode store document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Repository trait for data access abstraction
/// This allows switching between different storage backends (in-memory, filesystem)
pub trait Repository: Send + Sync {
    /// All lives, newest first, optionally restricted to one liveness state
    fn list_lives(&self, is_live: Option<bool>) -> Result<Vec<Live>>;

    /// Get a live by ID
    fn get_live(&self, id: &str) -> Result<Option<Live>>;

    /// Add a live to the repository
    fn add_live(&self, live: Live) -> Result<()>;

    /// Remove a live; returns whether it existed
    fn delete_live(&self, id: &str) -> Result<bool>;

    /// Look up an admin by (lowercased) email
    fn get_admin(&self, email: &str) -> Result<Option<Admin>>;

    /// Register an admin; returns false when the email is already taken
    fn add_admin(&self, admin: Admin) -> Result<bool>;
}

/// Everything a store holds, in the shape written to disk
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Collections {
    #[serde(default)]
    lives: HashMap<String, Live>,
    #[serde(default)]
    admins: HashMap<String, Admin>,
}

impl Collections {
    fn list_lives(&self, is_live: Option<bool>) -> Vec<Live> {
        let mut lives: Vec<Live> = self
            .lives
            .values()
            .filter(|live| is_live.is_none_or(|flag| live.is_live == flag))
            .cloned()
            .collect();
        domain::sort_newest_first(&mut lives);
        lives
    }

    fn add_admin(&mut self, admin: Admin) -> bool {
        if self.admins.contains_key(&admin.email) {
            return false;
        }
        self.admins.insert(admin.email.clone(), admin);
        true
    }
}

/// In-memory implementation of the Repository trait
pub struct InMemoryRepository {
    data: Arc<RwLock<Collections>>,
}

impl InMemoryRepository {
    /// Create an empty in-memory repository
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(Collections::default())),
        }
    }

    /// Create an in-memory repository pre-filled with sample lives
    pub fn with_demo_data() -> Self {
        let repo = Self::new();
        repo.populate_dummy_data();
        repo
    }

    fn populate_dummy_data(&self) {
        // Fixed point in time for consistent dummy data
        let fixed_time = Utc
            .with_ymd_and_hms(2024, 1, 1, 18, 0, 0)
            .single()
            .expect("Fixed datetime should be valid");

        let mut data = self
            .data
            .write()
            .expect("Failed to acquire write lock on store");
        for i in 0..4 {
            let live = Live {
                id: format!("demo-live-{i}"),
                title: format!("Demo stream {i}"),
                url: format!("https://www.youtube.com/embed/demo{i}"),
                // only the newest sample is on air
                is_live: i == 3,
                created_at: fixed_time + chrono::Duration::days(i),
            };
            data.lives.insert(live.id.clone(), live);
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for InMemoryRepository {
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
        self.data
            .write()
            .expect("Failed to acquire write lock on store")
            .lives
            .insert(live.id.clone(), live);
        Ok(())
    }

    fn delete_live(&self, id: &str) -> Result<bool> {
        Ok(self
            .data
            .write()
            .expect("Failed to acquire write lock on store")
            .lives
            .remove(id)
            .is_some())
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
        Ok(self
            .data
            .write()
            .expect("Failed to acquire write lock on store")
            .add_admin(admin))
    }
}
