use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local fallback for the remote key-value backend, used when the
/// backend is not configured (local development, tests). Entries expire
/// lazily: an expired entry is dropped by the first read that touches it,
/// there is no background sweep.
#[derive(Clone)]
pub(crate) struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish()
    }
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) async fn put(&self, key: &str, value: String, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };

        self.entries.lock().await.insert(key.to_string(), entry);
    }

    pub(crate) async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some(entry) if Instant::now() <= entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Removes and returns the entry under `key` in a single lock
    /// acquisition, so two concurrent takes within the process cannot both
    /// observe the value. Expired entries are dropped and read as absent.
    pub(crate) async fn take(&self, key: &str) -> Option<String> {
        let entry = self.entries.lock().await.remove(key)?;

        if Instant::now() <= entry.expires_at {
            Some(entry.value)
        } else {
            None
        }
    }

    pub(crate) async fn delete(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}
