use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use subtle::ConstantTimeEq;
use vouch_core::{RecordId, StorageBackend, VouchError, VouchResult};

type Records = HashMap<String, Vec<u8>>;

/// Map-backed storage. Used by tests, the CLI's `memory` backend, and as
/// the inner backend of [`crate::BlindStorageWrapper`].
pub struct InMemoryBackend {
    data: Mutex<Records>,
}

fn lock_data(mutex: &Mutex<Records>) -> VouchResult<MutexGuard<'_, Records>> {
    mutex
        .lock()
        .map_err(|e| VouchError::Storage(format!("lock poisoned: {}", e)))
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Stored (id, value) pairs, for inspection in tests.
    pub fn entries(&self) -> Vec<(String, Vec<u8>)> {
        lock_data(&self.data)
            .map(|d| d.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        lock_data(&self.data).map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for InMemoryBackend {
    fn get(&self, record_id: &RecordId) -> VouchResult<Option<Vec<u8>>> {
        let data = lock_data(&self.data)?;
        Ok(data.get(record_id.as_str()).cloned())
    }

    fn put(&self, record_id: &RecordId, value: &[u8]) -> VouchResult<()> {
        let mut data = lock_data(&self.data)?;
        data.insert(record_id.as_str().to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, record_id: &RecordId) -> VouchResult<bool> {
        let mut data = lock_data(&self.data)?;
        Ok(data.remove(record_id.as_str()).is_some())
    }

    fn compare_and_swap(
        &self,
        record_id: &RecordId,
        expected: Option<&[u8]>,
        new_value: &[u8],
    ) -> VouchResult<bool> {
        let mut data = lock_data(&self.data)?;
        let matches = match (data.get(record_id.as_str()), expected) {
            (None, None) => true,
            (Some(current), Some(exp)) => current.as_slice().ct_eq(exp).into(),
            _ => false,
        };
        if matches {
            data.insert(record_id.as_str().to_string(), new_value.to_vec());
        }
        Ok(matches)
    }

    fn exists(&self, record_id: &RecordId) -> VouchResult<bool> {
        let data = lock_data(&self.data)?;
        Ok(data.contains_key(record_id.as_str()))
    }
}
