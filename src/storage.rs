// Key-value storage seam and save hooks for the in-memory stores

use eyre::{Context, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

use crate::jsonl;
use crate::record::Record;

/// Flat key-value record storage; each value holds one whole collection
pub trait KeyValue {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Callback a store invokes with its whole collection after every mutation
pub type SaveHook<T> = Box<dyn FnMut(&[T]) -> Result<()>>;

/// Storage key for a collection: {prefix}_{name}
pub fn storage_key(prefix: &str, name: &str) -> String {
    format!("{}_{}", prefix, name)
}

/// Load a collection; `None` when the key has never been written
pub fn load_collection<T: Record, S: KeyValue + ?Sized>(
    storage: &S,
    key: &str,
) -> Result<Option<Vec<T>>> {
    let raw = storage
        .get(key)
        .with_context(|| format!("Failed to read '{}' from storage", key))?;
    Ok(raw.map(|raw| jsonl::decode_collection(key, &raw)))
}

/// Hook that rewrites `key` with the whole collection
pub fn save_hook<T: Record, S: KeyValue + 'static>(storage: Rc<S>, key: String) -> SaveHook<T> {
    Box::new(move |records: &[T]| -> Result<()> {
        let value = jsonl::encode_collection(records)?;
        storage
            .set(&key, &value)
            .with_context(|| format!("Failed to write '{}' to storage", key))?;
        debug!(key = %key, count = records.len(), "Saved collection");
        Ok(())
    })
}

/// Like [`save_hook`], but an empty collection removes the key
pub fn removing_save_hook<T: Record, S: KeyValue + 'static>(
    storage: Rc<S>,
    key: String,
) -> SaveHook<T> {
    let mut inner = save_hook(storage.clone(), key.clone());
    Box::new(move |records: &[T]| -> Result<()> {
        if records.is_empty() {
            storage
                .remove(&key)
                .with_context(|| format!("Failed to remove '{}' from storage", key))
        } else {
            inner(records)
        }
    })
}

/// In-memory storage, used by tests and as a scratch backend
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValue for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}
