// Generic record trait for any persisted collection element

use serde::{Serialize, de::DeserializeOwned};

use crate::models::{Category, Task, User};

/// Core trait that any storable record must implement
pub trait Record: Serialize + DeserializeOwned + Clone + 'static {
    /// Unique identifier for this record
    fn id(&self) -> &str;

    /// Collection name for this record type (e.g., "todos", "categories")
    /// Combined with the configured prefix to form the storage key: {prefix}_{collection}
    fn collection_name() -> &'static str
    where
        Self: Sized;
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "todos"
    }
}

impl Record for Category {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "categories"
    }
}

impl Record for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "users"
    }
}
