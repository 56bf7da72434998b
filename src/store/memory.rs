// In-memory session store

use std::collections::HashMap;
use std::sync::Mutex;

use super::{Slot, StoreError, TokenStore};

/// Volatile store backed by a HashMap
///
/// Used as the test substitute for the durable backend, and for callers that
/// explicitly want a session scoped to the process lifetime.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<&'static str, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, slot: Slot) -> Result<Option<String>, StoreError> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slots.get(slot.key()).cloned())
    }

    fn put(&self, slot: Slot, value: &str) -> Result<(), StoreError> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.insert(slot.key(), value.to_string());
        Ok(())
    }

    fn delete(&self, slot: Slot) -> Result<(), StoreError> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(slot.key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_slot() {
        let store = MemoryStore::new();
        assert_eq!(store.get(Slot::AccessToken).unwrap(), None);
    }

    #[test]
    fn test_put_then_get() {
        let store = MemoryStore::new();
        store.put(Slot::UserId, "42").unwrap();
        assert_eq!(store.get(Slot::UserId).unwrap().as_deref(), Some("42"));
    }

    #[test]
    fn test_delete_missing_slot_is_ok() {
        let store = MemoryStore::new();
        store.delete(Slot::TempToken).unwrap();
    }
}
