// Session store module
// Key-addressed persistence for the credential pair and the second-factor handshake state

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use thiserror::Error;

/// Storage failures
///
/// These are fatal to whichever operation triggered them; nothing in the
/// session layer retries or degrades around a broken store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The five storage slots of one session
///
/// Key names are fixed; a reader/writer mismatch here is a silent
/// total-state-loss bug, so every access goes through this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    AccessToken,
    RefreshToken,
    TempToken,
    UserId,
    Timestamp,
}

impl Slot {
    pub const ALL: [Slot; 5] = [
        Slot::AccessToken,
        Slot::RefreshToken,
        Slot::TempToken,
        Slot::UserId,
        Slot::Timestamp,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Slot::AccessToken => "access_token",
            Slot::RefreshToken => "refresh_token",
            Slot::TempToken => "temp_token",
            Slot::UserId => "user_id",
            Slot::Timestamp => "timestamp",
        }
    }
}

/// Snapshot of the three second-factor handshake slots
///
/// Each field is independently optional; there is no atomicity guarantee
/// across the three reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TempTokenState {
    pub temp_token: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: Option<String>,
}

/// Key/value persistence over the five session slots
///
/// The trait is the injection seam: the binary opens a `SqliteStore`, tests
/// substitute a `MemoryStore`. Reads and writes are synchronous and never
/// suspend; the async layers above call them directly.
pub trait TokenStore: Send + Sync {
    fn get(&self, slot: Slot) -> Result<Option<String>, StoreError>;
    fn put(&self, slot: Slot, value: &str) -> Result<(), StoreError>;
    fn delete(&self, slot: Slot) -> Result<(), StoreError>;

    /// Store a full credential pair; both slots are written together
    fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), StoreError> {
        self.put(Slot::AccessToken, access)?;
        self.put(Slot::RefreshToken, refresh)
    }

    fn get_access_token(&self) -> Result<Option<String>, StoreError> {
        self.get(Slot::AccessToken)
    }

    fn get_refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.get(Slot::RefreshToken)
    }

    /// Store the temporary token triple issued between login step 1 and step 2
    fn set_temp_token(
        &self,
        temp_token: &str,
        user_id: &str,
        timestamp: &str,
    ) -> Result<(), StoreError> {
        self.put(Slot::TempToken, temp_token)?;
        self.put(Slot::UserId, user_id)?;
        self.put(Slot::Timestamp, timestamp)
    }

    fn get_temp_token(&self) -> Result<TempTokenState, StoreError> {
        Ok(TempTokenState {
            temp_token: self.get(Slot::TempToken)?,
            user_id: self.get(Slot::UserId)?,
            timestamp: self.get(Slot::Timestamp)?,
        })
    }

    /// Remove all five slots; idempotent, safe on an already-empty store
    fn clear_tokens(&self) -> Result<(), StoreError> {
        for slot in Slot::ALL {
            self.delete(slot)?;
        }
        Ok(())
    }

    /// Session predicate: authenticated iff an access token is present
    fn is_authenticated(&self) -> Result<bool, StoreError> {
        Ok(self.get_access_token()?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_store_is_unauthenticated() {
        let store = MemoryStore::new();
        assert!(!store.is_authenticated().unwrap());
        assert_eq!(store.get_access_token().unwrap(), None);
        assert_eq!(store.get_refresh_token().unwrap(), None);
        assert_eq!(store.get_temp_token().unwrap(), TempTokenState::default());
    }

    #[test]
    fn test_set_tokens_roundtrip() {
        let store = MemoryStore::new();
        store.set_tokens("A1", "R1").unwrap();
        assert_eq!(store.get_access_token().unwrap().as_deref(), Some("A1"));
        assert_eq!(store.get_refresh_token().unwrap().as_deref(), Some("R1"));
        assert!(store.is_authenticated().unwrap());
    }

    #[test]
    fn test_set_tokens_overwrites_both_slots() {
        let store = MemoryStore::new();
        store.set_tokens("A1", "R1").unwrap();
        store.set_tokens("A2", "R2").unwrap();
        assert_eq!(store.get_access_token().unwrap().as_deref(), Some("A2"));
        assert_eq!(store.get_refresh_token().unwrap().as_deref(), Some("R2"));
    }

    #[test]
    fn test_temp_token_roundtrip() {
        let store = MemoryStore::new();
        store.set_temp_token("T1", "U9", "1700000000").unwrap();
        let state = store.get_temp_token().unwrap();
        assert_eq!(state.temp_token.as_deref(), Some("T1"));
        assert_eq!(state.user_id.as_deref(), Some("U9"));
        assert_eq!(state.timestamp.as_deref(), Some("1700000000"));
        // Temp state alone does not authenticate
        assert!(!store.is_authenticated().unwrap());
    }

    #[test]
    fn test_clear_tokens_empties_all_slots() {
        let store = MemoryStore::new();
        store.set_tokens("A1", "R1").unwrap();
        store.set_temp_token("T1", "U9", "1700000000").unwrap();
        store.clear_tokens().unwrap();
        for slot in Slot::ALL {
            assert_eq!(store.get(slot).unwrap(), None);
        }
        assert!(!store.is_authenticated().unwrap());
    }

    #[test]
    fn test_clear_tokens_is_idempotent() {
        let store = MemoryStore::new();
        store.clear_tokens().unwrap();
        store.clear_tokens().unwrap();
        assert!(!store.is_authenticated().unwrap());
    }

    #[test]
    fn test_slot_keys_are_distinct() {
        for a in Slot::ALL {
            for b in Slot::ALL {
                if a != b {
                    assert_ne!(a.key(), b.key());
                }
            }
        }
    }

    proptest! {
        // For all credential pairs, setTokens followed by the getters
        // returns exactly what was stored.
        #[test]
        fn prop_credential_pair_roundtrip(access in ".*", refresh in ".*") {
            let store = MemoryStore::new();
            store.set_tokens(&access, &refresh).unwrap();
            prop_assert_eq!(store.get_access_token().unwrap(), Some(access));
            prop_assert_eq!(store.get_refresh_token().unwrap(), Some(refresh));
        }
    }
}
