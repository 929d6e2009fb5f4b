//! In-memory persistence port.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nutler_app::{SessionStore, StoreError};
use nutler_proto::UserId;

#[derive(Debug, Default)]
struct Slot {
    id: Option<UserId>,
    corrupt: bool,
    saves: usize,
    clears: usize,
}

/// [`SessionStore`] kept in memory. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Slot>>,
}

impl MemorySessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding a cached id.
    pub fn with_id(user_id: UserId) -> Self {
        let store = Self::new();
        store.lock().id = Some(user_id);
        store
    }

    /// Store whose value cannot be read until cleared.
    pub fn corrupt() -> Self {
        let store = Self::new();
        store.lock().corrupt = true;
        store
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Currently cached id.
    pub fn stored_id(&self) -> Option<UserId> {
        self.lock().id
    }

    /// Number of saves.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    /// Number of clears.
    pub fn clear_count(&self) -> usize {
        self.lock().clears
    }
}

impl SessionStore for MemorySessionStore {
    fn load_session_id(&self) -> Result<Option<UserId>, StoreError> {
        let slot = self.lock();
        if slot.corrupt {
            return Err(StoreError::Corrupt("nutler.userId is not a user id".into()));
        }
        Ok(slot.id)
    }

    fn save_session_id(&mut self, user_id: UserId) -> Result<(), StoreError> {
        let mut slot = self.lock();
        slot.id = Some(user_id);
        slot.corrupt = false;
        slot.saves += 1;
        Ok(())
    }

    fn clear_session_id(&mut self) -> Result<(), StoreError> {
        let mut slot = self.lock();
        slot.id = None;
        slot.corrupt = false;
        slot.clears += 1;
        Ok(())
    }
}
