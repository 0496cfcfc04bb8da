//! Contains common, primitive types shared by both engines.
//!
//! Subscriber keys come from `slotmap`, so a removed subscriber's key is never
//! handed out again and a stale `unsubscribe` can't remove somebody else.

use slotmap::new_key_type;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

new_key_type! {
    /// Uniquely identifies a callback registered with `subscribe`.
    pub struct SubscriberId;
}

// Callbacks never run while one of these locks is held, so a poisoned lock
// still guards consistent data.

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
