//! In-memory gesture store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("gesture type [{gesture_type}] not found")]
    NotFound { gesture_type: String },
}

/// Outcome of [`GestureStore::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertResult {
    /// `true` if the gesture type had no value before the call.
    pub created: bool,
    /// The value that was replaced, if any.
    pub previous: Option<String>,
}

/// Maps gesture types to gestures.
///
/// One mutex guards the whole map. Every operation is a single map call, so a
/// lock poisoned by a panicking holder still guards a consistent map and is
/// recovered rather than propagated.
#[derive(Debug, Default)]
pub struct GestureStore {
    gestures: Mutex<HashMap<String, String>>,
}

impl GestureStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.gestures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces the gesture for `gesture_type`.
    pub fn upsert(&self, gesture_type: &str, gesture: &str) -> UpsertResult {
        let previous = self
            .lock()
            .insert(gesture_type.to_owned(), gesture.to_owned());
        debug!(
            %gesture_type,
            %gesture,
            previous = ?previous,
            "set gesture"
        );
        UpsertResult {
            created: previous.is_none(),
            previous,
        }
    }

    /// Returns the gesture stored for `gesture_type`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if nothing is stored under that type.
    pub fn get(&self, gesture_type: &str) -> Result<String, StoreError> {
        match self.lock().get(gesture_type) {
            Some(gesture) => Ok(gesture.clone()),
            None => {
                debug!(%gesture_type, "gesture type not found");
                Err(StoreError::NotFound {
                    gesture_type: gesture_type.to_owned(),
                })
            }
        }
    }

    /// Removes `gesture_type`, returning what was stored. Absent keys are not an error.
    pub fn delete(&self, gesture_type: &str) -> Option<String> {
        let removed = self.lock().remove(gesture_type);
        debug!(%gesture_type, was = ?removed, "removed gesture");
        removed
    }

    /// Empties the store and returns how many gestures were dropped.
    pub fn delete_all(&self) -> usize {
        let mut gestures = self.lock();
        let count = gestures.len();
        gestures.clear();
        debug!(count, "removed all gestures");
        count
    }

    /// All stored gestures, in no particular order.
    pub fn list_all(&self) -> Vec<String> {
        let gestures: Vec<String> = self.lock().values().cloned().collect();
        debug!(count = gestures.len(), "listing gestures");
        gestures
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
