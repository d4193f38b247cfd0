//! Table of requests currently forwarded upstream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::http::request::RequestId;

/// Maps a caller's request ID to the ID of its rewritten copy.
///
/// An entry exists from just before the rewritten request is handed to the
/// upstream until the response body ends, is dropped, or sending fails.
#[derive(Debug, Default)]
pub struct InFlight {
    map: Mutex<HashMap<RequestId, RequestId>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `original → rewritten` and return the handle that removes it.
    pub fn track(self: &Arc<Self>, original: RequestId, rewritten: RequestId) -> Release {
        self.lock().insert(original, rewritten);
        Release {
            table: Arc::clone(self),
            original,
            rewritten,
        }
    }

    /// Rewritten ID for `original`, if it is still in flight.
    pub fn get(&self, original: RequestId) -> Option<RequestId> {
        self.lock().get(&original).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove the entry only if it still points at `rewritten`; a caller that
    /// reused an ID for a newer request keeps that newer entry.
    fn remove(&self, original: RequestId, rewritten: RequestId) -> bool {
        let mut map = self.lock();
        if map.get(&original) == Some(&rewritten) {
            map.remove(&original);
            true
        } else {
            false
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, RequestId>> {
        self.map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Removes one in-flight entry when dropped.
#[derive(Debug)]
pub struct Release {
    table: Arc<InFlight>,
    original: RequestId,
    rewritten: RequestId,
}

impl Release {
    pub fn original(&self) -> RequestId {
        self.original
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        if self.table.remove(self.original, self.rewritten) {
            tracing::trace!(request_id = %self.original, upstream_id = %self.rewritten, "Request released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_removes_entry() {
        let table = Arc::new(InFlight::new());
        let (original, rewritten) = (RequestId::new(), RequestId::new());

        let release = table.track(original, rewritten);
        assert_eq!(table.get(original), Some(rewritten));
        assert_eq!(table.len(), 1);

        drop(release);
        assert_eq!(table.get(original), None);
        assert!(table.is_empty());
    }

    #[test]
    fn stale_release_keeps_newer_entry() {
        let table = Arc::new(InFlight::new());
        let original = RequestId::new();
        let (first, second) = (RequestId::new(), RequestId::new());

        let stale = table.track(original, first);
        let current = table.track(original, second);
        drop(stale);
        assert_eq!(table.get(original), Some(second));

        drop(current);
        assert!(table.is_empty());
    }
}
