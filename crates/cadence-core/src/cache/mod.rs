//! Local event cache.
//!
//! The cache holds completions recorded on this device before (or without)
//! server confirmation, plus the last routine list fetched from the server.
//! It is a single shared resource: several views and background cleanups
//! write to it, so every mutation goes through [`LocalCache::modify`], which
//! reads the *current* document and writes the new one inside one exclusive
//! section. Never write back a list that was read before a remote call.
//!
//! # Module layout
//!
//! - [`LocalCache`] — raw document store keyed by [`CacheKey`].
//! - [`memory`] — in-process store, empty on first use.
//! - [`file`] — JSON files in a directory, guarded by an advisory lock.
//! - [`CacheService`] — typed read/write/read-modify-write over any store.
//!
//! Malformed documents read as empty; they never fail a caller.

pub mod file;
pub mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::day::DayPolicy;
use crate::error::ErrorCode;
use crate::lock::LockError;
use crate::model::event::events_from_records;
use crate::model::{ActivityRecord, CompletionEvent, EventId, Origin, Routine};

// ---------------------------------------------------------------------------
// Keys and errors
// ---------------------------------------------------------------------------

/// The fixed set of logical cache documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Last routine list fetched from the server.
    Routines,
    /// Locally recorded completion events.
    Activities,
}

impl CacheKey {
    /// File stem / storage name for this key.
    #[must_use]
    pub const fn stem(self) -> &'static str {
        match self {
            Self::Routines => "routines",
            Self::Activities => "activities",
        }
    }
}

/// Errors returned by cache stores.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("failed to encode cache contents: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backing storage refused the operation.
    #[error("cache storage unavailable: {0}")]
    Unavailable(String),

    /// The store returned without running the update.
    #[error("cache update was not applied")]
    NotApplied,
}

impl CacheError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } | Self::Unavailable(_) => ErrorCode::CacheWriteFailed,
            Self::Lock(err) => err.code(),
            Self::Encode(_) => ErrorCode::CacheEncodeFailed,
            Self::NotApplied => ErrorCode::InternalUnexpected,
        }
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Raw document store behind the cache.
pub trait LocalCache: Send + Sync {
    /// Current document for `key`, `None` if never written.
    fn load(&self, key: CacheKey) -> Result<Option<String>, CacheError>;

    /// Replace the document for `key` with the output of `f`, which receives
    /// the current document. Load, `f`, and store form one exclusive section.
    fn modify(
        &self,
        key: CacheKey,
        f: &mut dyn FnMut(Option<String>) -> Result<String, CacheError>,
    ) -> Result<(), CacheError>;

    /// Overwrite the document for `key`.
    fn store(&self, key: CacheKey, doc: String) -> Result<(), CacheError> {
        self.modify(key, &mut |_| Ok(doc.clone()))
    }
}

// ---------------------------------------------------------------------------
// Typed service
// ---------------------------------------------------------------------------

/// Typed access to the cache documents, shared by every caller in the process.
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn LocalCache>,
    policy: DayPolicy,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl CacheService {
    pub fn new(store: Arc<dyn LocalCache>, policy: DayPolicy) -> Self {
        Self { store, policy }
    }

    /// Service over a fresh [`MemoryCache`].
    #[must_use]
    pub fn in_memory(policy: DayPolicy) -> Self {
        Self::new(Arc::new(MemoryCache::new()), policy)
    }

    #[must_use]
    pub const fn policy(&self) -> DayPolicy {
        self.policy
    }

    /// Locally recorded completions, all stamped [`Origin::Local`].
    #[must_use]
    pub fn activities(&self) -> Vec<CompletionEvent> {
        match self.store.load(CacheKey::Activities) {
            Ok(doc) => self.decode_events(doc.as_deref()),
            Err(err) => {
                warn!(error = %err, "could not read local activities, treating as empty");
                Vec::new()
            }
        }
    }

    /// Replace the local activity list in one write.
    pub fn write_activities(&self, events: &[CompletionEvent]) -> Result<(), CacheError> {
        let doc = serde_json::to_string(events)?;
        self.store.store(CacheKey::Activities, doc)
    }

    /// Read-modify-write of the current local activity list.
    pub fn update_activities<R>(
        &self,
        f: impl FnOnce(&mut Vec<CompletionEvent>) -> R,
    ) -> Result<R, CacheError> {
        let mut f = Some(f);
        let mut out = None;
        self.store.modify(CacheKey::Activities, &mut |doc| {
            let mut events = self.decode_events(doc.as_deref());
            if let Some(f) = f.take() {
                out = Some(f(&mut events));
            }
            Ok(serde_json::to_string(&events)?)
        })?;
        out.ok_or(CacheError::NotApplied)
    }

    pub fn append_activity(&self, event: CompletionEvent) -> Result<(), CacheError> {
        self.update_activities(|events| events.push(event))
    }

    /// Remove one event by id. Returns whether it was present.
    pub fn remove_activity(&self, id: &EventId) -> Result<bool, CacheError> {
        self.update_activities(|events| {
            let before = events.len();
            events.retain(|event| &event.id != id);
            events.len() != before
        })
    }

    /// Remove every event matching `predicate`. Returns how many were removed.
    pub fn remove_activities_where(
        &self,
        predicate: impl Fn(&CompletionEvent) -> bool,
    ) -> Result<usize, CacheError> {
        self.update_activities(|events| {
            let before = events.len();
            events.retain(|event| !predicate(event));
            before - events.len()
        })
    }

    /// Last routine list seen from the server, empty if none or unreadable.
    #[must_use]
    pub fn routines(&self) -> Vec<Routine> {
        let doc = match self.store.load(CacheKey::Routines) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(error = %err, "could not read cached routines, treating as empty");
                return Vec::new();
            }
        };
        let Some(doc) = doc else {
            return Vec::new();
        };
        serde_json::from_str(&doc).unwrap_or_else(|err| {
            warn!(error = %err, "cached routines are malformed, treating as empty");
            Vec::new()
        })
    }

    pub fn write_routines(&self, routines: &[Routine]) -> Result<(), CacheError> {
        let doc = serde_json::to_string(routines)?;
        self.store.store(CacheKey::Routines, doc)
    }

    fn decode_events(&self, doc: Option<&str>) -> Vec<CompletionEvent> {
        let Some(doc) = doc else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<ActivityRecord>>(doc) {
            Ok(records) => events_from_records(records, Origin::Local, self.policy),
            Err(err) => {
                warn!(error = %err, "cached activities are malformed, treating as empty");
                Vec::new()
            }
        }
    }
}
