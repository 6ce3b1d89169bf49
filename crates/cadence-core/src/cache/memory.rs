use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{CacheError, CacheKey, LocalCache};

/// In-process cache store. Starts empty; contents live as long as the value.
#[derive(Debug, Default)]
pub struct MemoryCache {
    docs: Mutex<HashMap<CacheKey, String>>,
    refuse_writes: AtomicBool,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with [`CacheError::Unavailable`].
    pub fn set_refuse_writes(&self, refuse: bool) {
        self.refuse_writes.store(refuse, Ordering::SeqCst);
    }
}

impl LocalCache for MemoryCache {
    fn load(&self, key: CacheKey) -> Result<Option<String>, CacheError> {
        let docs = self.docs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.get(&key).cloned())
    }

    fn modify(
        &self,
        key: CacheKey,
        f: &mut dyn FnMut(Option<String>) -> Result<String, CacheError>,
    ) -> Result<(), CacheError> {
        if self.refuse_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable(format!(
                "writes to '{}' are refused",
                key.stem()
            )));
        }
        let mut docs = self.docs.lock().unwrap_or_else(PoisonError::into_inner);
        let next = f(docs.get(&key).cloned())?;
        docs.insert(key, next);
        Ok(())
    }
}
