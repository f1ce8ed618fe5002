use std::collections::HashSet;
use std::sync::Mutex;

/// Process-lifetime record of announced token ids.
#[derive(Debug, Default)]
pub(crate) struct Deduplicator {
    seen: Mutex<HashSet<String>>,
}

impl Deduplicator {
    /// Returns true exactly once per token id, no matter how many callers race on it.
    pub(crate) fn check_and_mark(&self, token_id: &str) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if seen.contains(token_id) {
            return false;
        }
        seen.insert(token_id.to_string())
    }

    pub(crate) fn len(&self) -> usize {
        match self.seen.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
