//! Certificate fingerprint store
//!
//! Records the fingerprint of the first certificate presented by each
//! domain. Comparing a new fingerprint against a recorded one is left to
//! the caller; the store only records and retrieves.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Bytes per fingerprint line
const BYTES_PER_LINE: usize = 16;

static GLOBAL: Lazy<Arc<FingerprintStore>> = Lazy::new(|| Arc::new(FingerprintStore::new()));

/// Domain to fingerprint map shared by all fetches
#[derive(Debug, Default)]
pub struct FingerprintStore {
    entries: Mutex<HashMap<String, String>>,
}

impl FingerprintStore {
    /// Create an empty store
    pub fn new() -> Self {
        FingerprintStore {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide store used by default
    pub fn global() -> Arc<FingerprintStore> {
        Arc::clone(&GLOBAL)
    }

    /// Record a fingerprint, returning the one it replaced
    pub fn put(&self, domain: impl Into<String>, fingerprint: impl Into<String>) -> Option<String> {
        self.lock().insert(domain.into(), fingerprint.into())
    }

    /// Look up the fingerprint recorded for a domain
    pub fn get(&self, domain: &str) -> Option<String> {
        self.lock().get(domain).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-written.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Format a digest as colon separated hex, 16 bytes per line
///
/// `[0xab, 0xcd]` becomes `"ab:cd"`. A 32-byte digest spans two lines.
pub fn format_fingerprint(digest: &[u8]) -> String {
    digest
        .chunks(BYTES_PER_LINE)
        .map(|line| {
            line.iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(":")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
