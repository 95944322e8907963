/*!
 * Round-robin credential rotation.
 *
 * The pool is an explicit value handed to the translator at construction.
 * `next()` is called once per outbound attempt, so consecutive retries of the
 * same chunk use different credentials whenever the pool has more than one.
 */

use anyhow::{Result, bail};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Ordered pool of API credentials with a shared rotation cursor
pub struct CredentialPool {
    /// Credentials in caller-supplied order
    keys: Vec<String>,
    /// Monotonic cursor; the index used is `cursor % keys.len()`
    cursor: AtomicUsize,
}

impl CredentialPool {
    /// Create a pool; blank entries are dropped and at least one key must remain
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if keys.is_empty() {
            bail!("Credential pool must contain at least one API key");
        }

        Ok(Self {
            keys,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Next credential in rotation
    ///
    /// Concurrent callers each advance the cursor exactly once and never
    /// observe the same cursor value.
    pub fn next(&self) -> &str {
        let position = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        &self.keys[position]
    }

    /// Number of credentials in the pool
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false for a constructed pool
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// Keys never reach logs
impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("keys", &self.keys.len())
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}
