//! Per-file mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async mutex per file tag.
///
/// Holding a file's guard serializes its clear, analyze and commit steps
/// against any other sequence for the same file. Different files never
/// contend.
#[derive(Debug, Clone, Default)]
pub struct FileLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `file`.
    pub async fn lock(&self, file: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks
                .entry(file.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of files that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_file_is_exclusive() {
        let locks = FileLocks::new();
        let guard = locks.lock("a.js").await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _guard = contender.lock("a.js").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_files_do_not_contend() {
        let locks = FileLocks::new();
        let _a = locks.lock("a.js").await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock("b.js")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
