use dashmap::DashMap;
use std::sync::Arc;

/// Counts downloads currently streaming per storage key.
///
/// A lease is taken when a stream starts and released when the returned
/// guard is dropped, whether the stream finished or the client went away.
#[derive(Debug, Clone, Default)]
pub struct InFlightDownloads {
    active: Arc<DashMap<String, usize>>,
}

impl InFlightDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, key: &str) -> DownloadLease {
        *self.active.entry(key.to_string()).or_insert(0) += 1;
        DownloadLease {
            active: self.active.clone(),
            key: key.to_string(),
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.get(key).is_some_and(|n| *n > 0)
    }
}

#[derive(Debug)]
pub struct DownloadLease {
    active: Arc<DashMap<String, usize>>,
    key: String,
}

impl Drop for DownloadLease {
    fn drop(&mut self) {
        if let Some(mut n) = self.active.get_mut(&self.key) {
            *n = n.saturating_sub(1);
        }
        // Entries with no holders are removed so the map stays bounded
        self.active.remove_if(&self.key, |_, n| *n == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_lifecycle() {
        let tracker = InFlightDownloads::new();
        assert!(!tracker.is_active("a.pdf"));

        let first = tracker.acquire("a.pdf");
        let second = tracker.acquire("a.pdf");
        assert!(tracker.is_active("a.pdf"));
        assert!(!tracker.is_active("b.pdf"));

        drop(first);
        assert!(tracker.is_active("a.pdf"));
        drop(second);
        assert!(!tracker.is_active("a.pdf"));
        assert!(tracker.active.is_empty());
    }
}
