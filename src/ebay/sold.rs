use crate::sources::{SoldListingsSource, SourceError};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// A raw sold/completed-listings session. Implementations are stateful
/// (typically a logged-in scrape profile) and take `&mut self` so the type
/// system rules out concurrent drivers.
#[async_trait]
pub trait SoldSession: Send {
    async fn query(&mut self, search: &str) -> Result<Option<f64>, SourceError>;
}

/// Mutex guard around a [`SoldSession`] making it usable as a shared
/// [`SoldListingsSource`]. The lock is held across the whole query; this is
/// a hard exclusivity constraint of the underlying session, not a tunable.
pub struct ExclusiveSoldSession<S: SoldSession> {
    inner: Mutex<S>,
}

impl<S: SoldSession> ExclusiveSoldSession<S> {
    pub fn new(session: S) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }
}

#[async_trait]
impl<S: SoldSession> SoldListingsSource for ExclusiveSoldSession<S> {
    async fn query(&self, search: &str) -> Result<Option<f64>, SourceError> {
        let mut session = self.inner.lock().await;
        session.query(search).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    /// Flags overlap if two queries ever run inside the session at once.
    struct OverlapDetector {
        busy: Arc<AtomicBool>,
        overlapped: Arc<AtomicBool>,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SoldSession for OverlapDetector {
        async fn query(&mut self, _search: &str) -> Result<Option<f64>, SourceError> {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.busy.store(false, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(60.0))
        }
    }

    #[tokio::test]
    async fn concurrent_callers_are_serialized() {
        let overlapped = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicU32::new(0));
        let session = OverlapDetector {
            busy: Arc::new(AtomicBool::new(false)),
            overlapped: overlapped.clone(),
            calls: calls.clone(),
        };
        let source = Arc::new(ExclusiveSoldSession::new(session));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let source = source.clone();
            handles.push(tokio::spawn(async move {
                source.query("I5-7500T").await.unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Some(60.0));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert!(!overlapped.load(Ordering::SeqCst));
    }
}
