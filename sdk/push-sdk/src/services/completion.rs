use tracing::warn;

/// Fires a completion callback exactly once.
///
/// `complete` fires it with the real outcome. If the guard is dropped first
/// (early return, cancellation, panic) the fallback outcome is used instead.
pub struct CompletionGuard<T, F>
where
    F: FnOnce(T),
{
    completion: Option<F>,
    fallback: Option<T>,
}

impl<T, F> CompletionGuard<T, F>
where
    F: FnOnce(T),
{
    pub fn new(completion: F, fallback: T) -> Self {
        Self {
            completion: Some(completion),
            fallback: Some(fallback),
        }
    }

    pub fn complete(mut self, outcome: T) {
        if let Some(completion) = self.completion.take() {
            completion(outcome);
        }
    }
}

impl<T, F> Drop for CompletionGuard<T, F>
where
    F: FnOnce(T),
{
    fn drop(&mut self) {
        if let (Some(completion), Some(fallback)) = (self.completion.take(), self.fallback.take()) {
            warn!("Completion not reached, firing fallback outcome");
            completion(fallback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_complete_fires_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::new(Mutex::new(None));
        let (calls_clone, seen_clone) = (calls.clone(), seen.clone());

        let guard = CompletionGuard::new(
            move |v: u8| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                *seen_clone.lock().unwrap() = Some(v);
            },
            0,
        );
        guard.complete(7);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), Some(7));
    }

    #[test]
    fn test_drop_fires_fallback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        {
            let _guard = CompletionGuard::new(move |v: u8| seen_clone.lock().unwrap().push(v), 9);
        }

        assert_eq!(*seen.lock().unwrap(), vec![9]);
    }

    #[test]
    fn test_dropped_pending_future_fires_fallback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let mut task = tokio_test::task::spawn(async move {
            let guard = CompletionGuard::new(move |v: u8| seen_clone.lock().unwrap().push(v), 1);
            std::future::pending::<()>().await;
            guard.complete(2);
        });

        tokio_test::assert_pending!(task.poll());
        assert!(seen.lock().unwrap().is_empty());

        drop(task);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_cancelled_future_fires_fallback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();

        let task = tokio::spawn(async move {
            let guard = CompletionGuard::new(move |v: u8| seen_clone.lock().unwrap().push(v), 1);
            let _ = started_tx.send(());
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            guard.complete(2);
        });
        started_rx.await.unwrap();
        task.abort();
        let _ = task.await;

        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }
}
