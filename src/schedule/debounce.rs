use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

struct Inner<T> {
    committed: T,
    staged: Option<T>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

/// A value whose writes are committed only after a quiet window.
///
/// [`set`](Debounced::set) stages a value and (re)starts the timer; when the
/// window elapses with no further writes, the staged value becomes the
/// committed one. [`flush`](Debounced::flush) commits the staged value
/// immediately; [`cancel`](Debounced::cancel) discards it. A cancelled or
/// superseded timer never commits (the handle is aborted and a generation
/// counter guards the commit).
///
/// Cloning shares the value. Requires a tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use storekit::Debounced;
///
/// # async fn example() {
/// let query = Debounced::new(String::new(), Duration::from_millis(300));
/// query.set("r".to_string());
/// query.set("ru".to_string());
/// query.set("rust".to_string());
/// // After 300ms of quiet, get() returns "rust"; intermediate
/// // values are never committed.
/// # }
/// ```
pub struct Debounced<T> {
    shared: Arc<Mutex<Inner<T>>>,
    delay: Duration,
}

impl<T> Clone for Debounced<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            delay: self.delay,
        }
    }
}

impl<T: Clone + Send + 'static> Debounced<T> {
    /// Create a debounced value with the given initial committed value and
    /// quiet window.
    pub fn new(initial: T, delay: Duration) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Inner {
                committed: initial,
                staged: None,
                timer: None,
                generation: 0,
            })),
            delay,
        }
    }

    /// Stage a value and (re)start the quiet-window timer.
    pub fn set(&self, value: T) {
        let mut inner = self.shared.lock().unwrap();
        inner.staged = Some(value);
        inner.generation = inner.generation.wrapping_add(1);
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }

        let generation = inner.generation;
        let shared = Arc::clone(&self.shared);
        let delay = self.delay;
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut inner = shared.lock().unwrap();
            if inner.generation != generation {
                return;
            }
            if let Some(value) = inner.staged.take() {
                inner.committed = value;
            }
            inner.timer = None;
        }));
    }

    /// The committed (debounced) value.
    pub fn get(&self) -> T {
        self.shared.lock().unwrap().committed.clone()
    }

    /// The most recently staged value, or the committed value when nothing
    /// is pending.
    pub fn staged(&self) -> T {
        let inner = self.shared.lock().unwrap();
        inner
            .staged
            .clone()
            .unwrap_or_else(|| inner.committed.clone())
    }

    /// Whether a write is staged but not yet committed.
    pub fn is_pending(&self) -> bool {
        self.shared.lock().unwrap().staged.is_some()
    }

    /// Cancel the timer and commit the staged value immediately.
    pub fn flush(&self) {
        let mut inner = self.shared.lock().unwrap();
        inner.generation = inner.generation.wrapping_add(1);
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        if let Some(value) = inner.staged.take() {
            inner.committed = value;
        }
    }

    /// Cancel the timer and discard the staged value, reverting to the last
    /// committed value.
    pub fn cancel(&self) {
        let mut inner = self.shared.lock().unwrap();
        inner.generation = inner.generation.wrapping_add(1);
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.staged = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(50);

    async fn settle() {
        // Paused-clock tests auto-advance past the timer while idle.
        tokio::time::sleep(DELAY + Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn commits_after_quiet_window() {
        let value = Debounced::new(0, DELAY);

        value.set(1);
        assert_eq!(value.get(), 0);
        assert_eq!(value.staged(), 1);

        settle().await;
        assert_eq!(value.get(), 1);
        assert!(!value.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_writes_commit_only_the_latest() {
        let value = Debounced::new(0, DELAY);

        value.set(1);
        value.set(2);
        value.set(3);

        settle().await;
        assert_eq!(value.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn each_write_restarts_the_window() {
        let value = Debounced::new(0, DELAY);

        value.set(1);
        tokio::time::sleep(Duration::from_millis(30)).await;
        value.set(2);
        tokio::time::sleep(Duration::from_millis(30)).await;

        // 60ms elapsed overall, but only 30ms since the last write.
        assert_eq!(value.get(), 0);

        settle().await;
        assert_eq!(value.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_commits_immediately() {
        let value = Debounced::new(0, DELAY);

        value.set(5);
        value.flush();
        assert_eq!(value.get(), 5);

        // The aborted timer must not fire later.
        settle().await;
        assert_eq!(value.get(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_the_staged_value() {
        let value = Debounced::new(0, DELAY);

        value.set(5);
        value.cancel();
        assert_eq!(value.staged(), 0);

        settle().await;
        assert_eq!(value.get(), 0);
    }
}
