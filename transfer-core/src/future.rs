//! [`TransferFuture`]: a one-shot handle to an in-flight asynchronous read, and [`read_any`], the
//! N-way wait that reports whichever of several outstanding futures completes first.
//!
//! Reproduces the original's promise/future pair as a single-fire `mpsc` channel guarded by a
//! shared "active" flag, rather than pulling in an async runtime: every transfer in this crate
//! is a blocking call run on a spawned worker thread.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Mutex};

use transfer_types::{Error, Result, TransferElementId, VersionNumber};

type Finisher = Box<dyn FnOnce(VersionNumber) -> Result<()> + Send>;

struct Inner {
    id: TransferElementId,
    receiver: Mutex<Option<Receiver<Result<VersionNumber>>>>,
    finisher: Mutex<Option<Finisher>>,
    active: Mutex<bool>,
    /// Set the first time `finish` runs. Lets [`TransferFuture::poll`] tell an edge (the
    /// transfer just completed) from a level (the transfer is done, as it has been ever since),
    /// so `read_any` sees a stale, already-reported future as not-ready rather than ready again.
    reported: Mutex<bool>,
}

/// A one-shot handle to an in-flight asynchronous read. Cloning shares the same underlying
/// transfer: whichever clone calls [`Self::wait`] first performs the actual receive and runs
/// `post_read`; any other clone's `wait` simply blocks until that finishes.
#[derive(Clone)]
pub struct TransferFuture {
    inner: Arc<Inner>,
}

impl TransferFuture {
    pub(crate) fn new(
        id: TransferElementId,
        receiver: Receiver<Result<VersionNumber>>,
        finisher: Finisher,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                receiver: Mutex::new(Some(receiver)),
                finisher: Mutex::new(Some(finisher)),
                active: Mutex::new(true),
                reported: Mutex::new(false),
            }),
        }
    }

    pub fn id(&self) -> TransferElementId {
        self.inner.id
    }

    pub fn is_active(&self) -> bool {
        *self.inner.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Non-blocking poll: `Some(Ok(()))` the one time the transfer is observed completing and
    /// `post_read` runs, `None` on every call before or after that — including later calls made
    /// once the future is already finished, so a stale future in a `read_any` set never reports
    /// ready twice.
    pub fn poll(&self) -> Option<Result<()>> {
        let mut guard = self.inner.receiver.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(receiver) = guard.as_ref() {
            match receiver.try_recv() {
                Ok(result) => {
                    guard.take();
                    drop(guard);
                    Some(result.and_then(|version| self.finish(version)))
                }
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    let mut reported = self.inner.reported.lock().unwrap_or_else(|e| e.into_inner());
                    if *reported {
                        None
                    } else {
                        *reported = true;
                        Some(Err(Error::IoError("async transfer worker disconnected".to_string())))
                    }
                }
            }
        } else {
            drop(guard);
            if self.is_active() {
                None
            } else {
                let mut reported = self.inner.reported.lock().unwrap_or_else(|e| e.into_inner());
                if *reported {
                    None
                } else {
                    *reported = true;
                    Some(Ok(()))
                }
            }
        }
    }

    /// Blocks until the wire transfer completes, runs `post_read` on the target exactly once
    /// (across all clones of this future), and clears the active flag.
    pub fn wait(&self) -> Result<()> {
        let mut guard = self.inner.receiver.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(receiver) = guard.take() {
            drop(guard);
            let version = receiver
                .recv()
                .map_err(|_| Error::IoError("async transfer worker disconnected".to_string()))?;
            version.and_then(|v| self.finish(v))
        } else {
            drop(guard);
            while self.is_active() {
                std::thread::yield_now();
            }
            Ok(())
        }
    }

    fn finish(&self, version: VersionNumber) -> Result<()> {
        if let Some(finisher) = self
            .inner
            .finisher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            finisher(version)?;
        }
        *self.inner.active.lock().unwrap_or_else(|e| e.into_inner()) = false;
        *self.inner.reported.lock().unwrap_or_else(|e| e.into_inner()) = true;
        Ok(())
    }
}

impl std::fmt::Debug for TransferFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferFuture")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Waits on whichever of `futures` completes first, finishes exactly that one, and returns its
/// id. The remaining futures stay active and untouched.
///
/// Completion order mirrors wire-completion order: each worker thread only sends once its own
/// blocking transfer has actually returned, so polling in a tight loop observes completions in
/// the order they happened at the wire. Ties within one polling pass are broken by `futures`
/// insertion order.
pub fn read_any(futures: &[TransferFuture]) -> Result<TransferElementId> {
    if futures.is_empty() {
        return Err(Error::WrongParameter(
            "read_any requires at least one future".to_string(),
        ));
    }
    loop {
        for future in futures {
            if let Some(result) = future.poll() {
                result?;
                tracing::debug!(id = ?future.id(), "read_any completed");
                return Ok(future.id());
            }
        }
        std::thread::yield_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use transfer_types::TransferElementId;

    fn spawn_future(delay: Duration, id: TransferElementId) -> (TransferFuture, Arc<Mutex<bool>>) {
        let (tx, rx) = mpsc::channel();
        let ran = Arc::new(Mutex::new(false));
        let ran_clone = Arc::clone(&ran);
        thread::spawn(move || {
            thread::sleep(delay);
            let _ = tx.send(Ok(VersionNumber::new()));
        });
        let finisher: Finisher = Box::new(move |_version| {
            *ran_clone.lock().unwrap() = true;
            Ok(())
        });
        (TransferFuture::new(id, rx, finisher), ran)
    }

    #[test]
    fn wait_runs_the_finisher_exactly_once() {
        let (future, ran) = spawn_future(Duration::from_millis(1), TransferElementId::new());
        future.wait().unwrap();
        assert!(*ran.lock().unwrap());
        future.wait().unwrap(); // second wait is a no-op, not a re-receive.
    }

    #[test]
    fn read_any_returns_the_fastest_completion() {
        let fast_id = TransferElementId::new();
        let slow_id = TransferElementId::new();
        let (slow, _slow_ran) = spawn_future(Duration::from_millis(40), slow_id);
        let (fast, _fast_ran) = spawn_future(Duration::from_millis(1), fast_id);
        let winner = read_any(&[slow, fast]).unwrap();
        assert_eq!(winner, fast_id);
    }

    #[test]
    fn repeated_read_any_advances_to_the_next_completion() {
        let a_id = TransferElementId::new();
        let b_id = TransferElementId::new();
        let (a, _a_ran) = spawn_future(Duration::from_millis(1), a_id);
        let (b, _b_ran) = spawn_future(Duration::from_millis(40), b_id);

        let futures = vec![a, b];
        let first = read_any(&futures).unwrap();
        assert_eq!(first, a_id);

        // `a`'s future is already finished and reported; a second call over the same set must
        // not report it again and instead wait for `b`.
        let second = read_any(&futures).unwrap();
        assert_eq!(second, b_id);
    }
}
