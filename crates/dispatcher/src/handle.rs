//! WorkerHandle - owns a sink's background thread
//!
//! Every background thread (file rotation, connection acceptor) is spawned through
//! a `WorkerHandle`. Shutting the handle down sets the stop flag, wakes the thread
//! and joins it; dropping the handle does the same, so a sink that fails half-way
//! through construction still joins whatever it already started.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Stop flag observed by a worker thread
#[derive(Debug, Clone)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// Whether the owner asked the worker to stop
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sleep for at most `timeout`, returning early when the owner stops the worker
    pub fn wait(&self, timeout: Duration) {
        if !self.is_stopped() {
            thread::park_timeout(timeout);
        }
    }
}

type Waker = Box<dyn Fn() + Send>;

/// Handle to a running worker thread
pub struct WorkerHandle {
    /// Thread name
    name: String,
    /// Stop flag shared with the worker
    stop: Arc<AtomicBool>,
    /// Unblocks a worker stuck in a blocking call
    waker: Option<Waker>,
    /// Worker thread handle
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn a named worker thread running `body`
    pub fn spawn<F>(name: impl Into<String>, body: F) -> io::Result<Self>
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        let name = name.into();
        let stop = Arc::new(AtomicBool::new(false));
        let signal = StopSignal {
            flag: Arc::clone(&stop),
        };

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || body(signal))?;

        debug!(worker = %name, "Worker thread started");

        Ok(Self {
            name,
            stop,
            waker: None,
            thread: Some(thread),
        })
    }

    /// Install a waker that is called after the stop flag is set
    pub fn with_waker(mut self, waker: impl Fn() + Send + 'static) -> Self {
        self.waker = Some(Box::new(waker));
        self
    }

    /// Get worker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker thread has not been joined yet
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop and join the worker; calling it again is a no-op
    #[instrument(name = "worker_handle_shutdown", skip(self), fields(worker = %self.name))]
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.stop.store(true, Ordering::Release);
        thread.thread().unpark();
        if let Some(waker) = &self.waker {
            waker();
        }

        if thread.join().is_err() {
            error!(worker = %self.name, "Worker thread panicked");
        }
        debug!(worker = %self.name, "Worker thread stopped");
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
