//! FileSink - time-windowed rotating file writer
//!
//! Records are appended to the file of the current time window. A background
//! rotation thread wakes on a fixed tick and, when the window changes, swaps in
//! the file of the new window and hands the closed one to a compression thread.
//!
//! The active window sits behind a reader/writer lock: delivery writes under the
//! read lock, rotation takes the write lock only to swap the window, so a write
//! never targets a half-closed file.

use contracts::{Compression, ContractError, DataSink, Delivery, FileSinkConfig, FormattedRecord};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use super::compress::gzip_file;
use super::window::{window_path, WindowPolicy};
use crate::clock::{Clock, SystemClock};
use crate::handle::WorkerHandle;

/// The file of one time window
struct FileWindow {
    start_time: i64,
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileWindow {
    fn open(start_time: i64, path: PathBuf) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            start_time,
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_all(bytes)
    }

    fn flush(&self) -> io::Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }

    /// Flush and close, returning the path of the closed file
    fn finish(self) -> io::Result<PathBuf> {
        let writer = self
            .writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_data()?;
        Ok(self.path)
    }
}

/// Rotation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSinkStats {
    pub windows_opened: u64,
    pub windows_closed: u64,
    pub compressions: u64,
    pub compression_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    windows_opened: AtomicU64,
    windows_closed: AtomicU64,
    compressions: AtomicU64,
    compression_failures: AtomicU64,
}

/// State shared between the delivery thread and the rotation thread
struct Shared {
    name: String,
    path_pattern: String,
    prefix: String,
    compression: Compression,
    policy: WindowPolicy,
    clock: Arc<dyn Clock>,
    active: RwLock<Option<FileWindow>>,
    compressors: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl Shared {
    fn open_window(&self, start_time: i64) -> Result<FileWindow, ContractError> {
        let path = window_path(&self.path_pattern, &self.prefix, start_time)?;
        let window = FileWindow::open(start_time, path.clone()).map_err(|e| {
            ContractError::sink_unavailable(
                &self.name,
                format!("cannot open '{}': {e}", path.display()),
            )
        })?;
        self.counters.windows_opened.fetch_add(1, Ordering::Relaxed);
        info!(sink = %self.name, path = %path.display(), start_time, "File window opened");
        Ok(window)
    }

    fn open_start(&self) -> Option<i64> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|w| w.start_time)
    }

    /// Swap in the window for the current time if it changed
    fn rotate_if_needed(&self) {
        let now = self.clock.now();
        let Some(start_time) = self.policy.next_window(self.open_start(), now) else {
            return;
        };

        let next = match self.open_window(start_time) {
            Ok(window) => Some(window),
            Err(e) => {
                error!(sink = %self.name, error = %e, "Failed to open new file window");
                None
            }
        };

        let previous = {
            let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *active, next)
        };

        if let Some(window) = previous {
            self.retire(window);
        }
    }

    /// Close a window and, if configured, compress it in the background
    fn retire(&self, window: FileWindow) {
        let path = match window.finish() {
            Ok(path) => path,
            Err(e) => {
                error!(sink = %self.name, error = %e, "Failed to close file window");
                return;
            }
        };
        self.counters.windows_closed.fetch_add(1, Ordering::Relaxed);
        debug!(sink = %self.name, path = %path.display(), "File window closed");

        if self.compression == Compression::Gzip {
            self.spawn_compression(path);
        }
    }

    fn spawn_compression(&self, path: PathBuf) {
        let name = self.name.clone();
        let counters = Arc::clone(&self.counters);
        let spawned = thread::Builder::new()
            .name(format!("{}-gzip", self.name))
            .spawn(move || compress_window(&name, &path, &counters));

        match spawned {
            Ok(handle) => {
                let mut compressors = self
                    .compressors
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                compressors.retain(|h| !h.is_finished());
                compressors.push(handle);
            }
            Err(e) => {
                self.counters
                    .compression_failures
                    .fetch_add(1, Ordering::Relaxed);
                warn!(sink = %self.name, error = %e, "Failed to start compression thread");
            }
        }
    }

    fn join_compressors(&self) {
        let handles: Vec<_> = self
            .compressors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                error!(sink = %self.name, "Compression thread panicked");
            }
        }
    }
}

fn compress_window(name: &str, path: &Path, counters: &Counters) {
    match gzip_file(path) {
        Ok(target) => {
            counters.compressions.fetch_add(1, Ordering::Relaxed);
            debug!(sink = %name, path = %target.display(), "File window compressed");
        }
        Err(e) => {
            counters.compression_failures.fetch_add(1, Ordering::Relaxed);
            warn!(sink = %name, path = %path.display(), error = %e, "Compression failed, keeping original");
        }
    }
}

/// Sink that appends records to time-windowed files
pub struct FileSink {
    shared: Arc<Shared>,
    rotator: Option<WorkerHandle>,
}

impl FileSink {
    /// Create a new FileSink using the system clock
    pub fn new(name: impl Into<String>, config: &FileSinkConfig) -> Result<Self, ContractError> {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Create a new FileSink driven by `clock`
    ///
    /// The first window is opened before the rotation thread starts; failing to
    /// open it fails construction.
    #[instrument(name = "file_sink_new", skip(name, config, clock))]
    pub fn with_clock(
        name: impl Into<String>,
        config: &FileSinkConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let policy = WindowPolicy::new(config.window_size, config.window_align);

        let shared = Arc::new(Shared {
            name: name.clone(),
            path_pattern: config.path_pattern.clone(),
            prefix: config.prefix.clone(),
            compression: config.compression,
            policy,
            clock,
            active: RwLock::new(None),
            compressors: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
        });

        let first = shared.open_window(policy.start_for(shared.clock.now()))?;
        *shared.active.write().unwrap_or_else(PoisonError::into_inner) = Some(first);

        let tick = Duration::from_millis(config.rotation_tick_ms.max(1));
        let worker_shared = Arc::clone(&shared);
        let rotator = WorkerHandle::spawn(format!("{name}-rotate"), move |stop| {
            while !stop.is_stopped() {
                stop.wait(tick);
                if stop.is_stopped() {
                    break;
                }
                worker_shared.rotate_if_needed();
            }
        })
        .map_err(|e| ContractError::sink_write(&name, format!("cannot start rotation thread: {e}")))?;

        debug!(
            sink = %name,
            window_size = policy.size(),
            compression = ?config.compression,
            "FileSink created"
        );

        Ok(Self {
            shared,
            rotator: Some(rotator),
        })
    }

    /// Path of the currently open window, if any
    pub fn current_path(&self) -> Option<PathBuf> {
        self.shared
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|w| w.path.clone())
    }

    /// Rotation counters
    pub fn stats(&self) -> FileSinkStats {
        let c = &self.shared.counters;
        FileSinkStats {
            windows_opened: c.windows_opened.load(Ordering::Relaxed),
            windows_closed: c.windows_closed.load(Ordering::Relaxed),
            compressions: c.compressions.load(Ordering::Relaxed),
            compression_failures: c.compression_failures.load(Ordering::Relaxed),
        }
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn deliver(&mut self, record: &FormattedRecord) -> Result<Delivery, ContractError> {
        let active = self
            .shared
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(window) = active.as_ref() else {
            return Err(ContractError::sink_unavailable(
                &self.shared.name,
                "no file window is open",
            ));
        };

        window.write(record).map_err(|e| {
            ContractError::sink_write(
                &self.shared.name,
                format!("write to '{}' failed: {e}", window.path.display()),
            )
        })?;
        Ok(Delivery::Delivered)
    }

    fn flush(&mut self) {
        let active = self
            .shared
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(window) = active.as_ref() {
            if let Err(e) = window.flush() {
                warn!(sink = %self.shared.name, error = %e, "File flush failed");
            }
        }
    }

    #[instrument(name = "file_sink_close", skip(self), fields(sink = %self.shared.name))]
    fn close(&mut self) -> Result<(), ContractError> {
        let Some(mut rotator) = self.rotator.take() else {
            return Ok(());
        };
        rotator.shutdown();

        let last = self
            .shared
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(window) = last {
            self.shared.retire(window);
        }
        self.shared.join_compressors();

        debug!(sink = %self.shared.name, "FileSink closed");
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(sink = %self.shared.name, error = %e, "Close failed on drop");
        }
    }
}
