//! File-backed monotonic order id counter.
//!
//! Every allocation is a read-increment-write cycle performed under an
//! exclusive advisory lock (`flock` / `LockFileEx` via `fs2`), and the new
//! value is forced to disk before the lock is released. The file holds a
//! single decimal integer:
//! - missing or empty file counts as 0
//! - unreadable or non-numeric content also counts as 0 (logged, never fatal)
//! - the lock wait is bounded; expiry fails the allocation

use bracket_core::{OrderIdError, OrderIdSource};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Holds the exclusive lock until dropped.
struct CounterLock<'a> {
    file: &'a File,
}

impl Drop for CounterLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(self.file) {
            warn!(?e, "Failed to release order id lock");
        }
    }
}

/// Order id allocator backed by a shared counter file.
#[derive(Debug, Clone)]
pub struct FileOrderIdAllocator {
    path: PathBuf,
    lock_timeout: Duration,
}

impl FileOrderIdAllocator {
    /// Well-known counter path, relative to the working directory.
    pub const DEFAULT_PATH: &'static str = ".order_id";
    /// Default bound on lock acquisition.
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);
    /// Interval between lock attempts.
    const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(20);

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: Self::DEFAULT_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last issued id without advancing the counter.
    ///
    /// A missing counter file reads as 0 and is not created.
    pub fn peek(&self) -> Result<u64, OrderIdError> {
        let file = match OpenOptions::new().read(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let _lock = self.lock(&file)?;
        Ok(self.read_stored(&file))
    }

    fn open(&self) -> Result<File, OrderIdError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        Ok(file)
    }

    fn lock<'a>(&self, file: &'a File) -> Result<CounterLock<'a>, OrderIdError> {
        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(CounterLock { file }),
                Err(e) if is_contended(&e) => {
                    let waited = started.elapsed();
                    if waited >= self.lock_timeout {
                        return Err(OrderIdError::LockTimeout {
                            path: self.path.clone(),
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(Self::LOCK_RETRY_INTERVAL.min(self.lock_timeout - waited));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_stored(&self, mut file: &File) -> u64 {
        let mut content = String::new();
        if let Err(e) = file.read_to_string(&mut content) {
            warn!(path = %self.path.display(), ?e, "Order id counter unreadable, treating as 0");
            return 0;
        }

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return 0;
        }

        match trimmed.parse::<u64>() {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    content = %trimmed,
                    %e,
                    "Order id counter corrupt, treating as 0"
                );
                0
            }
        }
    }
}

impl Default for FileOrderIdAllocator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATH)
    }
}

impl OrderIdSource for FileOrderIdAllocator {
    fn next_id(&self, seed: Option<u64>) -> Result<u64, OrderIdError> {
        let file = self.open()?;
        let _lock = self.lock(&file)?;

        let stored = self.read_stored(&file);
        let candidate = stored.saturating_add(1);
        let next_id = match seed {
            Some(seed) if seed > candidate => seed,
            _ => candidate,
        };

        let mut writer = &file;
        writer.set_len(0)?;
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(next_id.to_string().as_bytes())?;
        writer.flush()?;
        writer.sync_all()?;

        debug!(path = %self.path.display(), stored, ?seed, next_id, "Allocated order id");
        Ok(next_id)
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
