//! Cross-process mutual exclusion on subtitle files.
//!
//! The default locker creates a sibling `<file>.lock` marker with exclusive-create
//! semantics, so it works between threads, tasks and separate processes alike.

use crate::error::{Result, SublogueError};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Poll interval while another holder owns the marker.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Held for the lifetime of a critical section; releases on drop.
pub trait LockGuard: Send {
    fn lock_path(&self) -> Option<&Path> {
        None
    }
}

/// Capability to take an exclusive lock on a file path.
pub trait FileLocker: Send + Sync {
    /// Block until the lock is held, `timeout` elapses, or an I/O error occurs.
    /// Locks older than `staleness` are treated as abandoned and reclaimed.
    fn try_acquire(
        &self,
        path: &Path,
        timeout: Duration,
        staleness: Duration,
    ) -> Result<Box<dyn LockGuard>>;
}

/// Lock-marker file next to the target.
#[derive(Debug, Clone)]
pub struct MarkerFileLocker {
    poll_interval: Duration,
}

impl Default for MarkerFileLocker {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl MarkerFileLocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// `movie.srt` -> `movie.srt.lock`
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

fn holder_id() -> String {
    format!("{}:{:?}", std::process::id(), std::thread::current().id())
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Age of an existing marker, from its recorded timestamp or, failing that, its mtime.
fn marker_age(lock_path: &Path, contents: &str) -> Option<Duration> {
    let recorded = contents
        .lines()
        .nth(1)
        .and_then(|ts| ts.trim().parse::<f64>().ok());
    if let Some(ts) = recorded {
        return Some(Duration::from_secs_f64((unix_now() - ts).max(0.0)));
    }
    let modified = fs::metadata(lock_path).and_then(|m| m.modified()).ok()?;
    SystemTime::now().duration_since(modified).ok()
}

static CLAIM_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique sibling a stale marker is moved to before deletion.
fn claim_path_for(lock_path: &Path) -> PathBuf {
    let mut name = lock_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(
        ".{}-{}.stale",
        std::process::id(),
        CLAIM_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    lock_path.with_file_name(name)
}

/// Move the marker aside and delete it only if it is still the one judged stale.
///
/// Returns `Ok(false)` when the marker changed hands in between; that marker is
/// linked back into place unless yet another holder already took the slot.
fn reclaim_stale(lock_path: &Path, observed: &str) -> std::io::Result<bool> {
    let claimed = claim_path_for(lock_path);
    fs::rename(lock_path, &claimed)?;

    let taken = fs::read_to_string(&claimed).unwrap_or_default();
    if taken == observed {
        fs::remove_file(&claimed)?;
        return Ok(true);
    }

    let restored = fs::hard_link(&claimed, lock_path);
    fs::remove_file(&claimed)?;
    match restored {
        Ok(()) => Ok(false),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            warn!("Live lock {:?} was displaced while reclaiming", lock_path);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

impl FileLocker for MarkerFileLocker {
    fn try_acquire(
        &self,
        path: &Path,
        timeout: Duration,
        staleness: Duration,
    ) -> Result<Box<dyn LockGuard>> {
        let lock_path = lock_path_for(path);
        let started = Instant::now();

        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    let marker = format!("{}\n{}", holder_id(), unix_now());
                    if let Err(e) = file.write_all(marker.as_bytes()).and_then(|_| file.flush()) {
                        let _ = fs::remove_file(&lock_path);
                        return Err(SublogueError::Io(e));
                    }
                    debug!("Acquired lock: {:?}", lock_path);
                    return Ok(Box::new(MarkerGuard { lock_path, marker }));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let observed = fs::read_to_string(&lock_path).unwrap_or_default();
                    if marker_age(&lock_path, &observed).is_some_and(|age| age > staleness) {
                        warn!("Removing stale lock file: {:?}", lock_path);
                        match reclaim_stale(&lock_path, &observed) {
                            Ok(true) => continue,
                            Ok(false) => debug!("Lock {:?} changed hands before reclaim", lock_path),
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => warn!("Could not remove stale lock {:?}: {}", lock_path, e),
                        }
                    }

                    if started.elapsed() >= timeout {
                        return Err(SublogueError::LockTimeout {
                            path: path.to_path_buf(),
                            timeout,
                        });
                    }
                    std::thread::sleep(self.poll_interval);
                }
                Err(e) => return Err(SublogueError::Io(e)),
            }
        }
    }
}

/// Removes the marker when dropped, as long as it is still ours.
#[derive(Debug)]
pub struct MarkerGuard {
    lock_path: PathBuf,
    marker: String,
}

impl LockGuard for MarkerGuard {
    fn lock_path(&self) -> Option<&Path> {
        Some(&self.lock_path)
    }
}

impl Drop for MarkerGuard {
    fn drop(&mut self) {
        match fs::read_to_string(&self.lock_path) {
            Ok(contents) if contents != self.marker => {
                warn!("Lock {:?} was taken over; leaving it in place", self.lock_path);
                return;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return,
            _ => {}
        }
        match fs::remove_file(&self.lock_path) {
            Ok(()) => debug!("Released lock: {:?}", self.lock_path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove lock file {:?}: {}", self.lock_path, e),
        }
    }
}
