use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::fs_utils::remove_file_if_exists;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const RECLAIM_GUARD_STALE: Duration = Duration::from_secs(10);

static STALE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Advisory per-entry install lock. Held while a single installer writes a
/// cache entry; released on drop.
#[derive(Debug)]
pub struct EntryLock {
    path: PathBuf,
}

impl EntryLock {
    /// Claims `path` with create-new semantics, waiting while another process
    /// holds it. A lock file older than `stale_after` is treated as
    /// abandoned and reclaimed.
    pub fn acquire(path: &Path, stale_after: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let started = Instant::now();
        let mut waited = false;
        loop {
            match fs::OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(file) => {
                    write_lock_owner(file, path)?;
                    if waited {
                        tracing::debug!(
                            lock = %path.display(),
                            waited_ms = started.elapsed().as_millis() as u64,
                            "acquired install lock after waiting"
                        );
                    }
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if lock_age(path).is_some_and(|age| age >= stale_after)
                        && reclaim_stale(path, stale_after).with_context(|| {
                            format!("failed to remove stale lock: {}", path.display())
                        })?
                    {
                        tracing::warn!(lock = %path.display(), "reclaimed stale install lock");
                        continue;
                    }
                    if started.elapsed() > stale_after + POLL_INTERVAL {
                        return Err(anyhow!(
                            "install lock {} is still held after {}s",
                            path.display(),
                            stale_after.as_secs()
                        ));
                    }
                    if !waited {
                        tracing::info!(lock = %path.display(), "waiting for another installer");
                        waited = true;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("failed to claim lock file: {}", path.display()));
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        if let Err(err) = remove_file_if_exists(&self.path) {
            tracing::warn!(lock = %self.path.display(), %err, "failed to release install lock");
        }
    }
}

/// Records the owning pid in a freshly created lock file. The file is removed
/// again if the write fails, so a failed claim never leaves a lock behind.
pub(crate) fn write_lock_owner(mut file: impl Write, path: &Path) -> Result<()> {
    let written = file
        .write_all(format!("{}\n", std::process::id()).as_bytes())
        .and_then(|()| file.flush());
    if let Err(err) = written {
        drop(file);
        if let Err(cleanup) = remove_file_if_exists(path) {
            tracing::warn!(lock = %path.display(), %cleanup, "failed to remove unwritten lock");
        }
        return Err(err).with_context(|| format!("failed to write lock file: {}", path.display()));
    }
    Ok(())
}

/// Removes a stale lock. Reclaimers serialize on a `.reclaim` sibling and
/// re-check the age under it, so a lock re-claimed by another waiter is never
/// taken away. The stale file is moved aside under a unique name before it is
/// deleted. Returns whether this caller removed the lock.
fn reclaim_stale(path: &Path, stale_after: Duration) -> io::Result<bool> {
    let guard = sibling_path(path, ".reclaim");
    match fs::OpenOptions::new().write(true).create_new(true).open(&guard) {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            if lock_age(&guard).is_some_and(|age| age >= stale_after.max(RECLAIM_GUARD_STALE)) {
                remove_file_if_exists(&guard)?;
            }
            return Ok(false);
        }
        Err(err) => return Err(err),
    }

    let reclaimed = park_and_remove(path, stale_after);
    let released = remove_file_if_exists(&guard);
    let reclaimed = reclaimed?;
    released?;
    Ok(reclaimed)
}

fn park_and_remove(path: &Path, stale_after: Duration) -> io::Result<bool> {
    if !lock_age(path).is_some_and(|age| age >= stale_after) {
        return Ok(false);
    }
    let parked = parked_path(path);
    match fs::rename(path, &parked) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    }
    remove_file_if_exists(&parked)?;
    Ok(true)
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

fn parked_path(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or(0);
    let sequence = STALE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    sibling_path(
        path,
        &format!(".stale-{}-{nanos}-{sequence}", std::process::id()),
    )
}

fn lock_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).and_then(|meta| meta.modified()).ok()?;
    SystemTime::now().duration_since(modified).ok()
}
