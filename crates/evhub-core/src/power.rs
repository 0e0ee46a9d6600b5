// Evhub Power Coordination
// Wake-lock handle held while events are pending delivery

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// System wake-lock facility.
///
/// The pump holds a partial wake lock whenever it has events in flight and
/// releases it just before blocking, so the system may suspend while no
/// input is pending. Injected as a handle so tests can stub it out.
pub trait WakeLock: Send + Sync {
    fn acquire(&self, tag: &str);
    fn release(&self, tag: &str);
}

/// Wake lock that does nothing. The default for desktop systems and tests.
#[derive(Debug, Default)]
pub struct NoopWakeLock;

impl WakeLock for NoopWakeLock {
    fn acquire(&self, _tag: &str) {}

    fn release(&self, _tag: &str) {}
}

/// Wake lock backed by the kernel's userspace wakelock interface
/// (`/sys/power/wake_lock` and `/sys/power/wake_unlock`).
#[derive(Debug)]
pub struct SysfsWakeLock {
    lock_path: PathBuf,
    unlock_path: PathBuf,
}

impl SysfsWakeLock {
    pub fn new() -> Self {
        SysfsWakeLock {
            lock_path: PathBuf::from("/sys/power/wake_lock"),
            unlock_path: PathBuf::from("/sys/power/wake_unlock"),
        }
    }

    fn write_tag(path: &PathBuf, tag: &str) {
        let res = OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|mut f| f.write_all(tag.as_bytes()));
        if let Err(e) = res {
            // Kernels without CONFIG_PM_WAKELOCKS don't expose the files.
            log::debug!("wakelock write to {} failed: {}", path.display(), e);
        }
    }
}

impl Default for SysfsWakeLock {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeLock for SysfsWakeLock {
    fn acquire(&self, tag: &str) {
        Self::write_tag(&self.lock_path, tag);
    }

    fn release(&self, tag: &str) {
        Self::write_tag(&self.unlock_path, tag);
    }
}
