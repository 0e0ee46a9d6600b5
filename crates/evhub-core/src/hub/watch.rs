// Evhub Filesystem Watcher
// Inotify subscription on the device directory driving open/close

use std::os::fd::AsFd;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify};

/// Poll-set sentinel used when inotify could not be set up. `poll`
/// ignores negative descriptors, so the slot stays harmlessly idle.
pub(crate) const NO_WATCH_FD: RawFd = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchKind {
    Created,
    Removed,
}

#[derive(Debug)]
pub(crate) struct WatchEvent {
    pub kind: WatchKind,
    pub path: PathBuf,
}

/// Create/delete watch over the device directory.
///
/// When the watch cannot be established (no inotify, unreadable
/// directory) the watcher degrades to a stub: devices present at startup
/// are still found by the one-shot scan, later topology changes are not.
pub(crate) struct DeviceWatcher {
    dir: PathBuf,
    inotify: Option<Inotify>,
}

impl DeviceWatcher {
    pub fn new(dir: &Path) -> Self {
        let inotify = match Self::subscribe(dir) {
            Ok(instance) => Some(instance),
            Err(e) => {
                log::error!("could not watch {}: {}", dir.display(), e);
                None
            }
        };
        DeviceWatcher {
            dir: dir.to_path_buf(),
            inotify,
        }
    }

    fn subscribe(dir: &Path) -> nix::Result<Inotify> {
        let instance = Inotify::init(InitFlags::IN_CLOEXEC)?;
        instance.add_watch(dir, AddWatchFlags::IN_CREATE | AddWatchFlags::IN_DELETE)?;
        Ok(instance)
    }

    /// Descriptor for the poll set, or the sentinel when degraded.
    pub fn raw_fd(&self) -> RawFd {
        self.inotify
            .as_ref()
            .map(|i| i.as_fd().as_raw_fd())
            .unwrap_or(NO_WATCH_FD)
    }

    /// Drain pending notifications. Call only after `poll` reported the
    /// watch descriptor readable.
    pub fn drain(&self) -> Vec<WatchEvent> {
        let Some(inotify) = &self.inotify else {
            return Vec::new();
        };
        let events = match inotify.read_events() {
            Ok(events) => events,
            Err(e) => {
                log::warn!("could not read watch events: {}", e);
                return Vec::new();
            }
        };
        events
            .into_iter()
            .filter_map(|event| {
                let name = event.name?;
                let kind = if event.mask.contains(AddWatchFlags::IN_CREATE) {
                    WatchKind::Created
                } else if event.mask.contains(AddWatchFlags::IN_DELETE) {
                    WatchKind::Removed
                } else {
                    return None;
                };
                Some(WatchEvent {
                    kind,
                    path: self.dir.join(name),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("evhub-watch-{}-{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_watch_reports_create_and_delete() {
        let dir = scratch_dir("create");
        let watcher = DeviceWatcher::new(&dir);
        assert!(watcher.raw_fd() >= 0);

        let file = dir.join("event7");
        fs::write(&file, b"").unwrap();
        fs::remove_file(&file).unwrap();

        let events = watcher.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, WatchKind::Created);
        assert_eq!(events[0].path, file);
        assert_eq!(events[1].kind, WatchKind::Removed);
        assert_eq!(events[1].path, file);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_directory_degrades_to_sentinel() {
        let watcher = DeviceWatcher::new(Path::new("/nonexistent/evhub-dir"));
        assert_eq!(watcher.raw_fd(), NO_WATCH_FD);
        assert!(watcher.drain().is_empty());
    }
}
