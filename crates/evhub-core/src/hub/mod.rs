// Evhub Hub
// Device discovery, the identity registry and the single-reader event pump

mod registry;
mod watch;

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io;
use std::mem;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::bits::test_bit;
use crate::config::HubConfig;
use crate::device::{classify, DeviceClasses, DeviceProbe, DeviceRecord};
use crate::error::{HubError, HubResult};
use crate::input::codes::{EV_KEY, KEY_BITMASK_BYTES, KEY_MAX, SW_BITMASK_BYTES, SW_MAX, SW_HEADPHONE_INSERT};
use crate::input::event::{timeval_to_ns, HubEvent};
use crate::input::ioctl;
use crate::keylayout::keycodes::{
    KEYCODE_DPAD_CENTER, KEYCODE_DPAD_DOWN, KEYCODE_DPAD_LEFT, KEYCODE_DPAD_RIGHT, KEYCODE_DPAD_UP,
    KEYCODE_Q,
};
use crate::keylayout::KeyLayoutMap;
use crate::power::{NoopWakeLock, WakeLock};
use crate::props::{InMemoryProperties, PropertySink};

use self::registry::Registry;
use self::watch::{DeviceWatcher, WatchKind, NO_WATCH_FD};

/// Wake-lock tag held while events are in flight.
const WAKE_LOCK_TAG: &str = "KeyEvents";

const STATE_UNINITIALIZED: u8 = 0;
const STATE_READY: u8 = 1;
const STATE_FAILED: u8 = 2;

/// Absolute axis range descriptor as returned by `absolute_info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbsoluteAxisInfo {
    pub min: i32,
    pub max: i32,
    pub flat: i32,
    pub fuzz: i32,
}

/// State owned by the pump. Only `next_event` (and the open/close paths it
/// drives) touches this; the mutex also serializes concurrent callers of
/// `next_event` so there is a single reader at any time.
struct Pump {
    opened: bool,
    watcher: Option<DeviceWatcher>,
    /// Poll set; index 0 is the watcher descriptor (or a negative
    /// sentinel `poll` will skip), user devices start at index 1.
    poll_fds: Vec<libc::pollfd>,
    /// Parallel device array; `devices[0]` is always `None`.
    devices: Vec<Option<Arc<DeviceRecord>>>,
    opening: VecDeque<Arc<DeviceRecord>>,
    closing: VecDeque<Arc<DeviceRecord>>,
}

impl Pump {
    fn new() -> Self {
        Pump {
            opened: false,
            watcher: None,
            poll_fds: vec![libc::pollfd {
                fd: NO_WATCH_FD,
                events: libc::POLLIN,
                revents: 0,
            }],
            devices: vec![None],
            opening: VecDeque::new(),
            closing: VecDeque::new(),
        }
    }
}

/// The input event hub.
///
/// Discovers evdev devices under the configured directory, watches it for
/// topology changes, and multiplexes every open device into a single
/// translated event stream. One dedicated thread is expected to call
/// [`EventHub::next_event`] in a loop; the pull-mode capability queries
/// may be called from any thread concurrently with the pump.
pub struct EventHub {
    config: HubConfig,
    wake_lock: Arc<dyn WakeLock>,
    props: Arc<dyn PropertySink>,
    state: AtomicU8,
    registry: Mutex<Registry>,
    pump: Mutex<Pump>,
}

impl EventHub {
    /// Create a hub with injected platform services. The wake lock is
    /// held from construction until the pump first blocks.
    pub fn new(
        config: HubConfig,
        wake_lock: Arc<dyn WakeLock>,
        props: Arc<dyn PropertySink>,
    ) -> Self {
        wake_lock.acquire(WAKE_LOCK_TAG);
        let excluded = config.excluded_devices.clone();
        EventHub {
            config,
            wake_lock,
            props,
            state: AtomicU8::new(STATE_UNINITIALIZED),
            registry: Mutex::new(Registry {
                excluded,
                ..Registry::default()
            }),
            pump: Mutex::new(Pump::new()),
        }
    }

    /// Convenience constructor with a no-op wake lock and an in-memory
    /// property store.
    pub fn with_defaults(config: HubConfig) -> Self {
        Self::new(
            config,
            Arc::new(NoopWakeLock),
            Arc::new(InMemoryProperties::new()),
        )
    }

    /// Whether the platform input opened successfully. Reports
    /// `Uninitialized` until the first `next_event` call.
    pub fn error_check(&self) -> HubResult<()> {
        match self.state.load(Ordering::Acquire) {
            STATE_READY => Ok(()),
            STATE_UNINITIALIZED => Err(HubError::Uninitialized),
            _ => Err(HubError::Io(io::Error::other("device directory scan failed"))),
        }
    }

    /// Ignore devices whose driver name matches `name` exactly.
    pub fn add_excluded_device(&self, name: &str) {
        self.registry.lock().unwrap().excluded.push(name.to_string());
    }

    // ---- pull-mode capability queries ----

    pub fn device_name(&self, id: u32) -> HubResult<String> {
        let registry = self.registry.lock().unwrap();
        let device = registry.get_device(id).ok_or(HubError::NotFound)?;
        Ok(device.name.clone())
    }

    pub fn device_classes(&self, id: u32) -> HubResult<DeviceClasses> {
        let registry = self.registry.lock().unwrap();
        let device = registry.get_device(id).ok_or(HubError::NotFound)?;
        Ok(device.classes)
    }

    /// Range descriptor for an absolute axis, straight from the driver.
    pub fn absolute_info(&self, id: u32, axis: u16) -> HubResult<AbsoluteAxisInfo> {
        let registry = self.registry.lock().unwrap();
        let device = registry.get_device(id).ok_or(HubError::NotFound)?;
        let info = ioctl::absolute_axis_info(device.as_raw_fd(), axis).map_err(|e| {
            log::warn!(
                "could not read absolute axis {} for {}: {}",
                axis,
                device.name,
                e
            );
            HubError::Io(e)
        })?;
        Ok(AbsoluteAxisInfo {
            min: info.minimum,
            max: info.maximum,
            flat: info.flat,
            fuzz: info.fuzz,
        })
    }

    /// Current down/up state of a raw scancode on the first keyboard.
    pub fn scancode_state(&self, scancode: u16) -> HubResult<bool> {
        self.device_scancode_state(0, scancode)
    }

    /// Current down/up state of a raw scancode on one device.
    pub fn device_scancode_state(&self, id: u32, scancode: u16) -> HubResult<bool> {
        if scancode as usize > KEY_MAX {
            return Err(HubError::NotFound);
        }
        let registry = self.registry.lock().unwrap();
        let device = registry.get_device(id).ok_or(HubError::NotFound)?;
        let mut bits = [0u8; KEY_BITMASK_BYTES];
        ioctl::key_state_bitmask(device.as_raw_fd(), &mut bits)?;
        Ok(test_bit(scancode as usize, &bits))
    }

    /// State of a switch through whichever device claimed it.
    pub fn switch_state(&self, sw: u16) -> HubResult<bool> {
        let id = {
            let registry = self.registry.lock().unwrap();
            registry.switches.claimed_by(sw).ok_or(HubError::NotFound)?
        };
        self.device_switch_state(id, sw)
    }

    /// State of a switch on one device.
    pub fn device_switch_state(&self, id: u32, sw: u16) -> HubResult<bool> {
        if sw as usize > SW_MAX {
            return Err(HubError::NotFound);
        }
        let registry = self.registry.lock().unwrap();
        let device = registry.get_device(id).ok_or(HubError::NotFound)?;
        let mut bits = [0u8; SW_BITMASK_BYTES];
        ioctl::switch_state_bitmask(device.as_raw_fd(), &mut bits)?;
        Ok(test_bit(sw as usize, &bits))
    }

    /// Whether any scancode producing `keycode` is down on the first
    /// keyboard.
    pub fn keycode_state(&self, keycode: i32) -> HubResult<bool> {
        self.device_keycode_state(0, keycode)
    }

    /// Whether any scancode producing `keycode` is down on one device.
    pub fn device_keycode_state(&self, id: u32, keycode: i32) -> HubResult<bool> {
        let registry = self.registry.lock().unwrap();
        let device = registry.get_device(id).ok_or(HubError::NotFound)?;
        let scancodes = device.layout.find_scancodes(keycode);
        let mut bits = [0u8; KEY_BITMASK_BYTES];
        ioctl::key_state_bitmask(device.as_raw_fd(), &mut bits)?;
        Ok(scancodes
            .into_iter()
            .any(|sc| (0..=KEY_MAX as i32).contains(&sc) && test_bit(sc as usize, &bits)))
    }

    /// Translate a raw scancode for a device, falling back to the first
    /// keyboard's layout when the device itself has no mapping.
    pub fn scancode_to_keycode(&self, id: u32, scancode: u16) -> HubResult<(i32, u32)> {
        let registry = self.registry.lock().unwrap();
        if let Some(device) = registry.get_device(id) {
            if let Some(mapped) = device.layout.map(scancode as i32) {
                return Ok(mapped);
            }
        }
        if registry.have_first_keyboard {
            if let Some(device) = registry.table.lookup(registry.first_keyboard_id) {
                if let Some(mapped) = device.layout.map(scancode as i32) {
                    return Ok(mapped);
                }
            }
        }
        Err(HubError::NotFound)
    }

    /// For each requested keycode, whether any open device has hardware
    /// keys producing it.
    pub fn has_keys(&self, keycodes: &[i32]) -> Vec<bool> {
        let registry = self.registry.lock().unwrap();
        keycodes
            .iter()
            .map(|&keycode| registry.table.devices().any(|d| d.has_keycode(keycode)))
            .collect()
    }

    // ---- event pump ----

    /// Block until the next event is available and return it.
    ///
    /// The first call opens the platform input: the inotify watch is
    /// established and the device directory is scanned once, so the
    /// initial calls report one `DEVICE_ADDED` per pre-existing device.
    /// Intended to be called forever from a single dispatcher thread.
    pub fn next_event(&self) -> HubEvent {
        let mut pump = self.pump.lock().unwrap();
        if !pump.opened {
            self.open_platform_input(&mut pump);
            pump.opened = true;
        }

        loop {
            // Report pending topology changes before going back to sleep.
            if let Some(record) = pump.closing.pop_front() {
                log::debug!(
                    "reporting device closed: id=0x{:x}, path={}",
                    record.id,
                    record.path.display()
                );
                let id = self.registry.lock().unwrap().visible_id(record.id);
                // Last reference: the fd closes when `record` drops.
                return HubEvent::device_removed(id);
            }
            if let Some(record) = pump.opening.pop_front() {
                log::debug!(
                    "reporting device opened: id=0x{:x}, path={}",
                    record.id,
                    record.path.display()
                );
                let id = self.registry.lock().unwrap().visible_id(record.id);
                return HubEvent::device_added(id);
            }

            self.wake_lock.release(WAKE_LOCK_TAG);
            let res = unsafe {
                libc::poll(
                    pump.poll_fds.as_mut_ptr(),
                    pump.poll_fds.len() as libc::nfds_t,
                    -1,
                )
            };
            // Capture errno before the wake-lock write can clobber it.
            let poll_err = if res < 0 {
                Some(io::Error::last_os_error())
            } else {
                None
            };
            self.wake_lock.acquire(WAKE_LOCK_TAG);

            if res <= 0 {
                let interrupted =
                    poll_err.as_ref().and_then(|e| e.raw_os_error()) == Some(libc::EINTR);
                if !interrupted {
                    log::warn!(
                        "poll failed: {}",
                        poll_err.unwrap_or_else(|| io::Error::other("no descriptors ready"))
                    );
                    std::thread::sleep(Duration::from_millis(100));
                }
                continue;
            }

            for i in 1..pump.poll_fds.len() {
                if pump.poll_fds[i].revents & libc::POLLIN == 0 {
                    continue;
                }
                let Some(device) = pump.devices[i].clone() else {
                    continue;
                };
                let iev = match read_one_event(device.as_raw_fd()) {
                    Ok(iev) => iev,
                    Err(e) => {
                        // Transient failure: keep the fd, the watcher will
                        // close it if the node actually went away.
                        log::warn!("could not get event from {}: {}", device.path.display(), e);
                        continue;
                    }
                };
                let mut event = HubEvent::default();
                event.device_id = self.registry.lock().unwrap().visible_id(device.id);
                event.kind = iev.type_ as u32;
                event.scancode = iev.code;
                if iev.type_ == EV_KEY {
                    if let Some((keycode, flags)) = device.layout.map(iev.code as i32) {
                        event.keycode = keycode;
                        event.flags = flags;
                    }
                } else {
                    event.keycode = iev.code as i32;
                }
                event.value = iev.value;
                event.when_ns = timeval_to_ns(&iev.time);
                return event;
            }

            // The watcher mutates the poll set, so it is drained only
            // after the descriptor scan above has finished.
            if pump.poll_fds[0].revents & libc::POLLIN != 0 {
                let notifications = match &pump.watcher {
                    Some(watcher) => watcher.drain(),
                    None => Vec::new(),
                };
                for notification in notifications {
                    match notification.kind {
                        WatchKind::Created => {
                            let _ = self.open_device(&mut pump, &notification.path);
                        }
                        WatchKind::Removed => {
                            let _ = self.close_device(&mut pump, &notification.path);
                        }
                    }
                }
            }
        }
    }

    // ---- discovery and close ----

    fn open_platform_input(&self, pump: &mut Pump) {
        let watcher = DeviceWatcher::new(&self.config.device_dir);
        pump.poll_fds[0].fd = watcher.raw_fd();
        pump.watcher = Some(watcher);

        match std::fs::read_dir(&self.config.device_dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if entry.file_name().to_string_lossy().starts_with('.') {
                        continue;
                    }
                    let _ = self.open_device(pump, &entry.path());
                }
                self.state.store(STATE_READY, Ordering::Release);
            }
            Err(e) => {
                log::error!(
                    "scan dir failed for {}: {}",
                    self.config.device_dir.display(),
                    e
                );
                self.state.store(STATE_FAILED, Ordering::Release);
            }
        }
    }

    /// Open and register one candidate device node. Failures are local to
    /// the candidate; `Ok(None)` means it was examined and rejected.
    fn open_device(&self, pump: &mut Pump, path: &Path) -> HubResult<Option<u32>> {
        log::debug!("opening device {}", path.display());
        let mut registry = self.registry.lock().unwrap();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                log::error!("could not open {}: {}", path.display(), e);
                HubError::Io(e)
            })?;
        let fd = file.as_raw_fd();

        let version = ioctl::driver_version(fd).map_err(|e| {
            log::error!("could not get driver version for {}: {}", path.display(), e);
            HubError::Io(e)
        })?;
        let identity = ioctl::device_identity(fd).map_err(|e| {
            log::error!("could not get driver id for {}: {}", path.display(), e);
            HubError::Io(e)
        })?;

        let probe = DeviceProbe::from_fd(fd);
        if registry.excluded.iter().any(|name| *name == probe.name) {
            log::info!("ignoring excluded device {} ({})", probe.name, path.display());
            return Ok(None);
        }
        log::debug!(
            "device {}: name={:?} bus={:04x} vendor={:04x} product={:04x} version={:04x} driver={}.{}.{}",
            path.display(),
            probe.name,
            identity.bustype,
            identity.vendor,
            identity.product,
            identity.version,
            version >> 16,
            (version >> 8) & 0xff,
            version & 0xff
        );

        self.register_device(pump, &mut registry, path, file.into(), probe)
    }

    /// Classification and registration once the candidate's capabilities
    /// are known. Split from `open_device` so capability fixtures can be
    /// replayed against it.
    fn register_device(
        &self,
        pump: &mut Pump,
        registry: &mut Registry,
        path: &Path,
        fd: OwnedFd,
        probe: DeviceProbe,
    ) -> HubResult<Option<u32>> {
        let mut classes = classify(&probe);

        let switches = probe.switches();
        let claims_headphone = switches.contains(&SW_HEADPHONE_INSERT)
            && registry.switches.claimed_by(SW_HEADPHONE_INSERT).is_none();
        if claims_headphone {
            classes |= DeviceClasses::HEADSET;
        }

        let mut layout = KeyLayoutMap::new();
        let mut using_default_keymap = false;
        let mut layout_path = self.config.keylayout_path(&probe.name);
        if classes.contains(DeviceClasses::KEYBOARD) {
            if !layout_path.is_file() {
                layout_path = self.config.default_keylayout_path();
                using_default_keymap = true;
            }
            if let Err(e) = layout.load(&layout_path) {
                log::warn!("could not load key layout {}: {}", layout_path.display(), e);
            }
        }

        if classes.is_empty() {
            log::debug!("dropping device {} ({}): no known class", path.display(), probe.name);
            return Ok(None);
        }

        let slot = registry.table.allocate_slot()?;
        let id = registry.table.reserve_id(slot);

        // Claims only happen for devices we keep, so a rejected device
        // can never leave a dangling switch owner behind.
        for sw in switches {
            registry.switches.claim(sw, id);
        }

        let mut key_bitmask = None;
        if classes.contains(DeviceClasses::KEYBOARD) {
            key_bitmask = Some(Box::new(probe.key_bitmask));

            if !registry.have_first_keyboard
                && !using_default_keymap
                && probe.name.contains("-keypad")
            {
                // The built-in keyboard answers to the well-known id 0.
                registry.have_first_keyboard = true;
                registry.first_keyboard_id = id;
                self.props.set("hw.keyboards.0.devname", &probe.name);
            } else if registry.first_keyboard_id == 0 {
                registry.first_keyboard_id = id;
            }
            self.props
                .set(&format!("hw.keyboards.{}.devname", id), &probe.name);

            let has_keycode = |keycode: i32| {
                layout
                    .find_scancodes(keycode)
                    .into_iter()
                    .any(|sc| {
                        (0..=KEY_MAX as i32).contains(&sc)
                            && test_bit(sc as usize, &probe.key_bitmask)
                    })
            };
            // 'Q' support is a cheap proxy for an alphabetic layout.
            if has_keycode(KEYCODE_Q) {
                classes |= DeviceClasses::ALPHAKEY;
            }
            if has_keycode(KEYCODE_DPAD_UP)
                && has_keycode(KEYCODE_DPAD_DOWN)
                && has_keycode(KEYCODE_DPAD_LEFT)
                && has_keycode(KEYCODE_DPAD_RIGHT)
                && has_keycode(KEYCODE_DPAD_CENTER)
            {
                classes |= DeviceClasses::DPAD;
            }
            log::info!(
                "new keyboard: id=0x{:x} name={:?} layout={}",
                id,
                probe.name,
                layout_path.display()
            );
        }

        let record = Arc::new(DeviceRecord::new(
            id,
            path.to_path_buf(),
            probe.name,
            probe.location,
            probe.unique_id,
            classes,
            key_bitmask,
            layout,
            fd,
        ));

        log::info!(
            "new device: path={} name={:?} id=0x{:x} index={} classes={}",
            record.path.display(),
            record.name,
            id,
            pump.poll_fds.len(),
            record.classes
        );

        registry.table.attach(record.clone());
        pump.poll_fds.push(libc::pollfd {
            fd: record.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        });
        pump.devices.push(Some(record.clone()));
        pump.opening.push_back(record);
        Ok(Some(id))
    }

    /// Close the open device matching `path` exactly.
    fn close_device(&self, pump: &mut Pump, path: &Path) -> HubResult<()> {
        let mut registry = self.registry.lock().unwrap();

        let index = pump
            .devices
            .iter()
            .position(|d| d.as_ref().is_some_and(|d| d.path == path));
        let Some(index) = index else {
            log::warn!("remove device: {} not found", path.display());
            return Err(HubError::NotFound);
        };
        // Compact the poll set in step with the device array.
        pump.poll_fds.remove(index);
        let Some(record) = pump.devices.remove(index) else {
            return Err(HubError::NotFound);
        };

        log::info!(
            "removed device: path={} name={:?} id=0x{:x} classes={}",
            record.path.display(),
            record.name,
            record.id,
            record.classes
        );

        registry.table.release(record.slot());
        registry.switches.clear_claims(record.id);

        if record.id == registry.first_keyboard_id {
            log::warn!(
                "built-in keyboard {} (id=0x{:x}) is closing",
                record.path.display(),
                record.id
            );
            registry.first_keyboard_id = 0;
            self.props.clear("hw.keyboards.0.devname");
        }
        self.props
            .clear(&format!("hw.keyboards.{}.devname", record.id));

        pump.closing.push_back(record);
        Ok(())
    }
}

impl Drop for EventHub {
    fn drop(&mut self) {
        self.wake_lock.release(WAKE_LOCK_TAG);
    }
}

/// Read exactly one kernel event record from a device descriptor.
fn read_one_event(fd: RawFd) -> io::Result<libc::input_event> {
    let mut iev: libc::input_event = unsafe { mem::zeroed() };
    let size = mem::size_of::<libc::input_event>();
    let res = unsafe { libc::read(fd, &mut iev as *mut _ as *mut libc::c_void, size) };
    if res < 0 {
        return Err(io::Error::last_os_error());
    }
    if res as usize != size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("wrong event size: {}", res),
        ));
    }
    Ok(iev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::set_bit;
    use crate::input::codes::{ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_TOUCH_MAJOR, BTN_GAMEPAD, EV_ABS};
    use crate::input::event::{DEVICE_ADDED, DEVICE_REMOVED};
    use crate::power::testing::RecordingWakeLock;
    use std::fs;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;

    struct Fixture {
        hub: EventHub,
        props: Arc<InMemoryProperties>,
    }

    /// Scratch layout root and (initially empty) device directory with
    /// the standard layout fixtures in place.
    fn fixture_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("evhub-hub-{}-{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("input")).unwrap();
        fs::create_dir_all(root.join("usr/keylayout")).unwrap();
        fs::write(
            root.join("usr/keylayout/qwerty.kl"),
            "key 16 Q\nkey 30 A\nkey 31 S\n",
        )
        .unwrap();
        fs::write(
            root.join("usr/keylayout/omap-keypad.kl"),
            "key 16 Q\n\
             key 103 DPAD_UP\n\
             key 108 DPAD_DOWN\n\
             key 105 DPAD_LEFT\n\
             key 106 DPAD_RIGHT\n\
             key 232 DPAD_CENTER\n",
        )
        .unwrap();
        root
    }

    fn fixture_config(root: &Path) -> HubConfig {
        HubConfig {
            device_dir: root.join("input"),
            keylayout_root: root.to_path_buf(),
            excluded_devices: Vec::new(),
        }
    }

    fn fixture(name: &str) -> Fixture {
        let root = fixture_root(name);
        let props = Arc::new(InMemoryProperties::new());
        let hub = EventHub::new(fixture_config(&root), Arc::new(NoopWakeLock), props.clone());
        Fixture { hub, props }
    }

    fn keyboard_probe(name: &str, scancodes: &[u16]) -> DeviceProbe {
        let mut probe = DeviceProbe {
            name: name.to_string(),
            ..DeviceProbe::default()
        };
        for &code in scancodes {
            set_bit(code as usize, &mut probe.key_bitmask);
        }
        probe
    }

    fn multitouch_probe(name: &str) -> DeviceProbe {
        let mut probe = DeviceProbe {
            name: name.to_string(),
            ..DeviceProbe::default()
        };
        set_bit(ABS_MT_TOUCH_MAJOR as usize, &mut probe.abs_bitmask);
        set_bit(ABS_MT_POSITION_X as usize, &mut probe.abs_bitmask);
        set_bit(ABS_MT_POSITION_Y as usize, &mut probe.abs_bitmask);
        probe
    }

    /// Register a fake device backed by a pipe. The returned writer feeds
    /// raw `input_event` records into the pump; it must outlive every
    /// `next_event` call or the pump sees a hangup instead of input.
    fn register(hub: &EventHub, path: &str, probe: DeviceProbe) -> (HubResult<Option<u32>>, File) {
        let (read_fd, write_fd) = nix::unistd::pipe().unwrap();
        let mut pump = hub.pump.lock().unwrap();
        let mut registry = hub.registry.lock().unwrap();
        let res = hub.register_device(&mut pump, &mut registry, Path::new(path), read_fd, probe);
        (res, File::from(write_fd))
    }

    fn close(hub: &EventHub, path: &str) -> HubResult<()> {
        let mut pump = hub.pump.lock().unwrap();
        hub.close_device(&mut pump, Path::new(path))
    }

    fn write_event(writer: &mut File, kind: u16, code: u16, value: i32, sec: i64, usec: i64) {
        let iev = libc::input_event {
            time: libc::timeval {
                tv_sec: sec,
                tv_usec: usec,
            },
            type_: kind,
            code,
            value,
        };
        let bytes = unsafe {
            std::slice::from_raw_parts(
                &iev as *const libc::input_event as *const u8,
                mem::size_of::<libc::input_event>(),
            )
        };
        writer.write_all(bytes).unwrap();
    }

    #[test]
    fn test_error_check_before_and_after_open() {
        let f = fixture("error-check");
        assert!(matches!(f.hub.error_check(), Err(HubError::Uninitialized)));
        let (res, _writer) = register(&f.hub, "/dev/input/event0", keyboard_probe("kbd", &[30]));
        res.unwrap().unwrap();
        let ev = f.hub.next_event();
        assert_eq!(ev.kind, DEVICE_ADDED);
        f.hub.error_check().unwrap();
    }

    #[test]
    fn test_keypad_discovery_becomes_first_keyboard() {
        let f = fixture("keypad");
        let probe = keyboard_probe("omap-keypad", &[16, 103, 105, 106, 108, 232]);
        let (res, _writer) = register(&f.hub, "/dev/input/event0", probe);
        let id = res.unwrap().unwrap();

        let classes = f.hub.device_classes(id).unwrap();
        assert_eq!(
            classes,
            DeviceClasses::KEYBOARD | DeviceClasses::ALPHAKEY | DeviceClasses::DPAD
        );

        assert_eq!(
            f.props.get("hw.keyboards.0.devname").as_deref(),
            Some("omap-keypad")
        );
        assert_eq!(
            f.props
                .get(&format!("hw.keyboards.{}.devname", id))
                .as_deref(),
            Some("omap-keypad")
        );

        // Legacy zero-addressing resolves to the keypad.
        assert_eq!(f.hub.device_name(0).unwrap(), "omap-keypad");

        // Its add notification is remapped to the well-known id 0.
        let ev = f.hub.next_event();
        assert_eq!(ev.kind, DEVICE_ADDED);
        assert_eq!(ev.device_id, 0);
    }

    #[test]
    fn test_multitouch_touchscreen_registration() {
        let f = fixture("mt");
        let (res, _writer) = register(&f.hub, "/dev/input/event3", multitouch_probe("mt-panel"));
        let id = res.unwrap().unwrap();
        assert_eq!(
            f.hub.device_classes(id).unwrap(),
            DeviceClasses::TOUCHSCREEN | DeviceClasses::TOUCHSCREEN_MT
        );
        // No layout is loaded for pure touch devices.
        assert!(matches!(
            f.hub.scancode_to_keycode(id, 16),
            Err(HubError::NotFound)
        ));
        assert!(f.props.is_empty());
    }

    #[test]
    fn test_buttons_only_device_is_dropped() {
        let f = fixture("buttons");
        let probe = keyboard_probe("gamepad", &[BTN_GAMEPAD, BTN_GAMEPAD + 1]);
        let (res, _writer) = register(&f.hub, "/dev/input/event9", probe);
        assert!(res.unwrap().is_none());
        let pump = f.hub.pump.lock().unwrap();
        assert_eq!(pump.devices.len(), 1);
        assert_eq!(pump.poll_fds.len(), 1);
        assert!(pump.opening.is_empty());
    }

    #[test]
    fn test_excluded_device_rejected_idempotently() {
        let f = fixture("excluded");
        f.hub.add_excluded_device("baddev");
        f.hub.add_excluded_device("baddev");

        // Exclusion applies in the full open path; register_device sits
        // below the name check, so exercise the check directly here.
        let registry = f.hub.registry.lock().unwrap();
        assert!(registry.excluded.iter().any(|n| n == "baddev"));
        drop(registry);

        let (res, _writer) = register(&f.hub, "/dev/input/event1", keyboard_probe("gooddev", &[30]));
        assert!(res.unwrap().is_some());
    }

    #[test]
    fn test_headphone_switch_claim_is_not_inherited() {
        let f = fixture("headset");

        let mut first = keyboard_probe("headset-jack", &[30]);
        set_bit(SW_HEADPHONE_INSERT as usize, &mut first.sw_bitmask);
        let (res, _writer1) = register(&f.hub, "/dev/input/event0", first);
        let id1 = res.unwrap().unwrap();

        let mut second = keyboard_probe("other-jack", &[30]);
        set_bit(SW_HEADPHONE_INSERT as usize, &mut second.sw_bitmask);
        let (res, _writer2) = register(&f.hub, "/dev/input/event1", second);
        let id2 = res.unwrap().unwrap();

        assert!(f
            .hub
            .device_classes(id1)
            .unwrap()
            .contains(DeviceClasses::HEADSET));
        assert!(!f
            .hub
            .device_classes(id2)
            .unwrap()
            .contains(DeviceClasses::HEADSET));

        // The claim exists (the probe fails on a pipe with an IO error,
        // not NotFound).
        assert!(matches!(
            f.hub.switch_state(SW_HEADPHONE_INSERT),
            Err(HubError::Io(_))
        ));

        close(&f.hub, "/dev/input/event0").unwrap();

        // Claim cleared, not inherited by the second device.
        assert!(matches!(
            f.hub.switch_state(SW_HEADPHONE_INSERT),
            Err(HubError::NotFound)
        ));
    }

    #[test]
    fn test_identifier_stability_across_slot_reuse() {
        let f = fixture("identity");
        let (res, _writer1) = register(&f.hub, "/dev/input/event0", keyboard_probe("first-kbd", &[30]));
        let old_id = res.unwrap().unwrap();
        assert_eq!(f.hub.device_name(old_id).unwrap(), "first-kbd");

        close(&f.hub, "/dev/input/event0").unwrap();
        assert!(matches!(
            f.hub.device_name(old_id),
            Err(HubError::NotFound)
        ));

        let (res, _writer2) = register(&f.hub, "/dev/input/event1", keyboard_probe("second-kbd", &[30]));
        let new_id = res.unwrap().unwrap();

        // Same slot, different sequence.
        assert_eq!(old_id & 0xffff, new_id & 0xffff);
        assert_ne!(old_id, new_id);

        assert!(matches!(
            f.hub.device_name(old_id),
            Err(HubError::NotFound)
        ));
        assert_eq!(f.hub.device_name(new_id).unwrap(), "second-kbd");

        let pump = f.hub.pump.lock().unwrap();
        assert_eq!(pump.poll_fds.len(), pump.devices.len());
        assert_eq!(pump.poll_fds.len(), 2);
    }

    #[test]
    fn test_add_and_remove_notifications_drain_in_order() {
        let f = fixture("pending");
        let (res, _writer1) = register(&f.hub, "/dev/input/event0", multitouch_probe("panel"));
        let ts_id = res.unwrap().unwrap();
        let (res, _writer2) = register(&f.hub, "/dev/input/event1", keyboard_probe("kbd", &[30]));
        let kbd_id = res.unwrap().unwrap();

        let first = f.hub.next_event();
        assert_eq!(first.kind, DEVICE_ADDED);
        assert_eq!(first.device_id, ts_id);
        // The keyboard became the first keyboard, so its id reads as 0.
        let second = f.hub.next_event();
        assert_eq!(second.kind, DEVICE_ADDED);
        assert_eq!(second.device_id, 0);
        assert_ne!(kbd_id, 0);

        close(&f.hub, "/dev/input/event0").unwrap();
        let removed = f.hub.next_event();
        assert_eq!(removed.kind, DEVICE_REMOVED);
        assert_eq!(removed.device_id, ts_id);
    }

    #[test]
    fn test_event_translation_through_layout() {
        let f = fixture("translate");
        // No layout of its own, so the qwerty fallback maps 30 -> A.
        let (res, mut writer) = register(&f.hub, "/dev/input/event5", keyboard_probe("test-kbd", &[16, 30]));
        res.unwrap().unwrap();

        let added = f.hub.next_event();
        assert_eq!(added.kind, DEVICE_ADDED);

        write_event(&mut writer, EV_KEY, 30, 1, 5, 20);
        let ev = f.hub.next_event();
        assert_eq!(ev.kind, EV_KEY as u32);
        assert_eq!(ev.scancode, 30);
        assert_eq!(ev.keycode, 29); // framework keycode A
        assert_eq!(ev.flags, 0);
        assert_eq!(ev.value, 1);
        assert_eq!(ev.when_ns, 5_000_020_000);
        assert_eq!(ev.device_id, 0); // sole keyboard is the first keyboard
    }

    #[test]
    fn test_unmapped_key_event_is_still_delivered() {
        let f = fixture("unmapped");
        let (res, mut writer) = register(&f.hub, "/dev/input/event5", keyboard_probe("test-kbd", &[30]));
        res.unwrap().unwrap();
        assert_eq!(f.hub.next_event().kind, DEVICE_ADDED);

        write_event(&mut writer, EV_KEY, 250, 1, 1, 0);
        let ev = f.hub.next_event();
        assert_eq!(ev.kind, EV_KEY as u32);
        assert_eq!(ev.scancode, 250);
        assert_eq!(ev.keycode, 0);
        assert_eq!(ev.flags, 0);
        assert_eq!(ev.value, 1);
    }

    #[test]
    fn test_non_key_event_passes_scancode_through() {
        let f = fixture("nonkey");
        let (res, mut writer) = register(&f.hub, "/dev/input/event2", multitouch_probe("panel"));
        let id = res.unwrap().unwrap();
        assert_eq!(f.hub.next_event().kind, DEVICE_ADDED);

        write_event(&mut writer, EV_ABS, ABS_MT_POSITION_X, 420, 2, 0);
        let ev = f.hub.next_event();
        assert_eq!(ev.kind, EV_ABS as u32);
        assert_eq!(ev.scancode, ABS_MT_POSITION_X);
        assert_eq!(ev.keycode, ABS_MT_POSITION_X as i32);
        assert_eq!(ev.value, 420);
        assert_eq!(ev.device_id, id);
    }

    #[test]
    fn test_wake_lock_released_only_around_poll() {
        let root = fixture_root("wakelock");
        let wake_lock = Arc::new(RecordingWakeLock::default());
        let props = Arc::new(InMemoryProperties::new());
        let hub = EventHub::new(fixture_config(&root), wake_lock.clone(), props);

        let (res, mut writer) = register(&hub, "/dev/input/event0", keyboard_probe("kbd", &[30]));
        res.unwrap().unwrap();

        // Draining a pending notification never touches the lock.
        assert_eq!(hub.next_event().kind, DEVICE_ADDED);
        assert_eq!(wake_lock.calls.lock().unwrap().as_slice(), ["acquire:KeyEvents"]);

        write_event(&mut writer, EV_KEY, 30, 1, 1, 0);
        assert_eq!(hub.next_event().kind, EV_KEY as u32);
        assert_eq!(
            wake_lock.calls.lock().unwrap().as_slice(),
            [
                "acquire:KeyEvents",
                "release:KeyEvents",
                "acquire:KeyEvents"
            ]
        );
    }

    #[test]
    fn test_has_keys_consults_cached_bitmasks() {
        let f = fixture("haskeys");
        // qwerty fallback maps 16 -> Q and 30 -> A, but the hardware only
        // reports scancode 30.
        let (res, _writer) = register(&f.hub, "/dev/input/event0", keyboard_probe("test-kbd", &[30]));
        res.unwrap().unwrap();

        let flags = f.hub.has_keys(&[29, KEYCODE_Q, KEYCODE_DPAD_UP]);
        assert_eq!(flags, vec![true, false, false]);
    }

    #[test]
    fn test_scancode_to_keycode_falls_back_to_first_keyboard() {
        let f = fixture("fallback");
        let keypad = keyboard_probe("omap-keypad", &[16, 103, 105, 106, 108, 232]);
        let (res, _writer1) = register(&f.hub, "/dev/input/event0", keypad);
        res.unwrap().unwrap();

        let (res, _writer2) = register(&f.hub, "/dev/input/event1", multitouch_probe("panel"));
        let ts_id = res.unwrap().unwrap();

        // The touchscreen has no layout; the first keyboard's map answers.
        assert_eq!(f.hub.scancode_to_keycode(ts_id, 16).unwrap(), (KEYCODE_Q, 0));
        assert!(matches!(
            f.hub.scancode_to_keycode(ts_id, 77),
            Err(HubError::NotFound)
        ));
    }

    #[test]
    fn test_close_clears_published_properties() {
        let f = fixture("props");
        let probe = keyboard_probe("omap-keypad", &[16, 103, 105, 106, 108, 232]);
        let (res, _writer) = register(&f.hub, "/dev/input/event0", probe);
        let id = res.unwrap().unwrap();
        assert!(f.props.get("hw.keyboards.0.devname").is_some());
        assert!(f
            .props
            .get(&format!("hw.keyboards.{}.devname", id))
            .is_some());

        close(&f.hub, "/dev/input/event0").unwrap();
        assert!(f.props.is_empty());
    }

    #[test]
    fn test_close_unknown_path_is_not_found() {
        let f = fixture("close-unknown");
        assert!(matches!(
            close(&f.hub, "/dev/input/event99"),
            Err(HubError::NotFound)
        ));
    }
}
