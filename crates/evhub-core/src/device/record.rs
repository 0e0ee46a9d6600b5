// Evhub Device Layer - Device Record
// Per-open-device state owned by the hub

use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::PathBuf;

use crate::bits::test_bit;
use crate::device::classes::DeviceClasses;
use crate::input::codes::{KEY_BITMASK_BYTES, KEY_MAX};
use crate::keylayout::KeyLayoutMap;

/// State for one open input device.
///
/// Records are immutable once registered and shared behind `Arc`: the pump
/// holds one reference per poll-set entry, the identity table another, and
/// the pending queues keep the final reference alive until the removal
/// event has been delivered. The fd closes when the last reference drops.
#[derive(Debug)]
pub struct DeviceRecord {
    /// Composite identifier: low 16 bits slot, next 15 bits sequence
    pub id: u32,
    /// Device node path this record was opened from
    pub path: PathBuf,
    /// Human name from the driver, possibly empty
    pub name: String,
    /// Physical location string, possibly empty
    pub location: String,
    /// Unique id string, possibly empty
    pub unique_id: String,
    /// Classes assigned during discovery
    pub classes: DeviceClasses,
    /// `EV_KEY` capability bitmask, cached for keyboards only
    pub key_bitmask: Option<Box<[u8; KEY_BITMASK_BYTES]>>,
    /// Scancode→keycode map; empty for non-keyboards
    pub layout: KeyLayoutMap,
    fd: OwnedFd,
}

impl DeviceRecord {
    pub(crate) fn new(
        id: u32,
        path: PathBuf,
        name: String,
        location: String,
        unique_id: String,
        classes: DeviceClasses,
        key_bitmask: Option<Box<[u8; KEY_BITMASK_BYTES]>>,
        layout: KeyLayoutMap,
        fd: OwnedFd,
    ) -> Self {
        DeviceRecord {
            id,
            path,
            name,
            location,
            unique_id,
            classes,
            key_bitmask,
            layout,
            fd,
        }
    }

    /// Identity-table slot this record occupies.
    pub fn slot(&self) -> usize {
        (self.id & 0xffff) as usize
    }

    /// Whether the layout maps `keycode` to a scancode the hardware
    /// actually has. Only meaningful for keyboards.
    pub fn has_keycode(&self, keycode: i32) -> bool {
        let Some(bitmask) = &self.key_bitmask else {
            return false;
        };
        self.layout
            .find_scancodes(keycode)
            .into_iter()
            .any(|sc| (0..=KEY_MAX as i32).contains(&sc) && test_bit(sc as usize, &bitmask[..]))
    }
}

impl AsRawFd for DeviceRecord {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
