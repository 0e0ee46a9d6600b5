// Evhub Device Layer - Capability Probe
// Capability snapshot pulled over ioctl, and the pure classifier over it

use std::os::unix::io::RawFd;

use crate::bits::test_bit;
use crate::device::classes::DeviceClasses;
use crate::input::codes::*;
use crate::input::ioctl;

/// Everything discovery learns about a candidate device before it decides
/// whether to keep it.
///
/// The probe is a plain value so classification is a deterministic function
/// of its contents; the live path fills it from ioctls, fixtures build it
/// by hand.
#[derive(Debug, Clone)]
pub struct DeviceProbe {
    /// Human name from `EVIOCGNAME`, empty when the driver has none
    pub name: String,
    /// Physical location from `EVIOCGPHYS`
    pub location: String,
    /// Unique id from `EVIOCGUNIQ`
    pub unique_id: String,
    pub key_bitmask: [u8; KEY_BITMASK_BYTES],
    pub rel_bitmask: [u8; REL_BITMASK_BYTES],
    pub abs_bitmask: [u8; ABS_BITMASK_BYTES],
    pub sw_bitmask: [u8; SW_BITMASK_BYTES],
}

impl Default for DeviceProbe {
    fn default() -> Self {
        DeviceProbe {
            name: String::new(),
            location: String::new(),
            unique_id: String::new(),
            key_bitmask: [0; KEY_BITMASK_BYTES],
            rel_bitmask: [0; REL_BITMASK_BYTES],
            abs_bitmask: [0; ABS_BITMASK_BYTES],
            sw_bitmask: [0; SW_BITMASK_BYTES],
        }
    }
}

impl DeviceProbe {
    /// Pull the capability bitmasks for an open device.
    ///
    /// A capability whose ioctl fails stays all-zero, which downstream
    /// code reads as "absent". Only `EVIOCGVERSION`/`EVIOCGID` failures
    /// (checked by the caller before probing) disqualify a device.
    pub fn from_fd(fd: RawFd) -> Self {
        let mut probe = DeviceProbe {
            name: ioctl::device_name(fd).unwrap_or_default(),
            location: ioctl::device_location(fd).unwrap_or_default(),
            unique_id: ioctl::device_unique_id(fd).unwrap_or_default(),
            ..DeviceProbe::default()
        };
        ioctl::key_capability_bitmask(fd, &mut probe.key_bitmask);
        ioctl::rel_capability_bitmask(fd, &mut probe.rel_bitmask);
        ioctl::abs_capability_bitmask(fd, &mut probe.abs_bitmask);
        ioctl::sw_capability_bitmask(fd, &mut probe.sw_bitmask);
        probe
    }

    /// Switch codes this device reports, in ascending order.
    pub fn switches(&self) -> Vec<u16> {
        (0..=SW_MAX as u16)
            .filter(|&sw| test_bit(sw as usize, &self.sw_bitmask))
            .collect()
    }
}

/// Classify a capability snapshot.
///
/// This covers the classes that depend only on the bitmasks; ALPHAKEY,
/// DPAD and HEADSET need the layout map or the switch table and are
/// resolved by the hub during registration.
pub fn classify(probe: &DeviceProbe) -> DeviceClasses {
    let mut classes = DeviceClasses::NONE;

    // A keyboard has at least one key below BTN_MISC. Button-only devices
    // (gamepads, media remotes with high key codes) must not qualify.
    if (0..BTN_MISC as usize).any(|code| test_bit(code, &probe.key_bitmask)) {
        classes |= DeviceClasses::KEYBOARD;
    }

    if test_bit(BTN_MOUSE as usize, &probe.key_bitmask)
        && test_bit(REL_X as usize, &probe.rel_bitmask)
        && test_bit(REL_Y as usize, &probe.rel_bitmask)
    {
        if test_bit(BTN_LEFT as usize, &probe.key_bitmask)
            && test_bit(BTN_RIGHT as usize, &probe.key_bitmask)
        {
            classes |= DeviceClasses::MOUSE;
        } else {
            classes |= DeviceClasses::TRACKBALL;
        }
    }

    if test_bit(ABS_MT_TOUCH_MAJOR as usize, &probe.abs_bitmask)
        && test_bit(ABS_MT_POSITION_X as usize, &probe.abs_bitmask)
        && test_bit(ABS_MT_POSITION_Y as usize, &probe.abs_bitmask)
    {
        classes |= DeviceClasses::TOUCHSCREEN | DeviceClasses::TOUCHSCREEN_MT;
    } else if test_bit(BTN_TOUCH as usize, &probe.key_bitmask)
        && test_bit(ABS_X as usize, &probe.abs_bitmask)
        && test_bit(ABS_Y as usize, &probe.abs_bitmask)
    {
        classes |= DeviceClasses::TOUCHSCREEN;
    }

    classes
}
