// Evhub Device Layer - Device Classes
// Bitset describing what kind of input a device produces

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Logical device classes assigned during discovery.
///
/// A device may belong to several classes at once (a keypad with a
/// d-pad is `KEYBOARD | DPAD`). A device that ends classification with no
/// class at all is not monitored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct DeviceClasses(u32);

impl DeviceClasses {
    pub const NONE: DeviceClasses = DeviceClasses(0);
    /// Has keys below `BTN_MISC`
    pub const KEYBOARD: DeviceClasses = DeviceClasses(0x0000_0001);
    /// Keyboard with an alphabetic layout (can type the letter Q)
    pub const ALPHAKEY: DeviceClasses = DeviceClasses(0x0000_0002);
    /// Absolute-coordinate touch input
    pub const TOUCHSCREEN: DeviceClasses = DeviceClasses(0x0000_0004);
    /// Relative pointer without left/right buttons
    pub const TRACKBALL: DeviceClasses = DeviceClasses(0x0000_0008);
    /// Relative pointer with left and right buttons
    pub const MOUSE: DeviceClasses = DeviceClasses(0x0000_0010);
    /// All five directional pad keys
    pub const DPAD: DeviceClasses = DeviceClasses(0x0000_0020);
    /// Multi-touch capable touchscreen
    pub const TOUCHSCREEN_MT: DeviceClasses = DeviceClasses(0x0000_0040);
    /// Owns the headphone-insert switch
    pub const HEADSET: DeviceClasses = DeviceClasses(0x0000_0080);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: DeviceClasses) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for DeviceClasses {
    type Output = DeviceClasses;

    fn bitor(self, rhs: DeviceClasses) -> DeviceClasses {
        DeviceClasses(self.0 | rhs.0)
    }
}

impl BitOrAssign for DeviceClasses {
    fn bitor_assign(&mut self, rhs: DeviceClasses) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for DeviceClasses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: &[(DeviceClasses, &str)] = &[
            (DeviceClasses::KEYBOARD, "keyboard"),
            (DeviceClasses::ALPHAKEY, "alphakey"),
            (DeviceClasses::TOUCHSCREEN, "touchscreen"),
            (DeviceClasses::TRACKBALL, "trackball"),
            (DeviceClasses::MOUSE, "mouse"),
            (DeviceClasses::DPAD, "dpad"),
            (DeviceClasses::TOUCHSCREEN_MT, "touchscreen-mt"),
            (DeviceClasses::HEADSET, "headset"),
        ];
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for &(class, name) in NAMES {
            if self.contains(class) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}
