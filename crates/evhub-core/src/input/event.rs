// Evhub Input Layer - Event Records
// Framework-level event shape produced by the pump

/// Synthetic event type reported when a device finishes opening.
/// Deliberately outside the `EV_*` range used by the kernel.
pub const DEVICE_ADDED: u32 = 0x1000_0000;

/// Synthetic event type reported when a device has been removed.
pub const DEVICE_REMOVED: u32 = 0x2000_0000;

/// One translated event as returned by `EventHub::next_event`.
///
/// For raw kernel events `kind` is the `input_event` type, `scancode` the
/// code and `value` the value. `EV_KEY` events additionally carry the
/// framework keycode and flags resolved through the device's layout map.
/// For the synthetic `DEVICE_ADDED` / `DEVICE_REMOVED` kinds only
/// `device_id` and `kind` are meaningful; every other field stays zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubEvent {
    /// Composite device id, remapped to 0 for the designated first keyboard
    pub device_id: u32,
    /// Kernel event type, or one of the synthetic `DEVICE_*` values
    pub kind: u32,
    /// Raw hardware scancode
    pub scancode: u16,
    /// Framework keycode (0 when the layout map has no entry)
    pub keycode: i32,
    /// Layout flags attached to the mapping
    pub flags: u32,
    /// Raw event value
    pub value: i32,
    /// Event timestamp in nanoseconds (`tv_sec * 1e9 + tv_usec * 1e3`)
    pub when_ns: i64,
}

impl HubEvent {
    pub(crate) fn device_added(device_id: u32) -> Self {
        HubEvent {
            device_id,
            kind: DEVICE_ADDED,
            ..HubEvent::default()
        }
    }

    pub(crate) fn device_removed(device_id: u32) -> Self {
        HubEvent {
            device_id,
            kind: DEVICE_REMOVED,
            ..HubEvent::default()
        }
    }
}

/// Nanosecond timestamp from the kernel's per-event timeval.
pub(crate) fn timeval_to_ns(time: &libc::timeval) -> i64 {
    time.tv_sec as i64 * 1_000_000_000 + time.tv_usec as i64 * 1_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::codes::EV_KEY;

    #[test]
    fn test_synthetic_kinds_are_outside_kernel_range() {
        assert_ne!(DEVICE_ADDED, DEVICE_REMOVED);
        assert!(DEVICE_ADDED > u16::MAX as u32);
        assert!(DEVICE_REMOVED > u16::MAX as u32);
        assert_ne!(DEVICE_ADDED, EV_KEY as u32);
    }

    #[test]
    fn test_timeval_to_ns() {
        let tv = libc::timeval {
            tv_sec: 3,
            tv_usec: 250,
        };
        assert_eq!(timeval_to_ns(&tv), 3_000_250_000);
    }

    #[test]
    fn test_default_event_is_zeroed() {
        let ev = HubEvent::default();
        assert_eq!(ev.device_id, 0);
        assert_eq!(ev.kind, 0);
        assert_eq!(ev.keycode, 0);
        assert_eq!(ev.when_ns, 0);
    }
}
