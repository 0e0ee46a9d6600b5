// Evhub Input Layer - Evdev Ioctls
// nix-based ioctl definitions for capability and state queries

use std::io;
use std::mem;
use std::os::unix::io::RawFd;

use nix::{ioctl_read, ioctl_read_buf, request_code_read};

ioctl_read!(eviocgversion, b'E', 0x01, libc::c_int);
ioctl_read!(eviocgid, b'E', 0x02, libc::input_id);
ioctl_read_buf!(eviocgname, b'E', 0x06, u8);
ioctl_read_buf!(eviocgphys, b'E', 0x07, u8);
ioctl_read_buf!(eviocguniq, b'E', 0x08, u8);
ioctl_read_buf!(eviocgkey, b'E', 0x18, u8);
ioctl_read_buf!(eviocgsw, b'E', 0x1b, u8);

// EVIOCGBIT(ev, len) carries the event type in the ioctl number
ioctl_read_buf!(eviocgbit_key, b'E', 0x21, u8);
ioctl_read_buf!(eviocgbit_rel, b'E', 0x22, u8);
ioctl_read_buf!(eviocgbit_abs, b'E', 0x23, u8);
ioctl_read_buf!(eviocgbit_sw, b'E', 0x25, u8);

/// Driver version from `EVIOCGVERSION`. Failure is fatal for a candidate.
pub fn driver_version(fd: RawFd) -> io::Result<i32> {
    let mut version: libc::c_int = 0;
    unsafe { eviocgversion(fd, &mut version) }.map_err(io::Error::from)?;
    Ok(version)
}

/// Bus/vendor/product/version identity from `EVIOCGID`.
pub fn device_identity(fd: RawFd) -> io::Result<libc::input_id> {
    let mut id: libc::input_id = unsafe { mem::zeroed() };
    unsafe { eviocgid(fd, &mut id) }.map_err(io::Error::from)?;
    Ok(id)
}

fn string_ioctl(
    fd: RawFd,
    ioctl: unsafe fn(libc::c_int, &mut [u8]) -> nix::Result<libc::c_int>,
) -> Option<String> {
    let mut buf = [0u8; 80];
    match unsafe { ioctl(fd, &mut buf) } {
        // The kernel returns the string length including the NUL; anything
        // shorter than one byte means the driver has nothing to report.
        Ok(len) if len >= 1 => {
            let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            Some(String::from_utf8_lossy(&buf[..end]).into_owned())
        }
        _ => None,
    }
}

/// Human-readable device name from `EVIOCGNAME`.
pub fn device_name(fd: RawFd) -> Option<String> {
    string_ioctl(fd, eviocgname)
}

/// Physical location from `EVIOCGPHYS`.
pub fn device_location(fd: RawFd) -> Option<String> {
    string_ioctl(fd, eviocgphys)
}

/// Unique identifier from `EVIOCGUNIQ`.
pub fn device_unique_id(fd: RawFd) -> Option<String> {
    string_ioctl(fd, eviocguniq)
}

fn bitmask_ioctl(
    fd: RawFd,
    ioctl: unsafe fn(libc::c_int, &mut [u8]) -> nix::Result<libc::c_int>,
    bits: &mut [u8],
) -> bool {
    bits.fill(0);
    unsafe { ioctl(fd, bits) }.is_ok()
}

/// `EV_KEY` capability bitmask. Returns false (bits all zero) when the
/// driver does not answer; that capability is then treated as absent.
pub fn key_capability_bitmask(fd: RawFd, bits: &mut [u8]) -> bool {
    bitmask_ioctl(fd, eviocgbit_key, bits)
}

/// `EV_REL` capability bitmask.
pub fn rel_capability_bitmask(fd: RawFd, bits: &mut [u8]) -> bool {
    bitmask_ioctl(fd, eviocgbit_rel, bits)
}

/// `EV_ABS` capability bitmask.
pub fn abs_capability_bitmask(fd: RawFd, bits: &mut [u8]) -> bool {
    bitmask_ioctl(fd, eviocgbit_abs, bits)
}

/// `EV_SW` capability bitmask.
pub fn sw_capability_bitmask(fd: RawFd, bits: &mut [u8]) -> bool {
    bitmask_ioctl(fd, eviocgbit_sw, bits)
}

/// Current key state bitmask from `EVIOCGKEY`.
pub fn key_state_bitmask(fd: RawFd, bits: &mut [u8]) -> io::Result<()> {
    bits.fill(0);
    unsafe { eviocgkey(fd, bits) }.map_err(io::Error::from)?;
    Ok(())
}

/// Current switch state bitmask from `EVIOCGSW`.
pub fn switch_state_bitmask(fd: RawFd, bits: &mut [u8]) -> io::Result<()> {
    bits.fill(0);
    unsafe { eviocgsw(fd, bits) }.map_err(io::Error::from)?;
    Ok(())
}

/// Absolute axis range descriptor from `EVIOCGABS(axis)`.
///
/// The axis number is part of the ioctl request, so the request code is
/// built at runtime rather than through the fixed-number macros.
pub fn absolute_axis_info(fd: RawFd, axis: u16) -> io::Result<libc::input_absinfo> {
    let mut info: libc::input_absinfo = unsafe { mem::zeroed() };
    let req = request_code_read!(
        b'E',
        0x40 + axis as u32,
        mem::size_of::<libc::input_absinfo>()
    );
    let res = unsafe { libc::ioctl(fd, req as libc::c_ulong, &mut info) };
    if res < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(info)
}
