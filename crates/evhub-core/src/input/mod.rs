// Evhub Input Layer
// Kernel constants, ioctl plumbing and the framework event record

pub mod codes;
pub mod event;
pub mod ioctl;

pub use event::{HubEvent, DEVICE_ADDED, DEVICE_REMOVED};
