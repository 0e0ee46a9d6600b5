// Evhub Device Layer
// Capability probing, classification and per-device state

mod classes;
mod probe;
mod record;

pub use classes::DeviceClasses;
pub use probe::{classify, DeviceProbe};
pub use record::DeviceRecord;
