// Evhub Core Library
// Linux evdev discovery, classification and event multiplexing

pub mod bits;
pub mod config;
pub mod device;
pub mod error;
pub mod hub;
pub mod input;
pub mod keylayout;
pub mod power;
pub mod props;

pub use config::{ConfigError, HubConfig};
pub use device::{classify, DeviceClasses, DeviceProbe, DeviceRecord};
pub use error::{HubError, HubResult};
pub use hub::{AbsoluteAxisInfo, EventHub};
pub use input::{HubEvent, DEVICE_ADDED, DEVICE_REMOVED};
pub use keylayout::KeyLayoutMap;
pub use power::{NoopWakeLock, SysfsWakeLock, WakeLock};
pub use props::{InMemoryProperties, PropertySink};
