// Evhub Property Publishing
// Key/value sink where the hub announces discovered keyboards

use std::collections::HashMap;
use std::sync::Mutex;

/// Publishing sink for system properties.
///
/// The hub writes `hw.keyboards.<id>.devname` entries here as keyboards
/// come and go, plus `hw.keyboards.0.devname` for the designated first
/// keyboard. Injected as a handle so the platform store can be swapped in.
pub trait PropertySink: Send + Sync {
    fn set(&self, name: &str, value: &str);
    fn clear(&self, name: &str);
}

/// In-memory property store. Useful for tests and for tools that only
/// want to display what the hub would publish.
#[derive(Debug, Default)]
pub struct InMemoryProperties {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.values.lock().unwrap().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().unwrap().is_empty()
    }
}

impl PropertySink for InMemoryProperties {
    fn set(&self, name: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    fn clear(&self, name: &str) {
        self.values.lock().unwrap().remove(name);
    }
}
