// Evhub Key Layout
// Scancode to framework-keycode map loaded from .kl text files

pub mod keycodes;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{HubError, HubResult};

/// A device's scancode→(keycode, flags) map.
///
/// Layout files are line oriented:
///
/// ```text
/// # comment
/// key 30   A
/// key 115  VOLUME_UP  WAKE
/// ```
///
/// Lines that do not parse are logged and skipped, so a partially broken
/// file still yields a usable map.
#[derive(Debug, Default)]
pub struct KeyLayoutMap {
    by_scancode: HashMap<i32, (i32, u32)>,
}

impl KeyLayoutMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `path`, replacing the current contents. On error the map is
    /// left empty but remains usable.
    pub fn load(&mut self, path: &Path) -> HubResult<()> {
        self.by_scancode.clear();
        let contents = fs::read_to_string(path).map_err(HubError::Io)?;
        for (lineno, line) in contents.lines().enumerate() {
            self.parse_line(path, lineno + 1, line);
        }
        log::debug!(
            "loaded {} mappings from {}",
            self.by_scancode.len(),
            path.display()
        );
        Ok(())
    }

    fn parse_line(&mut self, path: &Path, lineno: usize, line: &str) {
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            return;
        };
        if keyword.starts_with('#') {
            return;
        }
        if keyword != "key" {
            log::warn!("{}:{}: unknown keyword {:?}", path.display(), lineno, keyword);
            return;
        }
        let Some(scancode) = tokens.next().and_then(parse_scancode) else {
            log::warn!("{}:{}: bad or missing scancode", path.display(), lineno);
            return;
        };
        let Some(keycode) = tokens.next().and_then(keycodes::keycode_for_label) else {
            log::warn!("{}:{}: bad or missing keycode label", path.display(), lineno);
            return;
        };
        let mut flags = 0u32;
        for token in tokens {
            match keycodes::flag_for_label(token) {
                Some(flag) => flags |= flag,
                None => {
                    log::warn!("{}:{}: unknown flag {:?}", path.display(), lineno, token);
                    return;
                }
            }
        }
        self.by_scancode.insert(scancode, (keycode, flags));
    }

    /// Forward lookup: raw scancode to (keycode, flags).
    pub fn map(&self, scancode: i32) -> Option<(i32, u32)> {
        self.by_scancode.get(&scancode).copied()
    }

    /// Reverse lookup: every scancode that produces `keycode`.
    pub fn find_scancodes(&self, keycode: i32) -> Vec<i32> {
        let mut codes: Vec<i32> = self
            .by_scancode
            .iter()
            .filter(|(_, &(kc, _))| kc == keycode)
            .map(|(&sc, _)| sc)
            .collect();
        codes.sort_unstable();
        codes
    }

    pub fn is_empty(&self) -> bool {
        self.by_scancode.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_scancode.len()
    }
}

fn parse_scancode(token: &str) -> Option<i32> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        i32::from_str_radix(hex, 16).ok()
    } else {
        token.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::keycodes::*;
    use super::*;
    use std::io::Write;

    fn write_layout(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("evhub-kl-{}-{}", std::process::id(), name));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_and_map() {
        let path = write_layout(
            "basic.kl",
            "# test layout\n\
             key 30 A\n\
             key 16 Q\n\
             key 115 VOLUME_UP WAKE\n",
        );
        let mut map = KeyLayoutMap::new();
        map.load(&path).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.map(30), Some((29, 0)));
        assert_eq!(map.map(16), Some((KEYCODE_Q, 0)));
        assert_eq!(map.map(115), Some((24, FLAG_WAKE)));
        assert_eq!(map.map(99), None);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_hex_scancode() {
        let path = write_layout("hex.kl", "key 0x1e A\n");
        let mut map = KeyLayoutMap::new();
        map.load(&path).unwrap();
        assert_eq!(map.map(30), Some((29, 0)));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let path = write_layout(
            "bad.kl",
            "key 30 A\n\
             key notanumber B\n\
             key 31 NOT_A_LABEL\n\
             bogus 32 C\n\
             key 33 D UNKNOWN_FLAG\n\
             key 34 E\n",
        );
        let mut map = KeyLayoutMap::new();
        map.load(&path).unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.map(30).is_some());
        assert!(map.map(34).is_some());
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file_leaves_empty_usable_map() {
        let mut map = KeyLayoutMap::new();
        let err = map
            .load(Path::new("/nonexistent/evhub/test.kl"))
            .unwrap_err();
        assert!(matches!(err, HubError::Io(_)));
        assert!(map.is_empty());
        assert_eq!(map.map(30), None);
        assert!(map.find_scancodes(29).is_empty());
    }

    #[test]
    fn test_find_scancodes_reverse_lookup() {
        let path = write_layout(
            "reverse.kl",
            "key 30 A\n\
             key 90 A\n\
             key 16 Q\n",
        );
        let mut map = KeyLayoutMap::new();
        map.load(&path).unwrap();
        assert_eq!(map.find_scancodes(29), vec![30, 90]);
        assert_eq!(map.find_scancodes(KEYCODE_Q), vec![16]);
        assert!(map.find_scancodes(54).is_empty());
        fs::remove_file(path).unwrap();
    }
}
