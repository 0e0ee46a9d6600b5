// Evhub Key Layout - Framework Keycodes
// Semantic key identifiers and the label/flag tables used by .kl files

/// Framework keycode for the letter Q, probed to detect alpha-capable
/// keyboards.
pub const KEYCODE_Q: i32 = 45;

pub const KEYCODE_DPAD_UP: i32 = 19;
pub const KEYCODE_DPAD_DOWN: i32 = 20;
pub const KEYCODE_DPAD_LEFT: i32 = 21;
pub const KEYCODE_DPAD_RIGHT: i32 = 22;
pub const KEYCODE_DPAD_CENTER: i32 = 23;

// Mapping flags a layout line may attach to a key
pub const FLAG_WAKE: u32 = 0x0000_0001;
pub const FLAG_WAKE_DROPPED: u32 = 0x0000_0002;
pub const FLAG_SHIFT: u32 = 0x0000_0004;
pub const FLAG_CAPS_LOCK: u32 = 0x0000_0008;
pub const FLAG_ALT: u32 = 0x0000_0010;
pub const FLAG_ALT_GR: u32 = 0x0000_0020;
pub const FLAG_MENU: u32 = 0x0000_0040;
pub const FLAG_LAUNCHER: u32 = 0x0000_0080;

/// Label table for layout files. Order matches the framework's keycode
/// numbering, which starts at 1 (0 is the unknown keycode).
const KEYCODE_LABELS: &[(&str, i32)] = &[
    ("SOFT_LEFT", 1),
    ("SOFT_RIGHT", 2),
    ("HOME", 3),
    ("BACK", 4),
    ("CALL", 5),
    ("ENDCALL", 6),
    ("0", 7),
    ("1", 8),
    ("2", 9),
    ("3", 10),
    ("4", 11),
    ("5", 12),
    ("6", 13),
    ("7", 14),
    ("8", 15),
    ("9", 16),
    ("STAR", 17),
    ("POUND", 18),
    ("DPAD_UP", 19),
    ("DPAD_DOWN", 20),
    ("DPAD_LEFT", 21),
    ("DPAD_RIGHT", 22),
    ("DPAD_CENTER", 23),
    ("VOLUME_UP", 24),
    ("VOLUME_DOWN", 25),
    ("POWER", 26),
    ("CAMERA", 27),
    ("CLEAR", 28),
    ("A", 29),
    ("B", 30),
    ("C", 31),
    ("D", 32),
    ("E", 33),
    ("F", 34),
    ("G", 35),
    ("H", 36),
    ("I", 37),
    ("J", 38),
    ("K", 39),
    ("L", 40),
    ("M", 41),
    ("N", 42),
    ("O", 43),
    ("P", 44),
    ("Q", 45),
    ("R", 46),
    ("S", 47),
    ("T", 48),
    ("U", 49),
    ("V", 50),
    ("W", 51),
    ("X", 52),
    ("Y", 53),
    ("Z", 54),
    ("COMMA", 55),
    ("PERIOD", 56),
    ("ALT_LEFT", 57),
    ("ALT_RIGHT", 58),
    ("SHIFT_LEFT", 59),
    ("SHIFT_RIGHT", 60),
    ("TAB", 61),
    ("SPACE", 62),
    ("SYM", 63),
    ("EXPLORER", 64),
    ("ENVELOPE", 65),
    ("ENTER", 66),
    ("DEL", 67),
    ("GRAVE", 68),
    ("MINUS", 69),
    ("EQUALS", 70),
    ("LEFT_BRACKET", 71),
    ("RIGHT_BRACKET", 72),
    ("BACKSLASH", 73),
    ("SEMICOLON", 74),
    ("APOSTROPHE", 75),
    ("SLASH", 76),
    ("AT", 77),
    ("NUM", 78),
    ("HEADSETHOOK", 79),
    ("FOCUS", 80),
    ("PLUS", 81),
    ("MENU", 82),
    ("NOTIFICATION", 83),
    ("SEARCH", 84),
];

const FLAG_LABELS: &[(&str, u32)] = &[
    ("WAKE", FLAG_WAKE),
    ("WAKE_DROPPED", FLAG_WAKE_DROPPED),
    ("SHIFT", FLAG_SHIFT),
    ("CAPS_LOCK", FLAG_CAPS_LOCK),
    ("ALT", FLAG_ALT),
    ("ALT_GR", FLAG_ALT_GR),
    ("MENU", FLAG_MENU),
    ("LAUNCHER", FLAG_LAUNCHER),
];

/// Resolve a keycode label from a layout file, e.g. `"Q"` or `"DPAD_UP"`.
pub fn keycode_for_label(label: &str) -> Option<i32> {
    KEYCODE_LABELS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|&(_, code)| code)
}

/// Resolve a flag label from a layout file, e.g. `"WAKE"`.
pub fn flag_for_label(label: &str) -> Option<u32> {
    FLAG_LABELS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|&(_, flag)| flag)
}
