// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Key name to virtual-key code lookup. Names follow the spelling a keyboard capture
//! produces (`D1` for the top-row 1, `OemPlus`, `MediaPlayPause`), with a handful of
//! everyday aliases.

/// Named keys. The first entry for a code is its canonical name.
const NAMED_KEYS: &[(&str, u32)] = &[
    ("Back", 0x08),
    ("Tab", 0x09),
    ("Clear", 0x0C),
    ("Enter", 0x0D),
    ("Pause", 0x13),
    ("CapsLock", 0x14),
    ("Escape", 0x1B),
    ("Space", 0x20),
    ("PageUp", 0x21),
    ("PageDown", 0x22),
    ("End", 0x23),
    ("Home", 0x24),
    ("Left", 0x25),
    ("Up", 0x26),
    ("Right", 0x27),
    ("Down", 0x28),
    ("Select", 0x29),
    ("Print", 0x2A),
    ("Execute", 0x2B),
    ("PrintScreen", 0x2C),
    ("Insert", 0x2D),
    ("Delete", 0x2E),
    ("Help", 0x2F),
    ("Apps", 0x5D),
    ("Sleep", 0x5F),
    ("Multiply", 0x6A),
    ("Add", 0x6B),
    ("Separator", 0x6C),
    ("Subtract", 0x6D),
    ("Decimal", 0x6E),
    ("Divide", 0x6F),
    ("NumLock", 0x90),
    ("Scroll", 0x91),
    ("BrowserBack", 0xA6),
    ("BrowserForward", 0xA7),
    ("BrowserRefresh", 0xA8),
    ("BrowserStop", 0xA9),
    ("BrowserSearch", 0xAA),
    ("BrowserFavorites", 0xAB),
    ("BrowserHome", 0xAC),
    ("VolumeMute", 0xAD),
    ("VolumeDown", 0xAE),
    ("VolumeUp", 0xAF),
    ("MediaNextTrack", 0xB0),
    ("MediaPreviousTrack", 0xB1),
    ("MediaStop", 0xB2),
    ("MediaPlayPause", 0xB3),
    ("LaunchMail", 0xB4),
    ("SelectMedia", 0xB5),
    ("LaunchApplication1", 0xB6),
    ("LaunchApplication2", 0xB7),
    ("OemSemicolon", 0xBA),
    ("OemPlus", 0xBB),
    ("OemComma", 0xBC),
    ("OemMinus", 0xBD),
    ("OemPeriod", 0xBE),
    ("OemQuestion", 0xBF),
    ("OemTilde", 0xC0),
    ("OemOpenBrackets", 0xDB),
    ("OemPipe", 0xDC),
    ("OemCloseBrackets", 0xDD),
    ("OemQuotes", 0xDE),
    ("Oem8", 0xDF),
    ("OemBackslash", 0xE2),
];

/// Alternate spellings, mapped to their canonical name.
const ALIASES: &[(&str, &str)] = &[
    ("Backspace", "Back"),
    ("Return", "Enter"),
    ("Capital", "CapsLock"),
    ("Esc", "Escape"),
    ("Prior", "PageUp"),
    ("Next", "PageDown"),
    ("Snapshot", "PrintScreen"),
    ("Ins", "Insert"),
    ("Del", "Delete"),
    ("ScrollLock", "Scroll"),
    ("Oem1", "OemSemicolon"),
    ("Oem2", "OemQuestion"),
    ("Oem3", "OemTilde"),
    ("Oem4", "OemOpenBrackets"),
    ("Oem5", "OemPipe"),
    ("Oem6", "OemCloseBrackets"),
    ("Oem7", "OemQuotes"),
    ("Oem102", "OemBackslash"),
];

/// A resolved key: its canonical display name and virtual-key code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyInfo {
    pub name: String,
    pub code: u32,
}

/// Looks up a key by name, ignoring case. Returns None for names that don't map to a key.
pub(crate) fn lookup(name: &str) -> Option<KeyInfo> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    if let Some(info) = lookup_generated(name) {
        return Some(info);
    }

    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name);

    NAMED_KEYS
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(canonical))
        .map(|(key, code)| KeyInfo {
            name: key.to_string(),
            code: *code,
        })
}

/// Handles the regular families: letters, digits, function keys and the numeric keypad.
fn lookup_generated(name: &str) -> Option<KeyInfo> {
    let upper = name.to_ascii_uppercase();
    let bytes = upper.as_bytes();

    // Letters A-Z share their ASCII code.
    if bytes.len() == 1 && bytes[0].is_ascii_uppercase() {
        return Some(KeyInfo {
            name: upper.clone(),
            code: bytes[0] as u32,
        });
    }

    // Top-row digits, either bare or in the D0-D9 capture spelling.
    let digit = match bytes {
        [d] if d.is_ascii_digit() => Some(*d),
        [b'D', d] if d.is_ascii_digit() => Some(*d),
        _ => None,
    };
    if let Some(d) = digit {
        return Some(KeyInfo {
            name: format!("D{}", d as char),
            code: d as u32,
        });
    }

    if let Some(n) = upper.strip_prefix("NUMPAD").and_then(|n| n.parse::<u32>().ok()) {
        if n <= 9 {
            return Some(KeyInfo {
                name: format!("NumPad{}", n),
                code: 0x60 + n,
            });
        }
        return None;
    }

    if let Some(n) = upper.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
        if (1..=24).contains(&n) {
            return Some(KeyInfo {
                name: format!("F{}", n),
                code: 0x70 + n - 1,
            });
        }
    }

    None
}
