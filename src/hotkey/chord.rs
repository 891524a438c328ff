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

//! Chord strings such as `Ctrl + Alt + F1`.
//!
//! Users type chords in any order and spelling; everything downstream works on the
//! canonical form: modifiers in the fixed order Ctrl, Alt, Shift, Win followed by the
//! main key, joined with `" + "`.

use std::fmt;

use super::keys;
use super::{Modifiers, VirtualKey};

/// The separator used between tokens in a canonical chord.
const SEPARATOR: &str = " + ";

/// Canonical modifier order and display names.
const MODIFIER_NAMES: [(Modifiers, &str); 4] = [
    (Modifiers::CTRL, "Ctrl"),
    (Modifiers::ALT, "Alt"),
    (Modifiers::SHIFT, "Shift"),
    (Modifiers::WIN, "Win"),
];

/// Reasons a chord can't be turned into a modifier/key pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("chord '{0}' has no main key")]
    MissingKey(String),

    #[error("unrecognized key '{key}' in chord '{chord}'")]
    UnknownKey { chord: String, key: String },
}

/// A parsed chord: a set of modifiers plus at most one main key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Chord {
    modifiers: Modifiers,
    key: Option<String>,
}

impl Chord {
    /// Parses a chord typed in any order. Tokens are split on `+` and trimmed; empty
    /// tokens are dropped. A token naming a modifier anywhere inside it (`LeftCtrl`,
    /// `RightAlt`, `LWin`) counts as that modifier. Of the remaining tokens the last one
    /// is the main key, matching what a capture records when a second key is pressed
    /// while the modifiers are still held.
    pub fn parse(raw: &str) -> Chord {
        let mut modifiers = Modifiers::empty();
        let mut key: Option<&str> = None;

        for token in raw.split('+').map(str::trim).filter(|t| !t.is_empty()) {
            let token_modifiers = classify(token);
            if token_modifiers.is_empty() {
                key = Some(token);
            } else {
                modifiers |= token_modifiers;
            }
        }

        // Known keys get their canonical spelling so that `ctrl+a` and `Ctrl + A` are
        // the same chord. Unknown keys are kept as typed and fail at encode time.
        let key = key.map(|key| match keys::lookup(key) {
            Some(info) => info.name,
            None => key.to_string(),
        });

        Chord { modifiers, key }
    }

    /// The modifiers held by this chord.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// The main key, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// True if the chord has neither modifiers nor a main key.
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty() && self.key.is_none()
    }

    /// Resolves the chord to the modifier mask and virtual-key code the OS expects.
    pub fn encode(&self) -> Result<(Modifiers, VirtualKey), EncodeError> {
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| EncodeError::MissingKey(self.to_string()))?;

        match keys::lookup(key) {
            Some(info) => Ok((self.modifiers, VirtualKey(info.code))),
            None => Err(EncodeError::UnknownKey {
                chord: self.to_string(),
                key: key.to_string(),
            }),
        }
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = MODIFIER_NAMES
            .iter()
            .filter(|(modifier, _)| self.modifiers.contains(*modifier))
            .map(|(_, name)| *name)
            .chain(self.key.as_deref())
            .collect();
        write!(f, "{}", parts.join(SEPARATOR))
    }
}

/// Returns the modifiers named by a token, or an empty set for a main-key token.
fn classify(token: &str) -> Modifiers {
    let upper = token.to_ascii_uppercase();
    let mut modifiers = Modifiers::empty();
    if upper.contains("CTRL") || upper == "CONTROL" {
        modifiers |= Modifiers::CTRL;
    }
    if upper.contains("ALT") {
        modifiers |= Modifiers::ALT;
    }
    if upper.contains("SHIFT") {
        modifiers |= Modifiers::SHIFT;
    }
    if upper.contains("WIN") {
        modifiers |= Modifiers::WIN;
    }
    modifiers
}

/// Normalizes a user-typed chord into canonical form. Blank input yields an empty string.
pub fn normalize(raw: &str) -> String {
    Chord::parse(raw).to_string()
}

/// Encodes a chord string into the OS modifier mask and virtual-key code.
pub fn encode(canonical: &str) -> Result<(Modifiers, VirtualKey), EncodeError> {
    Chord::parse(canonical).encode()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_canonical_order() {
        assert_eq!("Ctrl + Alt + F1", normalize("Alt + Ctrl + F1"));
        assert_eq!("Ctrl + Alt + Shift + Win + A", normalize("win+shift+alt+ctrl+a"));
        assert_eq!("Ctrl + Shift + Space", normalize("  Shift +Control+ space "));
    }

    #[test]
    fn test_modifier_order_does_not_matter() {
        let orderings = [
            "Ctrl + Alt + Shift + K",
            "Shift + Alt + Ctrl + K",
            "Alt + K + Shift + Ctrl",
            "K + Ctrl + Shift + Alt",
        ];
        let expected = normalize(orderings[0]);
        for raw in orderings {
            assert_eq!(expected, normalize(raw), "ordering {}", raw);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "a + ctrl",
            "LeftShift + RightAlt + F12",
            "Ctrl + Alt + Banana",
            "++ Win ++",
            "",
            "D5",
            "return",
        ] {
            let once = normalize(raw);
            assert_eq!(once, normalize(&once), "input {:?}", raw);
        }
    }

    #[test]
    fn test_last_main_key_wins() {
        assert_eq!("Ctrl + B", normalize("A + Ctrl + B"));
        assert_eq!("Alt + D3", normalize("1 + 2 + Alt + 3"));
    }

    #[test]
    fn test_side_specific_modifiers() {
        assert_eq!("Ctrl + Alt + F2", normalize("LeftCtrl + RightAlt + F2"));
        assert_eq!("Win + E", normalize("LWin + E"));
        assert_eq!("Shift", normalize("RightShift"));
    }

    #[test]
    fn test_empty_tokens_dropped() {
        assert_eq!("Ctrl + A", normalize("Ctrl ++ + A +"));
        assert_eq!("", normalize("   "));
        assert_eq!("", normalize("+ + +"));
        assert!(Chord::parse(" + ").is_empty());
    }

    #[test]
    fn test_unknown_key_kept_as_typed() {
        assert_eq!("Ctrl + banana", normalize("banana+ctrl"));
        assert_eq!("Banana", normalize("Banana"));
    }

    #[test]
    fn test_encode() {
        assert_eq!(
            Ok((Modifiers::CTRL | Modifiers::ALT, VirtualKey(0x70))),
            encode("Ctrl + Alt + F1")
        );
        assert_eq!(
            Ok((Modifiers::SHIFT | Modifiers::WIN, VirtualKey(0x41))),
            encode("Shift + Win + A")
        );
        assert_eq!(Ok((Modifiers::empty(), VirtualKey(0x7B))), encode("F12"));
    }

    #[test]
    fn test_modifier_bits() {
        let (modifiers, _) = encode("Ctrl + Alt + Shift + Win + Z").unwrap();
        assert_eq!(0x000F, modifiers.bits());
        assert_eq!(0x0002, encode("Ctrl + Z").unwrap().0.bits());
        assert_eq!(0x0001, encode("Alt + Z").unwrap().0.bits());
    }

    #[test]
    fn test_encode_unknown_key() {
        assert_eq!(
            Err(EncodeError::UnknownKey {
                chord: "Ctrl + Banana".to_string(),
                key: "Banana".to_string(),
            }),
            encode("Ctrl + Banana")
        );
    }

    #[test]
    fn test_encode_missing_key() {
        assert_eq!(
            Err(EncodeError::MissingKey("Ctrl + Shift".to_string())),
            encode("Shift + Ctrl")
        );
        assert_eq!(Err(EncodeError::MissingKey(String::new())), encode(""));
    }

    #[test]
    fn test_aliases_collapse() {
        assert_eq!(normalize("Ctrl + Return"), normalize("ctrl + enter"));
        assert_eq!(encode("Ctrl + Return"), encode("Ctrl + Enter"));
    }
}
