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

//! Global hotkeys: chord parsing, registration bookkeeping and the OS facilities
//! that actually bind the keys.

use std::fmt;

use bitflags::bitflags;

pub mod chord;
pub mod facility;
mod keys;
pub mod mock;
pub mod registry;
#[cfg(windows)]
pub mod win32;

pub use chord::{encode, normalize, Chord, EncodeError};
pub use facility::{get_facility, HotkeyFacility};
pub use registry::{HotkeyRegistry, RegistrationError};

/// Identifies one registration with the OS facility. Win32 accepts application hotkey
/// ids in the range 0x0000 through 0xBFFF.
pub type RegistrationId = i32;

bitflags! {
    /// Modifier flags, laid out as the `fsModifiers` argument of Win32 `RegisterHotKey`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const ALT = 0x0001;
        const CTRL = 0x0002;
        const SHIFT = 0x0004;
        const WIN = 0x0008;
    }
}

/// A platform virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualKey(pub u32);

impl fmt::Display for VirtualKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}
