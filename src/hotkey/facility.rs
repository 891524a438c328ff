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
use std::error::Error;

use crossbeam_channel::Receiver;
#[cfg(not(windows))]
use tracing::warn;

use super::{mock, Modifiers, RegistrationId, VirtualKey};
use crate::config::HotkeyBackend;

/// The OS global-hotkey primitive. Registration calls are synchronous: when they return,
/// the OS has accepted or refused the binding. Fired hotkeys are delivered separately, as
/// registration ids on the receiver handed out alongside the facility.
pub trait HotkeyFacility: Send {
    /// Binds the modifier/key pair under the given id. Returns false if the OS refused,
    /// typically because another application already holds the chord.
    fn register(&mut self, id: RegistrationId, modifiers: Modifiers, key: VirtualKey) -> bool;

    /// Releases the binding held under the given id. Returns false if the OS reported
    /// a failure.
    fn unregister(&mut self, id: RegistrationId) -> bool;
}

/// Creates the hotkey facility for the given backend along with the receiver that
/// delivers fired registration ids.
pub fn get_facility(
    backend: HotkeyBackend,
) -> Result<(Box<dyn HotkeyFacility>, Receiver<RegistrationId>), Box<dyn Error>> {
    match backend {
        HotkeyBackend::Mock => {
            let (facility, fired_rx) = mock::Facility::new();
            Ok((Box::new(facility), fired_rx))
        }
        HotkeyBackend::Os => os_facility(),
    }
}

#[cfg(windows)]
fn os_facility() -> Result<(Box<dyn HotkeyFacility>, Receiver<RegistrationId>), Box<dyn Error>> {
    let (facility, fired_rx) = super::win32::Facility::spawn()?;
    Ok((Box::new(facility), fired_rx))
}

#[cfg(not(windows))]
fn os_facility() -> Result<(Box<dyn HotkeyFacility>, Receiver<RegistrationId>), Box<dyn Error>> {
    warn!("Global hotkeys are only available on Windows; hotkeys will be tracked but never fire");
    let (facility, fired_rx) = mock::Facility::new();
    Ok((Box::new(facility), fired_rx))
}
