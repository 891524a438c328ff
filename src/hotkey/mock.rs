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
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use super::{Modifiers, RegistrationId, VirtualKey};

#[derive(Default)]
struct State {
    /// Currently held bindings.
    registered: HashMap<RegistrationId, (Modifiers, VirtualKey)>,
    /// Chords held by "other applications". Registering one of these fails.
    reserved: HashSet<(Modifiers, VirtualKey)>,
    /// Number of successful register calls.
    register_calls: usize,
    /// Number of unregister calls, successful or not.
    unregister_calls: usize,
}

/// A mock hotkey facility. Behaves like the OS: a chord can only be held once, ids must
/// be unique, and unregistering an unknown id fails. Clones share state, so a test can
/// keep one clone to inspect and fire while the registry owns the other.
#[derive(Clone)]
pub struct Facility {
    state: Arc<Mutex<State>>,
    fired_tx: Sender<RegistrationId>,
}

impl Facility {
    /// Creates a new mock facility and the receiver its fired ids are delivered on.
    pub fn new() -> (Facility, Receiver<RegistrationId>) {
        let (fired_tx, fired_rx) = crossbeam_channel::unbounded();
        (
            Facility {
                state: Arc::new(Mutex::new(State::default())),
                fired_tx,
            },
            fired_rx,
        )
    }

    /// Marks a chord as taken by another application.
    pub fn reserve(&self, modifiers: Modifiers, key: VirtualKey) {
        self.state.lock().reserved.insert((modifiers, key));
    }

    /// Simulates the OS delivering a hotkey notification for the given id. Like a stale
    /// message in a real queue, the id doesn't have to be registered.
    pub fn fire(&self, id: RegistrationId) {
        let _ = self.fired_tx.send(id);
    }

    /// Returns the currently held bindings, sorted by id.
    pub fn registered(&self) -> Vec<(RegistrationId, Modifiers, VirtualKey)> {
        let state = self.state.lock();
        let mut registered: Vec<(RegistrationId, Modifiers, VirtualKey)> = state
            .registered
            .iter()
            .map(|(id, (modifiers, key))| (*id, *modifiers, *key))
            .collect();
        registered.sort_by_key(|(id, _, _)| *id);
        registered
    }

    /// Returns true if the given id is currently bound.
    pub fn is_registered(&self, id: RegistrationId) -> bool {
        self.state.lock().registered.contains_key(&id)
    }

    /// Returns the number of successful register calls so far.
    pub fn register_calls(&self) -> usize {
        self.state.lock().register_calls
    }

    /// Returns the number of unregister calls so far.
    pub fn unregister_calls(&self) -> usize {
        self.state.lock().unregister_calls
    }
}

impl super::HotkeyFacility for Facility {
    fn register(&mut self, id: RegistrationId, modifiers: Modifiers, key: VirtualKey) -> bool {
        let mut state = self.state.lock();
        let taken = state.reserved.contains(&(modifiers, key))
            || state.registered.contains_key(&id)
            || state
                .registered
                .values()
                .any(|binding| *binding == (modifiers, key));
        if taken {
            debug!(id, modifiers = modifiers.bits(), %key, "Mock facility refused hotkey");
            return false;
        }

        state.registered.insert(id, (modifiers, key));
        state.register_calls += 1;
        true
    }

    fn unregister(&mut self, id: RegistrationId) -> bool {
        let mut state = self.state.lock();
        state.unregister_calls += 1;
        state.registered.remove(&id).is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hotkey::HotkeyFacility;

    #[test]
    fn test_mock_facility_rules() {
        let (mut facility, fired_rx) = Facility::new();
        let observer = facility.clone();

        assert!(facility.register(1, Modifiers::CTRL, VirtualKey(0x41)));
        // Same chord, different id.
        assert!(!facility.register(2, Modifiers::CTRL, VirtualKey(0x41)));
        // Same id, different chord.
        assert!(!facility.register(1, Modifiers::ALT, VirtualKey(0x41)));

        observer.reserve(Modifiers::WIN, VirtualKey(0x4C));
        assert!(!facility.register(3, Modifiers::WIN, VirtualKey(0x4C)));

        assert_eq!(
            vec![(1, Modifiers::CTRL, VirtualKey(0x41))],
            observer.registered()
        );
        assert!(facility.unregister(1));
        assert!(!facility.unregister(1));
        assert!(!observer.is_registered(1));
        assert_eq!(1, observer.register_calls());
        assert_eq!(2, observer.unregister_calls());

        observer.fire(7);
        assert_eq!(Ok(7), fired_rx.try_recv());
    }
}
