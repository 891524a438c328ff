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

//! Bookkeeping between OS hotkey registrations and sound triggers.
//!
//! Three indices are kept in lockstep: registration id to record, canonical chord to
//! registration id and trigger to registration id. A chord is held by at most one
//! trigger and a trigger holds at most one chord.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::{Chord, EncodeError, HotkeyFacility, RegistrationId};
use crate::board::{SoundTrigger, TriggerId};

/// Lowest registration id handed to the facility.
const MIN_ID: RegistrationId = 0x0001;

/// Highest registration id handed to the facility. Win32 reserves everything above
/// this for shared DLLs.
const MAX_ID: RegistrationId = 0xBFFF;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("hotkey '{chord}' could not be registered, it may already be in use by another application")]
    OsRejected { chord: String },

    #[error("no free hotkey registration ids")]
    Exhausted,
}

#[derive(Debug, Clone)]
struct Registration {
    trigger: TriggerId,
    chord: String,
}

/// Maps OS hotkey registrations to the triggers they fire.
pub struct HotkeyRegistry {
    facility: Box<dyn HotkeyFacility>,
    registrations: HashMap<RegistrationId, Registration>,
    by_chord: HashMap<String, RegistrationId>,
    by_trigger: HashMap<TriggerId, RegistrationId>,
    next_id: RegistrationId,
}

impl HotkeyRegistry {
    /// Creates an empty registry on top of the given facility.
    pub fn new(facility: Box<dyn HotkeyFacility>) -> HotkeyRegistry {
        HotkeyRegistry {
            facility,
            registrations: HashMap::new(),
            by_chord: HashMap::new(),
            by_trigger: HashMap::new(),
            next_id: MIN_ID,
        }
    }

    /// Registers the trigger's chord with the OS.
    ///
    /// Any registration the trigger already holds is released first. If a different
    /// trigger holds the same chord, that binding is released too and the chord now
    /// fires this trigger instead. If the OS refuses the chord nothing is recorded and
    /// the trigger is left without a registration.
    pub fn register(&mut self, trigger: &SoundTrigger) -> Result<RegistrationId, RegistrationError> {
        let chord = Chord::parse(trigger.hotkey().unwrap_or_default());
        let (modifiers, key) = chord.encode()?;
        let chord = chord.to_string();

        self.unregister(trigger.id());
        if let Some(&held) = self.by_chord.get(&chord) {
            if let Some(previous) = self.release(held) {
                info!(
                    chord,
                    from = %previous.trigger,
                    to = %trigger.id(),
                    "Hotkey moved to a different trigger"
                );
            }
        }

        let id = self.allocate().ok_or(RegistrationError::Exhausted)?;
        if !self.facility.register(id, modifiers, key) {
            warn!(chord, trigger = %trigger.id(), "OS refused hotkey registration");
            return Err(RegistrationError::OsRejected { chord });
        }

        info!(
            id,
            chord,
            modifiers = modifiers.bits(),
            key = %key,
            trigger = %trigger.id(),
            "Registered hotkey"
        );
        self.by_chord.insert(chord.clone(), id);
        self.by_trigger.insert(trigger.id(), id);
        self.registrations.insert(
            id,
            Registration {
                trigger: trigger.id(),
                chord,
            },
        );
        Ok(id)
    }

    /// Releases the registration held by the given trigger. Does nothing if the trigger
    /// holds none.
    pub fn unregister(&mut self, trigger: TriggerId) {
        if let Some(&id) = self.by_trigger.get(&trigger) {
            self.release(id);
        }
    }

    /// Releases every registration. Safe to call when nothing is registered.
    pub fn unregister_all(&mut self) {
        let ids: Vec<RegistrationId> = self.registrations.keys().copied().collect();
        for id in ids {
            self.release(id);
        }
    }

    /// Returns the trigger bound to a fired registration id. Ids that aren't held, such
    /// as stale notifications for a chord that has since been released, return None.
    pub fn dispatch(&self, id: RegistrationId) -> Option<TriggerId> {
        match self.registrations.get(&id) {
            Some(registration) => Some(registration.trigger),
            None => {
                debug!(id, "Ignoring unknown hotkey id");
                None
            }
        }
    }

    /// The registration id currently held by the trigger.
    pub fn registration(&self, trigger: TriggerId) -> Option<RegistrationId> {
        self.by_trigger.get(&trigger).copied()
    }

    /// The trigger currently holding the given canonical chord.
    pub fn holder(&self, chord: &str) -> Option<TriggerId> {
        self.by_chord
            .get(chord)
            .and_then(|id| self.registrations.get(id))
            .map(|registration| registration.trigger)
    }

    /// Number of held registrations.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Removes a registration from every index and releases it with the OS.
    fn release(&mut self, id: RegistrationId) -> Option<Registration> {
        let registration = self.registrations.remove(&id)?;
        self.by_chord.remove(&registration.chord);
        self.by_trigger.remove(&registration.trigger);

        if self.facility.unregister(id) {
            debug!(id, chord = registration.chord, "Unregistered hotkey");
        } else {
            warn!(id, chord = registration.chord, "OS failed to unregister hotkey");
        }
        Some(registration)
    }

    /// Picks the next free id, wrapping at the top of the range.
    fn allocate(&mut self) -> Option<RegistrationId> {
        for _ in MIN_ID..=MAX_ID {
            let id = self.next_id;
            self.next_id = if id >= MAX_ID { MIN_ID } else { id + 1 };
            if !self.registrations.contains_key(&id) {
                return Some(id);
            }
        }
        None
    }
}

impl Drop for HotkeyRegistry {
    fn drop(&mut self) {
        self.unregister_all();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hotkey::{mock, Modifiers, VirtualKey};

    fn registry() -> (HotkeyRegistry, mock::Facility) {
        let (facility, _fired_rx) = mock::Facility::new();
        (HotkeyRegistry::new(Box::new(facility.clone())), facility)
    }

    #[test]
    fn test_register_and_dispatch() -> Result<(), RegistrationError> {
        let (mut registry, facility) = registry();
        let trigger = SoundTrigger::new("a.wav", Some("alt + ctrl + f1"));

        let id = registry.register(&trigger)?;
        assert_eq!(Some(trigger.id()), registry.dispatch(id));
        assert_eq!(Some(id), registry.registration(trigger.id()));
        assert_eq!(Some(trigger.id()), registry.holder("Ctrl + Alt + F1"));
        assert_eq!(
            vec![(id, Modifiers::CTRL | Modifiers::ALT, VirtualKey(0x70))],
            facility.registered()
        );
        Ok(())
    }

    #[test]
    fn test_same_chord_moves_to_new_trigger() -> Result<(), RegistrationError> {
        let (mut registry, facility) = registry();
        let first = SoundTrigger::new("a.wav", Some("Ctrl + A"));
        let second = SoundTrigger::new("b.wav", Some("a + control"));

        let first_id = registry.register(&first)?;
        let second_id = registry.register(&second)?;

        assert_eq!(1, registry.len());
        assert_eq!(1, facility.registered().len());
        assert_eq!(Some(second.id()), registry.dispatch(second_id));
        assert_eq!(None, registry.dispatch(first_id));
        assert_eq!(None, registry.registration(first.id()));
        assert_eq!(Some(second.id()), registry.holder("Ctrl + A"));
        Ok(())
    }

    #[test]
    fn test_reregister_releases_old_chord() -> Result<(), RegistrationError> {
        let (mut registry, facility) = registry();
        let mut trigger = SoundTrigger::new("a.wav", Some("Ctrl + A"));
        let old_id = registry.register(&trigger)?;

        trigger.set_hotkey(Some("Ctrl + B"));
        let new_id = registry.register(&trigger)?;
        assert_ne!(old_id, new_id);
        assert_eq!(
            vec![(new_id, Modifiers::CTRL, VirtualKey(0x42))],
            facility.registered()
        );
        assert_eq!(None, registry.holder("Ctrl + A"));

        // The old chord is free for someone else.
        let other = SoundTrigger::new("b.wav", Some("Ctrl + A"));
        registry.register(&other)?;
        assert_eq!(2, registry.len());
        assert_eq!(Some(trigger.id()), registry.dispatch(new_id));
        Ok(())
    }

    #[test]
    fn test_unregister_frees_chord() -> Result<(), RegistrationError> {
        let (mut registry, facility) = registry();
        let trigger = SoundTrigger::new("a.wav", Some("Shift + F5"));
        let id = registry.register(&trigger)?;

        registry.unregister(trigger.id());
        assert!(registry.is_empty());
        assert!(!facility.is_registered(id));
        assert_eq!(None, registry.dispatch(id));

        // Unregistering again is a no-op.
        registry.unregister(trigger.id());
        assert_eq!(1, facility.unregister_calls());
        Ok(())
    }

    #[test]
    fn test_unknown_id_dispatches_nothing() {
        let (registry, _facility) = registry();
        assert_eq!(None, registry.dispatch(42));
        assert_eq!(None, registry.dispatch(-1));
    }

    #[test]
    fn test_os_rejection_records_nothing() {
        let (mut registry, facility) = registry();
        facility.reserve(Modifiers::WIN, VirtualKey(0x4C));
        let trigger = SoundTrigger::new("a.wav", Some("Win + L"));

        assert_eq!(
            Err(RegistrationError::OsRejected {
                chord: "Win + L".to_string()
            }),
            registry.register(&trigger)
        );
        assert!(registry.is_empty());
        assert_eq!(None, registry.registration(trigger.id()));
        assert_eq!(None, registry.holder("Win + L"));
    }

    #[test]
    fn test_rejected_move_leaves_previous_trigger_unbound() -> Result<(), RegistrationError> {
        let (mut registry, facility) = registry();
        let first = SoundTrigger::new("a.wav", Some("Ctrl + Q"));
        registry.register(&first)?;

        facility.reserve(Modifiers::CTRL, VirtualKey(0x51));
        let second = SoundTrigger::new("b.wav", Some("Ctrl + Q"));
        assert!(matches!(
            registry.register(&second),
            Err(RegistrationError::OsRejected { .. })
        ));
        assert!(registry.is_empty());
        assert!(facility.registered().is_empty());
        Ok(())
    }

    #[test]
    fn test_encode_failures() {
        let (mut registry, facility) = registry();

        let unknown = SoundTrigger::new("a.wav", Some("Ctrl + Banana"));
        assert!(matches!(
            registry.register(&unknown),
            Err(RegistrationError::Encode(EncodeError::UnknownKey { .. }))
        ));

        let modifiers_only = SoundTrigger::new("a.wav", Some("Ctrl + Shift"));
        assert!(matches!(
            registry.register(&modifiers_only),
            Err(RegistrationError::Encode(EncodeError::MissingKey(_)))
        ));

        let unset = SoundTrigger::new("a.wav", None);
        assert_eq!(
            Err(RegistrationError::Encode(EncodeError::MissingKey(
                String::new()
            ))),
            registry.register(&unset)
        );

        assert!(registry.is_empty());
        assert_eq!(0, facility.register_calls());
    }

    #[test]
    fn test_unregister_all() -> Result<(), RegistrationError> {
        let (mut registry, facility) = registry();

        // Nothing registered yet.
        registry.unregister_all();
        assert_eq!(0, facility.unregister_calls());

        for (n, chord) in ["Ctrl + 1", "Ctrl + 2", "Ctrl + 3"].iter().enumerate() {
            registry.register(&SoundTrigger::new(format!("{}.wav", n), Some(*chord)))?;
        }
        assert_eq!(3, facility.registered().len());

        registry.unregister_all();
        assert!(registry.is_empty());
        assert!(facility.registered().is_empty());
        assert_eq!(None, registry.holder("Ctrl + D1"));
        Ok(())
    }

    #[test]
    fn test_drop_releases_everything() -> Result<(), RegistrationError> {
        let (mut registry, facility) = registry();
        registry.register(&SoundTrigger::new("a.wav", Some("F9")))?;
        registry.register(&SoundTrigger::new("b.wav", Some("F10")))?;

        drop(registry);
        assert!(facility.registered().is_empty());
        Ok(())
    }

    #[test]
    fn test_ids_wrap_and_skip_held() -> Result<(), RegistrationError> {
        let (mut registry, _facility) = registry();
        let first = SoundTrigger::new("a.wav", Some("F1"));
        assert_eq!(MIN_ID, registry.register(&first)?);

        registry.next_id = MAX_ID;
        assert_eq!(MAX_ID, registry.register(&SoundTrigger::new("b.wav", Some("F2")))?);
        // MIN_ID is still held by the first trigger.
        assert_eq!(
            MIN_ID + 1,
            registry.register(&SoundTrigger::new("c.wav", Some("F3")))?
        );
        Ok(())
    }
}
