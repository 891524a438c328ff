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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{debug, info, warn};

/// Default priority for the mixing thread when SOUNDBOARD_THREAD_PRIORITY is unset.
const DEFAULT_MIXING_THREAD_PRIORITY: u8 = 70;

/// Reads SOUNDBOARD_THREAD_PRIORITY (0-99), falling back to the default.
pub fn mixing_thread_priority() -> Option<ThreadPriorityValue> {
    std::env::var("SOUNDBOARD_THREAD_PRIORITY")
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .and_then(|n| ThreadPriorityValue::try_from(n).ok())
        .or_else(|| ThreadPriorityValue::try_from(DEFAULT_MIXING_THREAD_PRIORITY).ok())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Returns whether we should attempt RT (SCHED_FIFO) scheduling for the mixing thread.
/// Default: enabled. Opt out with SOUNDBOARD_DISABLE_RT_AUDIO=1.
pub fn rt_audio_enabled() -> bool {
    !env_flag("SOUNDBOARD_DISABLE_RT_AUDIO")
}

/// Raises the priority of the calling thread. Failures are logged and otherwise ignored.
pub fn configure_mixing_thread(priority: Option<ThreadPriorityValue>, rt_audio: bool) {
    let Some(priority) = priority else {
        return;
    };
    let tp = ThreadPriority::Crossplatform(priority);
    if let Err(e) = set_current_thread_priority(tp) {
        debug!(err = ?e, "Unable to raise mixing thread priority");
    }

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        match set_thread_priority_and_policy(
            thread_native_id(),
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for mixing thread"),
            Err(e) => warn!(error = %e, "Failed to set RT SCHED_FIFO for mixing thread"),
        }
    }

    #[cfg(not(unix))]
    let _ = rt_audio;
}

#[cfg(test)]
mod test {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_mixing_thread_priority_from_env() {
        std::env::remove_var("SOUNDBOARD_THREAD_PRIORITY");
        assert_eq!(
            ThreadPriorityValue::try_from(DEFAULT_MIXING_THREAD_PRIORITY).ok(),
            mixing_thread_priority()
        );

        std::env::set_var("SOUNDBOARD_THREAD_PRIORITY", "42");
        assert_eq!(ThreadPriorityValue::try_from(42u8).ok(), mixing_thread_priority());

        // Out of range and garbage values fall back to the default.
        std::env::set_var("SOUNDBOARD_THREAD_PRIORITY", "250");
        assert_eq!(
            ThreadPriorityValue::try_from(DEFAULT_MIXING_THREAD_PRIORITY).ok(),
            mixing_thread_priority()
        );
        std::env::remove_var("SOUNDBOARD_THREAD_PRIORITY");
    }

    #[test]
    #[serial]
    fn test_rt_audio_opt_out() {
        std::env::remove_var("SOUNDBOARD_DISABLE_RT_AUDIO");
        assert!(rt_audio_enabled());
        for value in ["1", "true", "YES", "on"] {
            std::env::set_var("SOUNDBOARD_DISABLE_RT_AUDIO", value);
            assert!(!rt_audio_enabled(), "value {}", value);
        }
        std::env::set_var("SOUNDBOARD_DISABLE_RT_AUDIO", "0");
        assert!(rt_audio_enabled());
        std::env::remove_var("SOUNDBOARD_DISABLE_RT_AUDIO");
    }
}
