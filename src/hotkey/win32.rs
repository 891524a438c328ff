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

//! Win32 global hotkeys.
//!
//! Hotkeys registered without a window belong to the registering thread and are
//! delivered to that thread's message queue as `WM_HOTKEY`. A dedicated thread owns the
//! queue: it performs every register/unregister call on behalf of the facility and
//! forwards fired ids over a channel.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, span, warn, Level};
use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetMessageW, PeekMessageW, PostThreadMessageW, MSG, PM_NOREMOVE, WM_APP, WM_HOTKEY, WM_QUIT,
    WM_USER,
};

use super::{Modifiers, RegistrationId, VirtualKey};

/// Work for the message loop thread.
enum Request {
    Register {
        id: RegistrationId,
        modifiers: Modifiers,
        key: VirtualKey,
    },
    Unregister {
        id: RegistrationId,
    },
}

/// A request plus the channel its result is sent back on.
type Envelope = (Request, Sender<bool>);

/// The Win32 hotkey facility.
pub struct Facility {
    thread_id: u32,
    requests_tx: Sender<Envelope>,
    handle: Option<JoinHandle<()>>,
}

impl Facility {
    /// Starts the message loop thread. Returns once the thread's queue exists and can
    /// accept requests.
    pub fn spawn() -> Result<(Facility, Receiver<RegistrationId>), io::Error> {
        let (requests_tx, requests_rx) = crossbeam_channel::unbounded::<Envelope>();
        let (fired_tx, fired_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name("hotkeys".to_string())
            .spawn(move || message_loop(requests_rx, fired_tx, ready_tx))?;
        let thread_id = ready_rx
            .recv()
            .map_err(|_| io::Error::other("hotkey thread exited during startup"))?;

        info!(thread_id, "Win32 hotkey thread started");
        Ok((
            Facility {
                thread_id,
                requests_tx,
                handle: Some(handle),
            },
            fired_rx,
        ))
    }

    /// Hands a request to the message loop and waits for the answer.
    fn call(&self, request: Request) -> bool {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        if self.requests_tx.send((request, reply_tx)).is_err() {
            warn!("Hotkey thread is gone");
            return false;
        }

        // Wake the loop; it is blocked in GetMessageW.
        if let Err(e) = unsafe { PostThreadMessageW(self.thread_id, WM_APP, WPARAM(0), LPARAM(0)) } {
            warn!(err = %e, "Unable to wake hotkey thread");
            return false;
        }

        reply_rx.recv().unwrap_or(false)
    }
}

impl super::HotkeyFacility for Facility {
    fn register(&mut self, id: RegistrationId, modifiers: Modifiers, key: VirtualKey) -> bool {
        self.call(Request::Register { id, modifiers, key })
    }

    fn unregister(&mut self, id: RegistrationId) -> bool {
        self.call(Request::Unregister { id })
    }
}

impl Drop for Facility {
    fn drop(&mut self) {
        if let Err(e) = unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            error!(err = %e, "Unable to stop hotkey thread");
            return;
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Hotkey thread panicked");
            }
        }
    }
}

fn message_loop(
    requests_rx: Receiver<Envelope>,
    fired_tx: Sender<RegistrationId>,
    ready_tx: Sender<u32>,
) {
    let span = span!(Level::INFO, "win32 hotkeys");
    let _enter = span.enter();

    let mut msg = MSG::default();
    // Peeking creates the thread's message queue, so posts made after the ready signal
    // are never lost.
    let thread_id = unsafe {
        let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
        GetCurrentThreadId()
    };
    if ready_tx.send(thread_id).is_err() {
        return;
    }

    loop {
        let result = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        match result.0 {
            0 => break,
            -1 => {
                error!("GetMessageW failed, stopping hotkey thread");
                break;
            }
            _ => {}
        }

        match msg.message {
            WM_HOTKEY => {
                let id = msg.wParam.0 as RegistrationId;
                debug!(id, "Hotkey fired");
                if fired_tx.send(id).is_err() {
                    debug!(id, "Nobody is listening for hotkeys");
                }
            }
            WM_APP => {
                while let Ok((request, reply_tx)) = requests_rx.try_recv() {
                    let _ = reply_tx.send(handle_request(request));
                }
            }
            _ => {}
        }
    }

    info!("Win32 hotkey thread stopped");
}

fn handle_request(request: Request) -> bool {
    match request {
        Request::Register { id, modifiers, key } => {
            let result = unsafe {
                RegisterHotKey(None, id, HOT_KEY_MODIFIERS(modifiers.bits()), key.0)
            };
            if let Err(e) = &result {
                debug!(id, err = %e, "RegisterHotKey failed");
            }
            result.is_ok()
        }
        Request::Unregister { id } => {
            let result = unsafe { UnregisterHotKey(None, id) };
            if let Err(e) = &result {
                debug!(id, err = %e, "UnregisterHotKey failed");
            }
            result.is_ok()
        }
    }
}
