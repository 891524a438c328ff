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
use std::io;
use std::thread;

use crossbeam_channel::Receiver;
use tokio::{
    sync::{mpsc::Sender, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, span, Level};

use super::Event;
use crate::hotkey::RegistrationId;

/// A driver that forwards fired global hotkeys to the controller.
pub struct Driver {
    fired_rx: Receiver<RegistrationId>,
}

impl Driver {
    pub fn new(fired_rx: Receiver<RegistrationId>) -> Driver {
        Driver { fired_rx }
    }
}

/// Forwards ids until either side goes away.
fn forward(fired_rx: &Receiver<RegistrationId>, events_tx: &Sender<Event>) {
    for id in fired_rx.iter() {
        debug!(id, "Hotkey fired");
        if events_tx.blocking_send(Event::Hotkey(id)).is_err() {
            return;
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let fired_rx = self.fired_rx.clone();
        let (done_tx, done_rx) = oneshot::channel();
        let spawned = thread::Builder::new()
            .name("hotkey-events".to_string())
            .spawn(move || {
                let span = span!(Level::INFO, "hotkey driver");
                let _enter = span.enter();

                info!("Hotkey driver started.");
                forward(&fired_rx, &events_tx);
                info!("Hotkey driver stopped.");
                let _ = done_tx.send(());
            });

        tokio::spawn(async move {
            spawned?;
            let _ = done_rx.await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use tokio::sync::mpsc;

    use super::*;
    use crate::controller::Driver as _;

    #[test]
    fn test_forward_stops_when_facility_closes() {
        let (fired_tx, fired_rx) = crossbeam_channel::unbounded();
        let (events_tx, mut events_rx) = mpsc::channel(4);

        fired_tx.send(3).expect("send");
        fired_tx.send(9).expect("send");
        drop(fired_tx);
        forward(&fired_rx, &events_tx);

        assert_eq!(Some(Event::Hotkey(3)), events_rx.blocking_recv());
        assert_eq!(Some(Event::Hotkey(9)), events_rx.blocking_recv());
    }

    #[test]
    fn test_forward_stops_when_controller_closes() {
        let (fired_tx, fired_rx) = crossbeam_channel::unbounded();
        let (events_tx, events_rx) = mpsc::channel(4);
        drop(events_rx);

        fired_tx.send(1).expect("send");
        // Returns even though the facility is still open.
        forward(&fired_rx, &events_tx);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_hotkey_driver() {
        let (fired_tx, fired_rx) = crossbeam_channel::unbounded();
        let (events_tx, mut events_rx) = mpsc::channel(4);
        let driver = Driver::new(fired_rx);
        let handle = driver.monitor_events(events_tx);

        fired_tx.send(42).expect("send");
        assert_eq!(Some(Event::Hotkey(42)), events_rx.recv().await);

        drop(driver);
        drop(fired_tx);
        assert!(matches!(handle.await, Ok(Ok(()))));
    }
}
