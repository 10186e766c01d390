// Copyright (C) 2026  Compute Coordinator Contributors
//
// This file is part of the Compute Coordinator.
//
// The Compute Coordinator is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Long-poll waiter built on a single shared broadcast channel rather than
//! per-job channels: one [`Notifier`] is published whenever a job becomes
//! newly matchable (submission, miner-loss re-queue), and every parked
//! `poll` call races a fresh subscription against its own deadline.

use std::time::Duration;

use tokio::sync::broadcast;

/// Wakes every subscriber whenever a job re-enters QUEUED or a new job is
/// submitted. Subscribers that lag behind a burst of notifications just
/// get folded into the next `recv()` — a missed exact count never matters
/// because every wake-up re-runs the matcher from scratch.
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<()>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(32);
        Self { sender }
    }

    pub fn notify(&self) {
        // No subscribers is not an error: nobody is parked right now.
        let _ = self.sender.send(());
    }

    pub fn subscribe(&self) -> Waiter {
        Waiter {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Waiter {
    receiver: broadcast::Receiver<()>,
}

impl Waiter {
    /// Suspends until the next notification or the `timeout` elapses,
    /// whichever comes first. Returns `true` if a notification woke it,
    /// `false` on timeout.
    pub async fn wait(mut self, timeout: Duration) -> bool {
        tokio::select! {
            result = self.receiver.recv() => {
                matches!(result, Ok(()) | Err(broadcast::error::RecvError::Lagged(_)))
            }
            _ = tokio::time::sleep(timeout) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wakes_on_notify() {
        let notifier = Notifier::new();
        let waiter = notifier.subscribe();
        let handle = tokio::spawn(async move { waiter.wait(Duration::from_secs(5)).await });

        tokio::task::yield_now().await;
        notifier.notify();

        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn times_out_with_no_notification() {
        let notifier = Notifier::new();
        let waiter = notifier.subscribe();
        let woke = waiter.wait(Duration::from_millis(10)).await;
        assert!(!woke);
    }
}
