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

//! Graceful shutdown: on SIGINT/SIGTERM, stop accepting new connections,
//! wake every parked long-poll waiter with an empty result (not an error),
//! and cancel the reaper and expiry background tasks before exit.

use tokio::sync::watch;

use crate::waiter::Notifier;

/// Returns a future that resolves on SIGINT or (unix-only) SIGTERM, paired
/// with a `watch::Sender` the caller flips once shutdown begins so every
/// background task listening on the matching `Receiver` can stop cleanly.
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Waits for a shutdown signal, then flips `tx` and wakes every long-poll
/// waiter on `notifier` so in-flight polls return an empty result instead
/// of hanging until their timeout.
pub async fn wait_and_trigger(tx: watch::Sender<bool>, notifier: std::sync::Arc<Notifier>) {
    signal().await;
    tracing::info!("shutdown signal received, draining waiters");
    let _ = tx.send(true);
    notifier.notify();
}

#[cfg(unix)]
async fn signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn signal() {
    let _ = tokio::signal::ctrl_c().await;
}
