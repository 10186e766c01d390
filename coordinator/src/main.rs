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

//! Coordinator binary: loads configuration, wires up the in-memory store,
//! starts the reaper and expiry background tasks, and serves the HTTP API
//! until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use coordinator::clock::SystemClock;
use coordinator::store::memory::MemoryStore;
use coordinator::{queue, registry, shutdown, Coordinator};
use coordinator_config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = coordinator_config::load(&cli)?;

    if settings.database_url != "memory://" {
        tracing::warn!(
            database_url = %settings.database_url,
            "no persistent store is wired up yet; running on the in-memory store regardless"
        );
    }

    let bind_host = settings.bind_host.clone();
    let bind_port = settings.bind_port;
    let reaper_period = Duration::from_secs(settings.reaper_period_seconds);
    let expiry_tick_period = Duration::from_secs(settings.expiry_tick_period_seconds);
    let heartbeat_timeout = settings.heartbeat_timeout_seconds;

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(SystemClock);
    let coordinator = Arc::new(Coordinator::new(settings, store, clock));

    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    let reaper = registry::spawn_reaper(
        coordinator.registry.clone(),
        coordinator.queue.clone(),
        coordinator.notifier.clone(),
        reaper_period,
        heartbeat_timeout,
        shutdown_rx.clone(),
    );
    let expiry_ticker = queue::spawn_expiry_ticker(coordinator.queue.clone(), expiry_tick_period, shutdown_rx.clone());
    let shutdown_waiter = tokio::spawn(shutdown::wait_and_trigger(shutdown_tx, coordinator.notifier.clone()));

    let app = coordinator::api::router(coordinator.clone())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{bind_host}:{bind_port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "coordinator listening");

    let mut shutdown_rx_for_serve = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx_for_serve.changed().await;
        })
        .await?;

    reaper.abort();
    expiry_ticker.abort();
    shutdown_waiter.abort();
    Ok(())
}
