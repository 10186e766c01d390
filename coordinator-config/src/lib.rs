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

//! Typed configuration surface for the compute coordinator.
//!
//! Loading is layered: compiled-in defaults, then an optional config file,
//! then environment variables prefixed `COORDINATOR_`, then CLI flags for
//! the handful of options worth overriding at launch. The result is
//! validated once into a [`Settings`] that the rest of the service treats
//! as immutable for the process lifetime — signing keys never hot-reload.

mod cli;
mod error;
mod keys;
mod settings;

pub use cli::Cli;
pub use error::ConfigError;
pub use settings::{RawSettings, Settings};

// Reexport so downstream crates don't need their own `clap`/`config` pin.
pub use clap;
pub use config;

/// Loads and validates configuration from `cli`, a config file and the
/// process environment, in that precedence order (lowest to highest:
/// defaults < file < env < CLI).
pub fn load(cli: &Cli) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder().add_source(
        config::Config::try_from(&RawSettings::default())
            .expect("BUG: default settings must serialize"),
    );

    if let Some(path) = &cli.config {
        builder = builder.add_source(config::File::with_name(path));
    }

    builder = builder.add_source(config::Environment::with_prefix("COORDINATOR"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    if let Some(host) = &cli.bind_host {
        raw.bind_host = host.clone();
    }
    if let Some(port) = cli.bind_port {
        raw.bind_port = port;
    }

    Settings::from_raw(raw)
}
