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

use clap::Parser;

/// Command-line entry point for the coordinator binary. Values here
/// override whatever the config file / environment supplied, matching the
/// override precedence of a layered `config::Config`.
#[derive(Parser, Debug, Clone)]
#[command(name = "coordinator", about = "GPU/AI compute job coordinator")]
pub struct Cli {
    /// Path to a TOML/YAML/JSON configuration file.
    #[arg(long, env = "COORDINATOR_CONFIG")]
    pub config: Option<String>,

    /// Override bind_host.
    #[arg(long)]
    pub bind_host: Option<String>,

    /// Override bind_port.
    #[arg(long)]
    pub bind_port: Option<u16>,
}
