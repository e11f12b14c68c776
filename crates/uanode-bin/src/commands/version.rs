// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use uanode_core::BackendKind;

use super::print_json;
use crate::cli::{Cli, OutputFormat};
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(cli: &Cli) -> BinResult<()> {
    let backends = BackendKind::available();

    if cli.output == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "uanode-bin": env!("CARGO_PKG_VERSION"),
            "uanode-core": uanode_core::VERSION,
            "uanode-config": uanode_config::VERSION,
            "backends": backends,
            "target": std::env::consts::ARCH,
            "os": std::env::consts::OS,
        }));
    }

    println!("uanode - OPC UA node access");
    println!();
    println!("Version Information:");
    println!("  uanode-bin:    {}", env!("CARGO_PKG_VERSION"));
    println!("  uanode-core:   {}", uanode_core::VERSION);
    println!("  uanode-config: {}", uanode_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Backends:       {}", backends.join(", "));
    println!(
        "  OPC UA:       {}",
        if cfg!(feature = "opcua-backend") { "enabled" } else { "disabled" }
    );
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
