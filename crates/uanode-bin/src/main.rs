// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! uanode - OPC UA node access from the command line.

use uanode_bin::cli::{Cli, LogFormat};
use uanode_bin::error::report_error_and_exit;
use uanode_bin::{execute, init_logging, load_config};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => report_error_and_exit(e),
    };

    let format = cli
        .log_format
        .unwrap_or_else(|| LogFormat::from(config.logging.format));
    init_logging(cli.effective_log_level(config.logging.level.as_str()), format);

    if let Err(e) = execute(cli, config).await {
        report_error_and_exit(e);
    }
}
