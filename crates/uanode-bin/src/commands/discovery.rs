// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `endpoints` and `servers` commands.

use tracing::info;
use uanode_config::UanodeConfig;
use uanode_core::{ApplicationDescription, EndpointDescription};

use super::{emit, Session};
use crate::cli::{Cli, DiscoveryArgs};
use crate::error::BinResult;

/// Executes the `endpoints` command.
pub async fn endpoints(cli: &Cli, config: UanodeConfig, args: DiscoveryArgs) -> BinResult<()> {
    let session = Session::open(config).await?;
    let url = discovery_url(&session, &args);
    info!(%url, "Requesting endpoints");

    let endpoints = session.connection().request_endpoints(&url)?.await?;
    emit(cli, &endpoints, |endpoints: &Vec<EndpointDescription>| {
        for endpoint in endpoints {
            println!("{endpoint}  level={}", endpoint.security_level);
        }
    })?;

    session.close().await
}

/// Executes the `servers` command.
pub async fn servers(cli: &Cli, config: UanodeConfig, args: DiscoveryArgs) -> BinResult<()> {
    let session = Session::open(config).await?;
    let url = discovery_url(&session, &args);
    info!(%url, "Finding servers");

    let servers = session.connection().find_servers(&url)?.await?;
    emit(cli, &servers, |servers: &Vec<ApplicationDescription>| {
        for server in servers {
            println!("{}  {}", server.application_name, server.application_uri);
            for url in &server.discovery_urls {
                println!("    {url}");
            }
        }
    })?;

    session.close().await
}

fn discovery_url(session: &Session, args: &DiscoveryArgs) -> String {
    args.url
        .clone()
        .unwrap_or_else(|| session.config().connection.endpoint_url.clone())
}
