// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `history` command.

use chrono::Utc;
use tracing::debug;
use uanode_config::UanodeConfig;
use uanode_core::DataValue;

use super::{emit, Session};
use crate::cli::{Cli, HistoryArgs};
use crate::error::{BinError, BinResult};

/// Executes the `history` command.
///
/// Follows continuation points until the server reports no more data.
pub async fn history(cli: &Cli, config: UanodeConfig, args: HistoryArgs) -> BinResult<()> {
    let end = Utc::now();
    let since = chrono::Duration::from_std(args.since).map_err(|e| BinError::argument(format!("--since: {e}")))?;
    let start = end - since;

    let session = Session::open(config).await?;
    let node = session.node(&args.node)?;

    let mut values: Vec<DataValue> = Vec::new();
    let mut page = node.read_history_raw(start, end, args.page_size, args.bounds)?.await?;
    let mut pages = 1usize;
    loop {
        if !page.status.is_good() {
            return Err(BinError::service(format!("{}: {}", args.node, page.status)));
        }
        values.append(&mut page.data);
        if !page.has_more_data() {
            break;
        }
        page = node.read_history_raw_continue(&page)?.await?;
        pages += 1;
    }
    debug!(pages, values = values.len(), "History read finished");

    emit(cli, &values, |values: &Vec<DataValue>| {
        for value in values {
            let timestamp = value
                .source_timestamp
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            println!("{timestamp}  {}  [{}]", value.value, value.status);
        }
    })?;

    session.close().await
}
