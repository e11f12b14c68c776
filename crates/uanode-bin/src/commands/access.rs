// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` and `write` commands.

use tracing::{debug, info};
use uanode_config::UanodeConfig;
use uanode_core::backend::attribute_type;
use uanode_core::{Attribute, ReadItem, ReadResult, Variant, VariantType};

use super::{emit, Session};
use crate::cli::{Cli, ReadArgs, WriteArgs};
use crate::error::{BinError, BinResult};

/// Executes the `read` command.
///
/// All nodes go out in one bulk read; results print in argument order.
pub async fn read(cli: &Cli, config: UanodeConfig, args: ReadArgs) -> BinResult<()> {
    let attribute: Attribute = args.attribute.parse()?;
    let session = Session::open(config).await?;

    let mut items = Vec::with_capacity(args.nodes.len());
    for name in &args.nodes {
        let mut item = ReadItem::new(session.node_id(name)?, attribute);
        if let Some(range) = &args.range {
            item = item.with_index_range(range.clone());
        }
        items.push(item);
    }

    let results = session.connection().read_node_attributes(items)?.await?;
    debug!(count = results.len(), "Read finished");

    emit(cli, &results, |results: &Vec<ReadResult>| {
        for (name, result) in args.nodes.iter().zip(results) {
            if result.status.is_good() {
                println!("{name}  {attribute} = {}", result.value);
            } else {
                println!("{name}  {attribute}: {}", result.status);
            }
        }
    })?;

    session.close().await
}

/// Executes the `write` command.
pub async fn write(cli: &Cli, config: UanodeConfig, args: WriteArgs) -> BinResult<()> {
    let attribute: Attribute = args.attribute.parse()?;
    let session = Session::open(config).await?;
    let node = session.node(&args.node)?;

    let value_type = match &args.value_type {
        Some(name) => name.parse::<VariantType>()?,
        None => match attribute_type(attribute) {
            Some(fixed) => fixed,
            None => current_value_type(&node).await?,
        },
    };
    let value = Variant::parse_as(&args.value, value_type)?;
    info!(node = %args.node, %attribute, %value, "Writing");

    let result = node.write_attribute(attribute, value)?.await?;
    if !result.is_good() {
        return Err(BinError::service(format!("{} {attribute}: {}", args.node, result.status)));
    }

    emit(cli, &result, |_| {
        if !cli.quiet {
            println!("{}  {attribute}: {}", args.node, result.status);
        }
    })?;

    session.close().await
}

/// Reads the Value attribute to learn which type a text value converts to.
async fn current_value_type(node: &uanode_core::Node) -> BinResult<VariantType> {
    let current = node.read_attribute(Attribute::Value)?.await?;
    if !current.status.is_good() {
        return Err(BinError::service(format!("{}: {}", node.node_id(), current.status)));
    }
    current
        .value
        .variant_type()
        .ok_or_else(|| BinError::argument("the node has no value to take a type from, pass --type"))
}
