// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `monitor` command.

use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uanode_config::schema::millis;
use uanode_config::UanodeConfig;
use uanode_core::{
    Attribute, BackendEvent, DataChangeFilter, EventFilter, MonitoringFilter, MonitoringParameters, Node,
    SimpleAttributeOperand,
};

use super::Session;
use crate::cli::{Cli, MonitorArgs, OutputFormat};
use crate::error::{BinError, BinResult};
use crate::shutdown::run_until_signal;

/// Event fields printed in event mode, in select order.
const EVENT_FIELDS: [&str; 5] = ["EventType", "SourceName", "Time", "Message", "Severity"];

/// Executes the `monitor` command.
///
/// Prints notifications until `--duration` elapses, `--count`
/// notifications arrived, or the process is interrupted.
pub async fn monitor(cli: &Cli, config: UanodeConfig, args: MonitorArgs) -> BinResult<()> {
    let session = Session::open(config).await?;
    let parameters = parameters(&session, &args)?;
    let attribute = if args.events {
        Attribute::EventNotifier
    } else {
        Attribute::Value
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<(String, BackendEvent)>();
    let mut nodes: Vec<Node> = Vec::with_capacity(args.nodes.len());
    for name in &args.nodes {
        let node = session.node(name)?;
        let mut stream = node.attribute_events(attribute);

        let outcome = if args.events {
            node.enable_event_monitoring(event_filter(), parameters.clone())?.await?
        } else {
            node.enable_monitoring(attribute.mask(), parameters.clone())?.await?
        };
        if !outcome.status.is_good() {
            return Err(BinError::service(format!("{name}: {}", outcome.status)));
        }
        info!(node = %name, %attribute, "Monitoring");

        let tx = tx.clone();
        let label = name.clone();
        tokio::spawn(async move {
            while let Some(event) = stream.recv().await {
                if tx.send((label.clone(), event)).is_err() {
                    break;
                }
            }
        });
        nodes.push(node);
    }
    drop(tx);

    let output = cli.output;
    let limit = args.count;
    let printing = async move {
        let mut seen = 0usize;
        while let Some((label, event)) = rx.recv().await {
            if print_notification(output, &label, &event)? {
                seen += 1;
                if limit.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
        }
        Ok::<usize, BinError>(seen)
    };
    let bounded = async {
        match args.duration {
            Some(duration) => tokio::time::timeout(duration, printing).await.unwrap_or(Ok(0)),
            None => printing.await,
        }
    };

    match run_until_signal(bounded).await? {
        Some(result) => {
            result?;
        }
        None => info!("Interrupted"),
    }

    for node in &nodes {
        if let Err(e) = node.disable_monitoring(attribute.mask())?.await {
            warn!(node = %node.node_id(), error = %e, "Disable monitoring failed");
        }
    }
    drop(nodes);
    session.close().await
}

/// Configured defaults overridden by the command flags.
fn parameters(session: &Session, args: &MonitorArgs) -> BinResult<MonitoringParameters> {
    let mut parameters = session.config().monitoring_parameters();
    if let Some(interval) = args.interval {
        parameters.publishing_interval = millis(interval);
    }
    if let Some(sampling) = args.sampling {
        parameters.sampling_interval = millis(sampling);
    }
    if let Some(deadband) = args.deadband {
        if args.events {
            return Err(BinError::argument("--deadband applies to value monitoring only"));
        }
        parameters = parameters.with_filter(MonitoringFilter::DataChange(DataChangeFilter::absolute(deadband)));
    }
    if parameters.publishing_interval <= 0.0 {
        parameters.publishing_interval = millis(Duration::from_secs(1));
    }
    Ok(parameters)
}

fn event_filter() -> EventFilter {
    EVENT_FIELDS
        .iter()
        .fold(EventFilter::new(), |filter, name| filter.select(SimpleAttributeOperand::field(name)))
}

/// Prints a notification; returns `false` for other events on the stream.
fn print_notification(output: OutputFormat, label: &str, event: &BackendEvent) -> BinResult<bool> {
    match event {
        BackendEvent::DataChangeOccurred { value, .. } => {
            match output {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string(&json!({ "node": label, "value": value }))?
                ),
                OutputFormat::Text => {
                    let timestamp = value
                        .source_timestamp
                        .map(|t| t.format("%H:%M:%S%.3f").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!("{timestamp}  {label} = {}  [{}]", value.value, value.status);
                }
            }
            Ok(true)
        }
        BackendEvent::EventOccurred { fields, .. } => {
            match output {
                OutputFormat::Json => {
                    let fields: serde_json::Map<String, serde_json::Value> = EVENT_FIELDS
                        .iter()
                        .zip(fields)
                        .map(|(name, value)| (name.to_string(), value.to_json()))
                        .collect();
                    println!("{}", serde_json::to_string(&json!({ "node": label, "event": fields }))?);
                }
                OutputFormat::Text => {
                    let text: Vec<String> = fields.iter().map(ToString::to_string).collect();
                    println!("{label}  {}", text.join(" | "));
                }
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uanode_core::{DataValue, Variant};

    #[test]
    fn test_event_filter_selects_fields() {
        let filter = event_filter();
        assert_eq!(filter.select_clauses.len(), EVENT_FIELDS.len());
        assert_eq!(filter.select_clauses[4].path_string(), "Severity");
    }

    #[test]
    fn test_print_notification_counts_only_notifications() {
        let change = BackendEvent::DataChangeOccurred {
            subscription_id: 1,
            attribute: Attribute::Value,
            value: DataValue::new(Variant::Int32(3)),
        };
        assert!(print_notification(OutputFormat::Text, "counter", &change).unwrap());

        let event = BackendEvent::EventOccurred {
            subscription_id: 1,
            fields: vec![Variant::from("overheat"), Variant::UInt16(800)],
        };
        assert!(print_notification(OutputFormat::Json, "demo", &event).unwrap());

        let deleted = BackendEvent::SubscriptionDeleted {
            subscription_id: 1,
            status: uanode_core::StatusCode::GOOD,
        };
        assert!(!print_notification(OutputFormat::Text, "demo", &deleted).unwrap());
    }
}
