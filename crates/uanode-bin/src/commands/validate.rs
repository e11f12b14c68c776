// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use uanode_config::UanodeConfig;

use super::print_json;
use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::BinResult;

/// Executes the `validate` command.
///
/// Loading already rejected invalid files; this reports the summary and
/// the warnings that do not stop a client from starting.
pub fn validate(cli: &Cli, config: &UanodeConfig, args: ValidateArgs) -> BinResult<()> {
    let source = cli
        .config
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string());
    let warnings = collect_warnings(config)?;

    match cli.output {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {source}");
            println!();
            println!("Summary:");
            println!("  Backend:   {}", config.connection.backend);
            println!("  Endpoint:  {}", config.connection.endpoint()?);
            println!(
                "  Publishing interval: {}",
                humantime::format_duration(config.subscription.publishing_interval)
            );
            println!(
                "  Sampling interval:   {}",
                humantime::format_duration(config.monitoring.sampling_interval)
            );
            println!("  Nodes:     {}", config.nodes.len());
            for (name, node) in &config.nodes {
                println!("    {name} -> {node}");
            }

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {warning}");
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", serde_json::to_string_pretty(config)?);
            }
            Ok(())
        }
        OutputFormat::Json => {
            let mut output = serde_json::json!({
                "valid": true,
                "source": source,
                "warnings": warnings,
            });
            if args.show_config {
                output["config"] = serde_json::to_value(config)?;
            }
            print_json(&output)
        }
    }
}

fn collect_warnings(config: &UanodeConfig) -> BinResult<Vec<String>> {
    let mut warnings = Vec::new();

    let kind = config.connection.backend_kind()?;
    if !kind.is_available() {
        warnings.push(format!(
            "Backend '{kind}' is not available in this build (available: {})",
            uanode_core::BackendKind::available().join(", ")
        ));
    }

    if let Some(min) = config.connection.min_publishing_interval {
        if config.subscription.publishing_interval < min {
            warnings.push(format!(
                "Publishing interval {} is below the minimum {} and will be revised",
                humantime::format_duration(config.subscription.publishing_interval),
                humantime::format_duration(min)
            ));
        }
    }

    if config.monitoring.sampling_interval > config.subscription.publishing_interval {
        warnings.push("Sampling interval is longer than the publishing interval".to_string());
    }

    if config.nodes.is_empty() {
        warnings.push("No node aliases configured".to_string());
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config_warns_about_aliases_only() {
        let warnings = collect_warnings(&UanodeConfig::default()).unwrap();
        assert_eq!(warnings, vec!["No node aliases configured".to_string()]);
    }

    #[test]
    fn test_revised_interval_warning() {
        let mut config = UanodeConfig::default();
        config.connection.min_publishing_interval = Some(Duration::from_secs(2));
        let warnings = collect_warnings(&config).unwrap();
        assert!(warnings.iter().any(|w| w.contains("will be revised")));
    }
}
