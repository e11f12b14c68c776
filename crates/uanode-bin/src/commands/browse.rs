// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `browse` and `call` commands.

use serde_json::json;
use uanode_config::UanodeConfig;
use uanode_core::{NodeId, QualifiedName, ReferenceDescription, RelativePathElement, TypedArgument, Variant, VariantType};

use super::{emit, Session};
use crate::cli::{BrowseArgs, CallArgs, Cli};
use crate::error::{BinError, BinResult};

// =============================================================================
// Browse
// =============================================================================

/// Executes the `browse` command.
///
/// Lists children of the start node, or with `--path` resolves the path and
/// prints the node it ends at.
pub async fn browse(cli: &Cli, config: UanodeConfig, args: BrowseArgs) -> BinResult<()> {
    let session = Session::open(config).await?;
    let node = session.node(&args.node)?;

    match &args.path {
        Some(path) => {
            let resolved = node.resolve_browse_path(parse_browse_path(path)?)?.await?;
            let target = resolved
                .node_id
                .ok_or_else(|| BinError::service(format!("{path}: {}", resolved.status)))?;
            let output = json!({ "path": path, "node_id": target.to_string() });
            emit(cli, &output, |_| println!("{target}"))?;
        }
        None => {
            let reference_type: NodeId = args.reference_type.parse()?;
            let result = node.browse_children(reference_type, 0)?.await?;
            if !result.status.is_good() {
                return Err(BinError::service(format!("{}: {}", args.node, result.status)));
            }
            emit(cli, &result.references, |references: &Vec<ReferenceDescription>| {
                for reference in references {
                    println!(
                        "{:<36} {:<14} {}",
                        reference.target_node_id.to_string(),
                        reference.node_class.to_string(),
                        reference.browse_name
                    );
                }
            })?;
        }
    }

    session.close().await
}

/// Parses `2:Machine/2:Speed` into path elements over hierarchical
/// references.
fn parse_browse_path(path: &str) -> BinResult<Vec<RelativePathElement>> {
    let elements = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| -> BinResult<RelativePathElement> {
            Ok(RelativePathElement::new(segment.parse::<QualifiedName>()?))
        })
        .collect::<BinResult<Vec<_>>>()?;
    if elements.is_empty() {
        return Err(BinError::argument(format!("empty browse path '{path}'")));
    }
    Ok(elements)
}

// =============================================================================
// Call
// =============================================================================

/// Executes the `call` command.
pub async fn call(cli: &Cli, config: UanodeConfig, args: CallArgs) -> BinResult<()> {
    let arguments = args
        .args
        .iter()
        .map(String::as_str)
        .map(parse_argument)
        .collect::<BinResult<Vec<_>>>()?;

    let session = Session::open(config).await?;
    let object = session.node(&args.object)?;
    let method = session.node_id(&args.method)?;

    let result = object.call_method(&method, arguments)?.await?;
    if !result.status.is_good() {
        let inputs: Vec<String> = result.input_results.iter().map(ToString::to_string).collect();
        let detail = if inputs.is_empty() {
            String::new()
        } else {
            format!(" (inputs: {})", inputs.join(", "))
        };
        return Err(BinError::service(format!("{}: {}{detail}", args.method, result.status)));
    }

    emit(cli, &result.outputs, |outputs: &Vec<Variant>| {
        for (index, output) in outputs.iter().enumerate() {
            println!("[{index}] {output}");
        }
    })?;

    session.close().await
}

/// Parses `Type:value`; the value may itself contain colons.
fn parse_argument(text: &str) -> BinResult<TypedArgument> {
    let (type_name, value) = text
        .split_once(':')
        .ok_or_else(|| BinError::argument(format!("expected Type:value, got '{text}'")))?;
    let value_type: VariantType = type_name.parse()?;
    Ok(TypedArgument::new(value, value_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_browse_path() {
        let path = parse_browse_path("2:Machine/2:Speed").unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].target_name, QualifiedName::new(2, "Machine"));
        assert_eq!(path[1].target_name, QualifiedName::new(2, "Speed"));

        let plain = parse_browse_path("Objects").unwrap();
        assert_eq!(plain[0].target_name, QualifiedName::new(0, "Objects"));

        assert!(parse_browse_path("/").is_err());
    }

    #[test]
    fn test_parse_argument() {
        let argument = parse_argument("Double:1.5").unwrap();
        assert_eq!(argument.value_type, VariantType::Double);
        assert_eq!(argument.value, Variant::from("1.5"));

        let text = parse_argument("String:a:b").unwrap();
        assert_eq!(text.value, Variant::from("a:b"));

        assert!(parse_argument("1.5").is_err());
        assert!(parse_argument("Number:1").is_err());
    }
}
