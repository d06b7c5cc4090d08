use tracing::info;

use crate::classifier::prompt::{build_prompt, effective_instruction};
use crate::cli::config::{AppConfig, Cli, ContextArgs, build_engine_config};
use crate::context::resolver::{context_from_query, merge};
use crate::engine::orchestrator::Engine;
use crate::transform::normalize::normalize_for_target;
use crate::tree::identity::describe_tree;
use crate::tree::node_model::ElementNode;

// ============================================================================
// transform subcommand
// ============================================================================

pub async fn cmd_transform(
    cli: &Cli,
    config: &AppConfig,
    tree_path: &str,
    context: &ContextArgs,
    output: Option<&str>,
    css: Option<&str>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let tree = load_tree(tree_path)?;
    let engine = Engine::from_config(build_engine_config(cli, config, context))?;

    if let Some(url) = context.url.as_deref() {
        engine.notify_environment_change(Some(url));
    }

    let result = engine.transform(&tree, !dry_run).await;
    info!(patched = result.map.len(), "transformation complete");

    let json = serde_json::to_string_pretty(&result.tree)?;
    match output {
        Some(path) => std::fs::write(path, &json)?,
        None => println!("{}", json),
    }

    if let Some(path) = css {
        std::fs::write(path, engine.stylesheet())?;
    }

    Ok(())
}

// ============================================================================
// prompt subcommand
// ============================================================================

pub fn cmd_prompt(
    config: &AppConfig,
    tree_path: &str,
    context: &ContextArgs,
) -> Result<String, Box<dyn std::error::Error>> {
    let tree = load_tree(tree_path)?;

    let mut resolved = merge(&config.context, &context.to_context());
    if let Some(url) = context.url.as_deref() {
        resolved = merge(&resolved, &context_from_query(url));
    }
    let instruction = effective_instruction(&resolved, config.classifier.instruction.as_deref());

    Ok(build_prompt(instruction, &describe_tree(&tree), &resolved))
}

// ============================================================================
// normalize subcommand
// ============================================================================

pub fn cmd_normalize(input: &str, target: &str) -> Result<String, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(input)?;
    let map = normalize_for_target(&raw, target)?;
    Ok(serde_json::to_string_pretty(&map)?)
}

// ============================================================================
// Helpers
// ============================================================================

/// Read a content tree from a JSON file.
pub fn load_tree(path: &str) -> Result<ElementNode, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let tree: ElementNode = serde_json::from_str(&content)?;
    Ok(tree)
}
