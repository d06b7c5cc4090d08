use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::classifier::retry::RetryPolicy;
use crate::context::resolver::merge;
use crate::engine::config::EngineConfig;
use crate::transform::transform_model::Context;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "unseen",
    version,
    about = "Personalize a content tree with a remote text classifier"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Classifier API key (falls back to the config file, then GEMINI_API_KEY)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Classifier endpoint URL
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Path to config file (default: unseen.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transform a JSON content tree and print the result
    Transform {
        /// Path to the content tree JSON file
        #[arg(long)]
        tree: String,

        #[command(flatten)]
        context: ContextArgs,

        /// Write the transformed tree here instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Write the hover stylesheet to this file
        #[arg(long)]
        css: Option<String>,

        /// Skip the classifier and print the tree unchanged
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Print the classifier prompt for a content tree
    Prompt {
        /// Path to the content tree JSON file
        #[arg(long)]
        tree: String,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Normalize a saved raw classifier response
    Normalize {
        /// Path to the raw response text
        #[arg(long)]
        input: String,

        /// Key for the single entry of a flat style-only response
        #[arg(long, default_value = "root")]
        target: String,
    },
}

/// Campaign context given on the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct ContextArgs {
    /// Page URL (or query string) to read utm_* parameters from
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub source: Option<String>,

    #[arg(long)]
    pub campaign: Option<String>,

    #[arg(long)]
    pub medium: Option<String>,

    #[arg(long)]
    pub term: Option<String>,

    #[arg(long)]
    pub content: Option<String>,

    /// Custom instruction for the classifier
    #[arg(long)]
    pub instruction: Option<String>,
}

impl ContextArgs {
    pub fn to_context(&self) -> Context {
        Context {
            source: self.source.clone(),
            campaign: self.campaign.clone(),
            medium: self.medium.clone(),
            term: self.term.clone(),
            content: self.content.clone(),
            instruction: self.instruction.clone(),
        }
    }
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `unseen.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub context: Context,
    #[serde(default)]
    pub content_identifier: Option<String>,
    #[serde(default)]
    pub trace_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub enabled: bool,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub instruction: Option<String>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or("unseen.yaml");
    match std::fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    }
}

// ============================================================================
// Config Builders (merge CLI args with config file)
// ============================================================================

/// Environment variable consulted when neither the CLI nor the config file
/// carries an API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Resolve the engine configuration: CLI > config file > environment > default.
/// Only `--api-key` or `classifier.enabled` turn the classifier on; a key
/// found in the environment never does.
pub fn build_engine_config(cli: &Cli, config: &AppConfig, context: &ContextArgs) -> EngineConfig {
    let env_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
    build_engine_config_with_env(cli, config, context, env_key)
}

/// `build_engine_config` with the environment key passed in explicitly.
pub fn build_engine_config_with_env(
    cli: &Cli,
    config: &AppConfig,
    context: &ContextArgs,
    env_key: Option<String>,
) -> EngineConfig {
    let api_key = cli
        .api_key
        .clone()
        .or_else(|| config.classifier.api_key.clone())
        .or(env_key);
    let endpoint = cli
        .endpoint
        .clone()
        .or_else(|| config.classifier.endpoint.clone());

    let mut engine = EngineConfig {
        use_remote_classifier: config.classifier.enabled || cli.api_key.is_some(),
        api_key,
        instruction: context
            .instruction
            .clone()
            .or_else(|| config.classifier.instruction.clone()),
        context: merge(&config.context, &context.to_context()),
        content_identifier: config.content_identifier.clone(),
        retry: config.classifier.retry,
        trace_file: config.trace_file.clone(),
        ..EngineConfig::default()
    };
    if let Some(endpoint) = endpoint {
        engine.endpoint = endpoint;
    }
    engine
}
