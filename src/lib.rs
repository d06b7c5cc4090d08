//! Selective tree transformation: patch the matched nodes of a content tree
//! with text, link and style overrides computed by a remote text classifier.

pub mod classifier;
pub mod cli;
pub mod context;
pub mod engine;
pub mod style;
pub mod trace;
pub mod transform;
pub mod tree;

pub use engine::config::EngineConfig;
pub use engine::orchestrator::Engine;
pub use transform::error::TransformError;
pub use transform::transform_model::{Context, Patch, TransformationMap, TransformationResult};
pub use tree::node_model::{ElementKind, ElementNode};
