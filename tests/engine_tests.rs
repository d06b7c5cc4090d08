use std::sync::Arc;
use std::time::Duration;

use unseen::{
    classifier::{client::ClassifierClient, prompt::DEFAULT_INSTRUCTION, retry::RetryPolicy},
    engine::{config::EngineConfig, orchestrator::Engine},
    style::registry::{InMemoryStyleRegistry, StyleRegistry, TRANSITION},
    trace::logger::TraceLogger,
    transform::{
        cache::TransformationCache,
        transform_model::{CacheKey, Context, Patch, TransformationMap},
    },
    tree::{identity::content_fingerprint, node_model::ElementNode},
};

use crate::common::utils::{APPLY_RESPONSE, Reply, ScriptedBackend, apply_button, hero_tree};

mod common;

// =========================================================================
// Helpers
// =========================================================================

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10))
}

fn engine_with(
    backend: Arc<ScriptedBackend>,
    config: EngineConfig,
) -> (Engine, Arc<InMemoryStyleRegistry>) {
    let registry = Arc::new(InMemoryStyleRegistry::new());
    let engine = Engine::new(
        config,
        ClassifierClient::new(backend, fast_retry()),
        registry.clone(),
    );
    (engine, registry)
}

fn enabled() -> EngineConfig {
    EngineConfig::default().enabled().with_api_key("test-key")
}

fn campaign(name: &str) -> Context {
    Context {
        campaign: Some(name.into()),
        ..Context::default()
    }
}

// =========================================================================
// Disabled paths
// =========================================================================

#[tokio::test]
async fn transform_not_requested_skips_transport() {
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE));
    let (engine, _) = engine_with(backend.clone(), enabled());
    let tree = hero_tree();

    let result = engine.transform(&tree, false).await;

    assert_eq!(backend.calls(), 0);
    assert_eq!(result.tree, tree);
    assert!(result.map.is_empty());
}

#[tokio::test]
async fn classifier_flag_off_skips_cache_and_transport() {
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE));
    let (engine, _) = engine_with(backend.clone(), EngineConfig::default());
    let tree = hero_tree();

    let result = engine.transform(&tree, true).await;

    assert_eq!(backend.calls(), 0);
    assert_eq!(result.tree, tree);
    assert!(engine.cache().is_empty());
}

// =========================================================================
// Classification, caching, invalidation
// =========================================================================

#[tokio::test]
async fn end_to_end_transform_patches_and_registers_hover() {
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE));
    let (engine, registry) = engine_with(backend.clone(), enabled());

    let result = engine.transform(&apply_button(), true).await;

    assert_eq!(result.tree.text.as_deref(), Some("New"));
    assert_eq!(result.tree.href.as_deref(), Some("/x"));
    assert_eq!(result.tree.style.get("color").map(String::as_str), Some("red"));
    assert_eq!(result.tree.style.get("transition").map(String::as_str), Some(TRANSITION));
    assert_eq!(registry.rules().len(), 1);
    assert!(registry.rules()[0].css.starts_with("#apply-button:hover"));
    assert!(engine.stylesheet().contains("color: blue !important;"));
}

#[tokio::test]
async fn identical_requests_hit_the_cache() {
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE));
    let (engine, _) = engine_with(backend.clone(), enabled().with_context(campaign("home_loans")));
    let tree = hero_tree();

    let first = engine.transform(&tree, true).await;
    let second = engine.transform(&tree, true).await;

    assert_eq!(backend.calls(), 1);
    assert_eq!(first.map, second.map);
    assert_eq!(first.tree, second.tree);
    assert_eq!(engine.cache().len(), 1);
}

#[tokio::test]
async fn context_change_triggers_new_classification() {
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE));
    let (engine, _) = engine_with(backend.clone(), enabled().with_context(campaign("home_loans")));
    let tree = hero_tree();

    engine.transform(&tree, true).await;
    assert!(engine.set_context(campaign("gold_loans")));
    assert!(engine.cache().is_empty(), "cache cleared on context change");

    engine.transform(&tree, true).await;
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn environment_change_resolves_and_clears() {
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE));
    let (engine, _) = engine_with(backend.clone(), enabled().with_context(campaign("home_loans")));
    let tree = hero_tree();

    engine.transform(&tree, true).await;

    assert!(engine.notify_environment_change(Some("https://bank.example/?utm_campaign=personal_loans")));
    assert_eq!(engine.context().campaign.as_deref(), Some("personal_loans"));
    assert!(engine.cache().is_empty());

    // Same environment again: nothing changes, cache survives.
    engine.transform(&tree, true).await;
    assert!(!engine.notify_environment_change(Some("?utm_campaign=personal_loans")));
    assert_eq!(engine.cache().len(), 1);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn content_identifier_overrides_text_identity() {
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE));
    let (engine, _) = engine_with(backend.clone(), enabled().with_content_identifier("hero"));

    engine.transform(&hero_tree(), true).await;
    let reworded = hero_tree().with_text_child("New tagline");
    engine.transform(&reworded, true).await;

    assert_eq!(backend.calls(), 1, "same explicit identity shares the cache entry");
}

#[tokio::test]
async fn shared_cache_entry_is_keyed_by_context_instruction_and_content() {
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE));
    let cache = Arc::new(TransformationCache::new());
    let (engine, _) = engine_with(backend.clone(), enabled());
    let engine = engine.with_cache(cache.clone());
    let tree = hero_tree();

    let result = engine.transform(&tree, true).await;

    let key = CacheKey::derive(
        &Context::default(),
        DEFAULT_INSTRUCTION,
        &content_fingerprint(&tree, None),
    );
    let entry = cache.entry(&key).expect("entry stored under the derived key");
    assert_eq!(entry.key, key);
    assert_eq!(entry.map, result.map);
}

#[tokio::test]
async fn apply_with_known_map_skips_classifier() {
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE));
    let (engine, registry) = engine_with(backend.clone(), enabled());
    let map = TransformationMap::new().with(
        "learn-more",
        Patch {
            href: Some("/rates".into()),
            ..Patch::default()
        },
    );

    let out = engine.apply(&hero_tree(), &map);

    assert_eq!(backend.calls(), 0);
    assert_eq!(out.find("learn-more").and_then(|n| n.href.as_deref()), Some("/rates"));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn configured_instruction_reaches_prompt_unless_context_overrides() {
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE));
    let (engine, _) = engine_with(backend.clone(), enabled().with_instruction("Make it festive"));

    engine.transform(&hero_tree(), true).await;
    assert!(backend.last_prompt().unwrap().contains("\"Make it festive\""));

    let urgent = Context {
        instruction: Some("Create urgency".into()),
        ..Context::default()
    };
    engine.transform_with_context(&hero_tree(), &urgent).await;
    assert!(backend.last_prompt().unwrap().contains("\"Create urgency\""));
    assert_eq!(backend.calls(), 2, "instruction is part of the cache key");
}

// =========================================================================
// Failure fallback
// =========================================================================

#[tokio::test]
async fn exhausted_retries_fall_back_to_original_tree() {
    let backend = Arc::new(ScriptedBackend::scripted(vec![], Reply::Status(500)));
    let (engine, _) = engine_with(backend.clone(), enabled());
    let tree = hero_tree();

    let result = engine.transform(&tree, true).await;

    assert_eq!(backend.calls(), 3);
    assert_eq!(result.tree, tree);
    assert!(result.map.is_empty());
    assert!(engine.cache().is_empty(), "failures are never cached");
}

#[tokio::test]
async fn unparseable_answer_falls_back_without_retry() {
    let backend = Arc::new(ScriptedBackend::always("Here you go: not json"));
    let (engine, _) = engine_with(backend.clone(), enabled());
    let tree = hero_tree();

    let result = engine.transform(&tree, true).await;

    assert_eq!(backend.calls(), 1);
    assert_eq!(result.tree, tree);
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn missing_api_key_falls_back_without_network() {
    let config = EngineConfig::default()
        .enabled()
        .with_retry(RetryPolicy::new(1, Duration::from_millis(1)));
    let engine = Engine::from_config(config).expect("engine builds without a key");
    assert_eq!(engine.config().api_key_status(), "missing");
    let tree = hero_tree();

    let result = engine.transform(&tree, true).await;

    assert_eq!(result.tree, tree);
    assert!(result.map.is_empty());
}

// =========================================================================
// Flat shape targets the root
// =========================================================================

#[tokio::test]
async fn flat_response_patches_root_node() {
    let backend = Arc::new(ScriptedBackend::always(
        r##"{"style":{"background":"#fafafa","backgroundColor":"#000"}}"##,
    ));
    let (engine, _) = engine_with(backend, enabled());

    let result = engine.transform(&hero_tree(), true).await;

    assert!(result.map.get("hero").is_some());
    assert_eq!(result.tree.style.get("background").map(String::as_str), Some("#fafafa"));
    assert!(!result.tree.style.contains_key("backgroundColor"));
}

// =========================================================================
// Single-flight and staleness
// =========================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_misses_share_one_request() {
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE).with_latency(Duration::from_millis(500)));
    let (engine, _) = engine_with(backend.clone(), enabled());
    let tree = hero_tree();

    let (a, b) = tokio::join!(engine.transform(&tree, true), engine.transform(&tree, true));

    assert_eq!(backend.calls(), 1);
    assert_eq!(a, b);
    assert!(a.map.get("apply-button").is_some());
    assert_eq!(engine.cache().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn result_started_before_context_change_is_not_cached() {
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE).with_latency(Duration::from_millis(500)));
    let (engine, _) = engine_with(backend.clone(), enabled().with_context(campaign("home_loans")));
    let tree = hero_tree();

    let change = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.set_context(campaign("gold_loans"))
    };
    let (result, changed) = tokio::join!(engine.transform(&tree, true), change);

    assert!(changed);
    assert!(result.map.get("apply-button").is_some(), "caller still gets its result");
    assert!(engine.cache().is_empty(), "stale result not written back");
}

// =========================================================================
// Trace file
// =========================================================================

#[tokio::test]
async fn trace_file_records_each_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");
    let backend = Arc::new(ScriptedBackend::always(APPLY_RESPONSE));
    let (engine, _) = engine_with(backend, enabled());
    let engine = engine.with_tracer(TraceLogger::open(&path));
    let tree: ElementNode = hero_tree();

    engine.transform(&tree, true).await;
    engine.transform(&tree, true).await;
    engine.transform(&tree, false).await;

    let content = std::fs::read_to_string(&path).unwrap();
    let outcomes: Vec<String> = content
        .lines()
        .map(|line| {
            let v: serde_json::Value = serde_json::from_str(line).unwrap();
            v["outcome"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(outcomes, vec!["classified", "cache_hit", "disabled"]);
}

#[test]
fn unopenable_trace_file_disables_tracing() {
    let dir = tempfile::tempdir().unwrap();
    let logger = TraceLogger::open(dir.path().join("missing").join("trace.jsonl"));
    assert!(logger.path().is_none());

    let path = dir.path().join("trace.jsonl");
    assert_eq!(TraceLogger::open(&path).path(), Some(path.as_path()));
}
