use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::classifier::client::{ClassifierClient, GeminiBackend};
use crate::classifier::prompt::effective_instruction;
use crate::context::resolver::ContextResolver;
use crate::engine::config::EngineConfig;
use crate::style::registry::{HoverStyleInjector, StyleRegistry, global_registry};
use crate::trace::logger::TraceLogger;
use crate::trace::trace::{TraceEvent, TransformOutcome};
use crate::transform::cache::TransformationCache;
use crate::transform::error::TransformError;
use crate::transform::normalize::IMPLICIT_TARGET;
use crate::transform::transform_model::{CacheKey, Context, TransformationMap, TransformationResult};
use crate::tree::identity::{content_fingerprint, describe_tree, element_key};
use crate::tree::node_model::ElementNode;
use crate::tree::patcher::apply;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

type Flight = Shared<BoxFuture<'static, Result<TransformationMap, Arc<TransformError>>>>;

/// Entry point for collaborators: cache lookup, classification,
/// normalization, cache store, then tree patching.
///
/// Any failure along that chain yields the caller's tree unchanged with an
/// empty map. Concurrent misses on the same cache key share one request.
pub struct Engine {
    config: EngineConfig,
    classifier: Arc<ClassifierClient>,
    cache: Arc<TransformationCache>,
    hover: HoverStyleInjector,
    resolver: Mutex<ContextResolver>,
    inflight: Mutex<HashMap<CacheKey, Flight>>,
    generation: Arc<AtomicU64>,
    tracer: TraceLogger,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        classifier: ClassifierClient,
        registry: Arc<dyn StyleRegistry>,
    ) -> Self {
        let tracer = match config.trace_file.as_deref() {
            Some(path) => TraceLogger::open(path),
            None => TraceLogger::disabled(),
        };
        Self {
            resolver: Mutex::new(ContextResolver::new(config.context.clone())),
            config,
            classifier: Arc::new(classifier),
            cache: Arc::new(TransformationCache::new()),
            hover: HoverStyleInjector::new(registry),
            inflight: Mutex::new(HashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
            tracer,
        }
    }

    /// Build the production engine: Gemini transport, process-wide registry.
    pub fn from_config(config: EngineConfig) -> Result<Self, TransformError> {
        info!(
            enabled = config.use_remote_classifier,
            api_key = config.api_key_status(),
            "initializing transformation engine"
        );

        let classifier = if !config.use_remote_classifier {
            ClassifierClient::disabled()
        } else {
            match config.api_key.as_deref().filter(|k| !k.is_empty()) {
                Some(key) => {
                    let backend = GeminiBackend::with_timeout(&config.endpoint, key, HTTP_TIMEOUT)?;
                    ClassifierClient::new(Arc::new(backend), config.retry)
                }
                None => ClassifierClient::without_backend(config.retry),
            }
        };

        Ok(Self::new(config, classifier, global_registry()))
    }

    /// Share a cache between engines (or inspect it from tests).
    pub fn with_cache(mut self, cache: Arc<TransformationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_tracer(mut self, tracer: TraceLogger) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TransformationCache> {
        &self.cache
    }

    pub fn context(&self) -> Context {
        self.resolver_lock().current().clone()
    }

    pub fn stylesheet(&self) -> String {
        self.hover.registry().stylesheet()
    }

    // ------------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------------

    /// Transform `tree` under the currently resolved context.
    pub async fn transform(&self, tree: &ElementNode, transform_enabled: bool) -> TransformationResult {
        if !transform_enabled {
            debug!("transformation not requested");
            self.tracer.record(&TraceEvent::now(TransformOutcome::Disabled));
            return TransformationResult::unchanged(tree);
        }
        let context = self.context();
        self.transform_with_context(tree, &context).await
    }

    pub async fn transform_with_context(
        &self,
        tree: &ElementNode,
        context: &Context,
    ) -> TransformationResult {
        if !self.config.use_remote_classifier {
            debug!("remote classification disabled, returning tree unchanged");
            self.tracer.record(&TraceEvent::now(TransformOutcome::Disabled));
            return TransformationResult::unchanged(tree);
        }

        let fingerprint = content_fingerprint(tree, self.config.content_identifier.as_deref());
        let instruction = effective_instruction(context, self.config.instruction.as_deref());
        let key = CacheKey::derive(context, instruction, &fingerprint);

        if let Some(map) = self.cache.get(&key) {
            debug!(fingerprint = %fingerprint, "using cached transformation");
            return self.finish(tree, map, TransformOutcome::CacheHit, &fingerprint);
        }

        let (flight, joined) = match self.join_or_start(&key, tree, context, instruction) {
            FlightStart::Cached(map) => {
                return self.finish(tree, map, TransformOutcome::CacheHit, &fingerprint);
            }
            FlightStart::Joined(flight) => (flight, true),
            FlightStart::Started(flight) => (flight, false),
        };

        let result = flight.clone().await;
        self.retire(&key, &flight);

        match result {
            Ok(map) => {
                let outcome = if joined {
                    TransformOutcome::Shared
                } else {
                    TransformOutcome::Classified
                };
                self.finish(tree, map, outcome, &fingerprint)
            }
            Err(error) => {
                warn!("transformation failed, rendering original tree: {}", error);
                self.tracer.record(
                    &TraceEvent::now(TransformOutcome::Fallback)
                        .with_fingerprint(&fingerprint)
                        .with_error(&error),
                );
                TransformationResult::unchanged(tree)
            }
        }
    }

    /// Patch `tree` with an already known map.
    pub fn apply(&self, tree: &ElementNode, map: &TransformationMap) -> ElementNode {
        apply(tree, map, &self.hover)
    }

    /// Drop every cached map and mark in-flight requests stale so their
    /// results are not written back.
    pub fn clear_cache(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.inflight_lock().clear();
        self.cache.clear();
        debug!("transformation cache cleared");
    }

    /// The environment (e.g. the page URL) changed. Re-resolve the context
    /// and clear the cache when it differs. Returns whether it changed.
    pub fn notify_environment_change(&self, environment_query: Option<&str>) -> bool {
        let changed = self.resolver_lock().resolve(environment_query);
        if changed {
            info!("context changed, clearing transformation cache");
            self.clear_cache();
        }
        changed
    }

    /// Replace the caller-supplied context. Clears the cache when the
    /// resolved context changes.
    pub fn set_context(&self, context: Context) -> bool {
        let changed = self.resolver_lock().set_base(context);
        if changed {
            self.clear_cache();
        }
        changed
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn join_or_start(
        &self,
        key: &CacheKey,
        tree: &ElementNode,
        context: &Context,
        instruction: &str,
    ) -> FlightStart {
        let mut inflight = self.inflight_lock();

        // A flight may have completed between the cache miss and here.
        if let Some(map) = self.cache.get(key) {
            return FlightStart::Cached(map);
        }
        if let Some(flight) = inflight.get(key) {
            debug!("joining in-flight classification");
            return FlightStart::Joined(flight.clone());
        }

        debug!(key = %key, "starting classification");
        let flight = self.start_flight(key, tree, context, instruction);
        inflight.insert(key.clone(), flight.clone());
        FlightStart::Started(flight)
    }

    fn start_flight(
        &self,
        key: &CacheKey,
        tree: &ElementNode,
        context: &Context,
        instruction: &str,
    ) -> Flight {
        let classifier = Arc::clone(&self.classifier);
        let cache = Arc::clone(&self.cache);
        let generation = Arc::clone(&self.generation);
        let started_at = generation.load(Ordering::SeqCst);

        let key = key.clone();
        let content = describe_tree(tree);
        let context = context.clone();
        let instruction = instruction.to_string();
        let target = element_key(tree)
            .as_str()
            .unwrap_or(IMPLICIT_TARGET)
            .to_string();

        async move {
            match classifier
                .classify(&instruction, &content, &context, &target)
                .await
            {
                Ok(map) => {
                    if generation.load(Ordering::SeqCst) == started_at {
                        cache.put(key, map.clone());
                    } else {
                        debug!("context changed during classification, result not cached");
                    }
                    Ok(map)
                }
                Err(error) => Err(Arc::new(error)),
            }
        }
        .boxed()
        .shared()
    }

    /// Remove a finished flight, unless a newer one already took its slot.
    fn retire(&self, key: &CacheKey, flight: &Flight) {
        let mut inflight = self.inflight_lock();
        if inflight.get(key).is_some_and(|f| f.ptr_eq(flight)) {
            inflight.remove(key);
        }
    }

    fn finish(
        &self,
        tree: &ElementNode,
        map: TransformationMap,
        outcome: TransformOutcome,
        fingerprint: &str,
    ) -> TransformationResult {
        let patched = apply(tree, &map, &self.hover);
        self.tracer.record(
            &TraceEvent::now(outcome)
                .with_fingerprint(fingerprint)
                .with_keys(map.keys()),
        );
        TransformationResult { tree: patched, map }
    }

    fn resolver_lock(&self) -> MutexGuard<'_, ContextResolver> {
        self.resolver.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn inflight_lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Flight>> {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

enum FlightStart {
    Cached(TransformationMap),
    Joined(Flight),
    Started(Flight),
}
