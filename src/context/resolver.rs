use url::Url;

use crate::transform::transform_model::Context;

/// Read campaign attribution from a full URL or a bare query string.
/// Empty values count as absent.
pub fn context_from_query(input: &str) -> Context {
    let query = match Url::parse(input) {
        Ok(url) => url.query().unwrap_or("").to_string(),
        Err(_) => input.trim_start_matches('?').to_string(),
    };

    let mut context = Context::default();
    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        let slot = match name.as_ref() {
            "utm_source" => &mut context.source,
            "utm_campaign" => &mut context.campaign,
            "utm_medium" => &mut context.medium,
            "utm_term" => &mut context.term,
            "utm_content" => &mut context.content,
            _ => continue,
        };
        // First occurrence wins, as with URLSearchParams.get
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }
    context
}

/// Overlay every field present in `environment` on top of `base`.
pub fn merge(base: &Context, environment: &Context) -> Context {
    fn pick(base: &Option<String>, env: &Option<String>) -> Option<String> {
        env.clone().or_else(|| base.clone())
    }

    Context {
        source: pick(&base.source, &environment.source),
        campaign: pick(&base.campaign, &environment.campaign),
        medium: pick(&base.medium, &environment.medium),
        term: pick(&base.term, &environment.term),
        content: pick(&base.content, &environment.content),
        instruction: pick(&base.instruction, &environment.instruction),
    }
}

/// Holds the caller-supplied context and re-resolves it whenever the
/// environment (the current URL) changes.
#[derive(Debug, Clone)]
pub struct ContextResolver {
    base: Context,
    environment: Context,
    current: Context,
}

impl ContextResolver {
    pub fn new(base: Context) -> Self {
        Self {
            current: base.clone(),
            environment: Context::default(),
            base,
        }
    }

    pub fn current(&self) -> &Context {
        &self.current
    }

    /// Re-resolve against a new environment. Returns `true` when the
    /// resolved context differs from the previous one.
    pub fn resolve(&mut self, environment_query: Option<&str>) -> bool {
        self.environment = environment_query
            .map(context_from_query)
            .unwrap_or_default();
        self.refresh()
    }

    /// Replace the caller-supplied base, keeping the last environment.
    pub fn set_base(&mut self, base: Context) -> bool {
        self.base = base;
        self.refresh()
    }

    fn refresh(&mut self) -> bool {
        let next = merge(&self.base, &self.environment);
        let changed = next != self.current;
        self.current = next;
        changed
    }
}
