use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::LoadError;
use crate::env::EnvSource;
use crate::handler::TypedHandler;
use crate::registry::{self, KindFactory, Registry};
use crate::source::{Context, KeySource};
use crate::types::Kind;
use crate::walker::{Bind, Walker};

/// Entry point for building a load.
pub struct Envbind;

impl Envbind {
    pub fn builder() -> EnvbindBuilder {
        EnvbindBuilder::new()
    }
}

/// Builder for one or more loads.
///
/// Controls three things:
///
/// - **Source**: [`source()`](Self::source), where raw values come from
///   (default: the process environment).
/// - **Handlers**: [`handler()`](Self::handler) and
///   [`kind_factory()`](Self::kind_factory) add call-scoped overrides on top
///   of the parent registry, without touching it.
/// - **Parent registry**: [`registry()`](Self::registry), the layer lookups
///   fall back to (default: a snapshot of the global registry).
pub struct EnvbindBuilder {
    source: Option<Box<dyn KeySource>>,
    parent: Option<Arc<Registry>>,
    overrides: Registry,
    kinds: Vec<(Kind, KindFactory)>,
    ctx: Context,
}

impl EnvbindBuilder {
    fn new() -> Self {
        Self {
            source: None,
            parent: None,
            overrides: Registry::empty(),
            kinds: Vec::new(),
            ctx: Context::new(),
        }
    }

    /// Read values from `source` instead of the environment.
    pub fn source<S: KeySource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Override the handler for `T` in this load only.
    pub fn handler<T: Send + 'static>(mut self, handler: TypedHandler<T>) -> Self {
        self.overrides.register(handler);
        self
    }

    /// Override the category factory for `kind` in this load only.
    ///
    /// Category factories are only consulted on the root layer, so the load
    /// runs against a copy of the parent chain with the root's factory
    /// replaced.
    pub fn kind_factory(mut self, kind: Kind, factory: KindFactory) -> Self {
        self.kinds.push((kind, factory));
        self
    }

    /// Use `registry` as the parent layer instead of the global registry.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.parent = Some(registry);
        self
    }

    /// Hand `ctx` to every key lookup.
    pub fn context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    /// The layered registry a load will use: this builder's overrides over
    /// the parent.
    fn layered_registry(&self) -> Registry {
        let mut parent = self.parent.clone().unwrap_or_else(registry::global);
        for &(kind, factory) in &self.kinds {
            parent = Arc::new(parent.with_root_kind(kind, factory));
        }
        let mut layer = Registry::child(parent);
        layer.absorb(&self.overrides);
        layer
    }

    /// Populate `target` in place.
    ///
    /// Fields whose keys resolve are overwritten; the rest keep their values.
    /// Value errors are collected and returned together as
    /// [`LoadError::Invalid`]; any other error aborted the walk.
    pub fn load<B: Bind + ?Sized>(&self, target: &mut B) -> Result<(), LoadError> {
        let registry = self.layered_registry();
        match &self.source {
            Some(source) => run(target, source.as_ref(), &registry, &self.ctx),
            None => run(target, &EnvSource::new(), &registry, &self.ctx),
        }
    }

    /// Load into a fresh `B::default()`.
    pub fn load_default<B: Bind + Default>(&self) -> Result<B, LoadError> {
        let mut target = B::default();
        self.load(&mut target)?;
        Ok(target)
    }
}

/// Load `target` from the process environment with the global registry.
pub fn load<B: Bind + ?Sized>(target: &mut B) -> Result<(), LoadError> {
    Envbind::builder().load(target)
}

fn run<B: Bind + ?Sized>(
    target: &mut B,
    source: &dyn KeySource,
    registry: &Registry,
    ctx: &Context,
) -> Result<(), LoadError> {
    let mut walker = Walker::new(source, registry, ctx);
    if let Err(err) = target.bind(&mut walker) {
        error!(event = "envbind.load.aborted", error = %err);
        return Err(err);
    }

    let errors = walker.finish();
    if errors.is_empty() {
        debug!(event = "envbind.load.completed");
        return Ok(());
    }
    warn!(
        event = "envbind.load.invalid",
        count = errors.len(),
        keys = ?errors.keys(),
        message = %errors
    );
    Err(LoadError::Invalid(errors))
}
