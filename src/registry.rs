//! Type registry: runtime type to handler, with layered overrides.
//!
//! Lookup for a type walks the layers from the local one up to the root
//! looking for an exact [`TypeId`] match. Only when every layer misses is the
//! root layer's category factory for the type's [`Kind`] consulted. A pointer
//! type that still has no handler is looked up again as its pointee.
//!
//! A process-wide global registry, seeded with the built-in catalog, is the
//! default root. Updating it swaps in a new snapshot, so loads already running
//! keep the registry they started with.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::debug;

use crate::builtin;
use crate::handler::{self, ErasedHandler, TypedHandler};
use crate::types::{Kind, TypeInfo};

/// Builds a handler for a type that has no exact match.
pub type KindFactory = fn(&TypeInfo) -> Arc<dyn ErasedHandler>;

static GLOBAL: LazyLock<RwLock<Arc<Registry>>> =
    LazyLock::new(|| RwLock::new(Arc::new(Registry::builtin())));

/// One registry layer.
#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<TypeId, Arc<dyn ErasedHandler>>,
    kinds: HashMap<Kind, KindFactory>,
    parent: Option<Arc<Registry>>,
}

impl Registry {
    /// An empty root layer: no handlers, no category factories.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A root layer holding the built-in catalog.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        builtin::install(&mut registry);
        registry
    }

    /// A fresh layer that defers to `parent` on a miss.
    pub fn child(parent: Arc<Registry>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    /// Register (or shadow) the handler for exactly `T`.
    pub fn register<T: Send + 'static>(&mut self, handler: TypedHandler<T>) -> &mut Self {
        self.handlers
            .insert(TypeId::of::<T>(), handler::erase(handler));
        self
    }

    /// Register an already-erased handler under `id`.
    pub fn register_erased(&mut self, id: TypeId, handler: Arc<dyn ErasedHandler>) -> &mut Self {
        self.handlers.insert(id, handler);
        self
    }

    /// Set the category factory for `kind`. Only consulted on the root layer.
    pub fn register_kind(&mut self, kind: Kind, factory: KindFactory) -> &mut Self {
        self.kinds.insert(kind, factory);
        self
    }

    /// Copy `other`'s exact handlers and factories into this layer.
    pub fn absorb(&mut self, other: &Registry) -> &mut Self {
        self.handlers
            .extend(other.handlers.iter().map(|(id, h)| (*id, h.clone())));
        self.kinds.extend(other.kinds.iter().map(|(k, f)| (*k, *f)));
        self
    }

    /// A copy of this layer chain with `kind`'s factory replaced at the root.
    /// The original chain is untouched.
    pub fn with_root_kind(&self, kind: Kind, factory: KindFactory) -> Registry {
        let mut copy = self.clone();
        match &self.parent {
            Some(parent) => copy.parent = Some(Arc::new(parent.with_root_kind(kind, factory))),
            None => {
                copy.kinds.insert(kind, factory);
            }
        }
        copy
    }

    pub fn parent(&self) -> Option<&Arc<Registry>> {
        self.parent.as_ref()
    }

    fn root(&self) -> &Registry {
        let mut layer = self;
        while let Some(parent) = &layer.parent {
            layer = parent;
        }
        layer
    }

    fn exact(&self, id: TypeId) -> Option<Arc<dyn ErasedHandler>> {
        let mut layer = Some(self);
        while let Some(current) = layer {
            if let Some(found) = current.handlers.get(&id) {
                return Some(found.clone());
            }
            layer = current.parent.as_deref();
        }
        None
    }

    /// Find the handler for `ty`, or `None` if nothing in any layer applies.
    pub fn lookup(&self, ty: &TypeInfo) -> Option<Arc<dyn ErasedHandler>> {
        if let Some(found) = self.exact(ty.id) {
            return Some(found);
        }
        if let Some(factory) = self.root().kinds.get(&ty.kind) {
            debug!(
                event = "envbind.registry.kind_fallback",
                type_name = ty.name,
                kind = ?ty.kind
            );
            return Some(factory(ty));
        }
        let pointee = ty.pointee()?;
        debug!(
            event = "envbind.registry.pointee_lookup",
            type_name = ty.name,
            pointee = pointee.name
        );
        self.lookup(&pointee)
    }

    pub fn contains(&self, ty: &TypeInfo) -> bool {
        self.lookup(ty).is_some()
    }
}

/// Snapshot of the global registry.
pub fn global() -> Arc<Registry> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Add or replace a handler in the global registry.
///
/// Loads started before this call keep using the previous snapshot.
pub fn register_global<T: Send + 'static>(handler: TypedHandler<T>) {
    update_global(|registry| {
        registry.register(handler);
    });
}

/// Add or replace a category factory in the global registry.
pub fn register_global_kind(kind: Kind, factory: KindFactory) {
    update_global(|registry| {
        registry.register_kind(kind, factory);
    });
}

fn update_global(update: impl FnOnce(&mut Registry)) {
    let mut guard = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    update(Arc::make_mut(&mut guard));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::Leaf;
    use crate::meta::Metadata;

    fn constant<T: Clone + Send + Sync + 'static>(value: T) -> TypedHandler<T> {
        TypedHandler::from_fn(move |_| Ok(value.clone()))
    }

    fn run<T: Leaf>(registry: &Registry, raw: &str) -> T {
        let handler = registry.lookup(&TypeInfo::of::<T>()).unwrap();
        let pipeline = handler.build(&Metadata::new()).unwrap().unwrap();
        T::from_boxed(pipeline(raw).unwrap()).ok().unwrap()
    }

    #[test]
    fn local_layer_shadows_parent() {
        let mut parent = Registry::empty();
        parent.register(constant(1u8));
        let mut child = Registry::child(Arc::new(parent));
        child.register(constant(2u8));
        assert_eq!(run::<u8>(&child, ""), 2);
    }

    #[test]
    fn miss_defers_to_parent() {
        let mut parent = Registry::empty();
        parent.register(constant(1u8));
        let child = Registry::child(Arc::new(parent));
        assert_eq!(run::<u8>(&child, ""), 1);
    }

    #[test]
    fn unknown_type_has_no_handler() {
        struct Opaque;
        impl Leaf for Opaque {}
        let registry = Registry::builtin();
        assert!(registry.lookup(&TypeInfo::of::<Opaque>()).is_none());
    }

    #[test]
    fn kind_factory_only_consulted_on_root() {
        struct Level(u8);
        impl Leaf for Level {
            const KIND: Kind = Kind::Uint;
            const BITS: u32 = 8;
            fn from_repr(repr: crate::Repr) -> Result<Self, crate::BoxError> {
                u8::from_repr(repr).map(Level)
            }
        }

        let mut child = Registry::child(Arc::new(Registry::empty()));
        child.register_kind(Kind::Uint, builtin::uint_factory);
        assert!(child.lookup(&TypeInfo::of::<Level>()).is_none());

        let child = Registry::child(Arc::new(Registry::builtin()));
        assert_eq!(run::<Level>(&child, "7").0, 7);
    }

    #[test]
    fn exact_match_beats_kind_factory() {
        let mut registry = Registry::builtin();
        registry.register(constant(99u32));
        assert_eq!(run::<u32>(&registry, "1"), 99);
    }

    #[test]
    fn pointer_falls_back_to_pointee() {
        let registry = Registry::builtin();
        let value = run::<Option<u16>>(&registry, "8080");
        assert_eq!(value, Some(8080));
    }

    #[test]
    fn exact_pointer_handler_wins() {
        let mut registry = Registry::builtin();
        registry.register(constant(Some(1u16)));
        assert_eq!(run::<Option<u16>>(&registry, "8080"), Some(1));
    }

    #[test]
    fn root_kind_replacement_leaves_original_alone() {
        struct Level(u8);
        impl Leaf for Level {
            const KIND: Kind = Kind::Uint;
            const BITS: u32 = 8;
            fn from_repr(repr: crate::Repr) -> Result<Self, crate::BoxError> {
                u8::from_repr(repr).map(Level)
            }
        }

        let original = Registry::child(Arc::new(Registry::empty()));
        let replaced = original.with_root_kind(Kind::Uint, builtin::uint_factory);
        assert!(!original.contains(&TypeInfo::of::<Level>()));
        assert_eq!(run::<Level>(&replaced, "9").0, 9);
    }

    #[test]
    fn absorb_copies_entries() {
        let mut overrides = Registry::empty();
        overrides.register(constant(5u8));
        let mut layer = Registry::child(Arc::new(Registry::builtin()));
        layer.absorb(&overrides);
        assert_eq!(run::<u8>(&layer, "1"), 5);
    }

    #[test]
    fn global_registration_is_visible_in_new_snapshots() {
        struct GlobalOnly;
        impl Leaf for GlobalOnly {}

        let before = global();
        assert!(!before.contains(&TypeInfo::of::<GlobalOnly>()));
        register_global(TypedHandler::from_fn(|_| Ok(GlobalOnly)));
        assert!(global().contains(&TypeInfo::of::<GlobalOnly>()));
        assert!(!before.contains(&TypeInfo::of::<GlobalOnly>()));
    }
}
