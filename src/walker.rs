//! The struct walker: visits every declared field of a target, resolves its
//! value from the key source, and runs it through the registry's pipeline.
//!
//! Per leaf field, in order:
//!
//! 1. No `key` annotation: the field is not bound.
//! 2. Look the key up. A source error aborts the load.
//! 3. The effective value is the source's value when it is non-empty, else the
//!    `default` annotation when the key is not configured at all.
//! 4. No effective value: `required` records [`MissingValue`], `key_required`
//!    on an unconfigured key records [`MissingKey`], otherwise the field keeps
//!    its current value. A flag that is not `true`/`false`/`1`/`0` aborts.
//! 5. Otherwise build the field's pipeline and run it. Build failures abort;
//!    conversion and validation failures are recorded and the walk goes on.

use tracing::debug;

use crate::error::{ConfigError, ConfigErrors, LoadError, MissingKey, MissingValue};
use crate::leaf::Leaf;
use crate::meta::Metadata;
use crate::registry::Registry;
use crate::source::{Context, KeySource};
use crate::types::TypeInfo;

/// A load target: declares its fields to a [`Walker`] in declaration order.
///
/// Usually generated with [`bindable!`](crate::bindable), but simple to write
/// by hand:
///
/// ```
/// use envbind::{Bind, LoadError, Walker};
///
/// #[derive(Default)]
/// struct Server {
///     port: u16,
/// }
///
/// impl Bind for Server {
///     fn bind(&mut self, walker: &mut Walker<'_>) -> Result<(), LoadError> {
///         walker.leaf("port", &mut self.port, envbind::meta!(key = "PORT", default = 8080))
///     }
/// }
/// ```
pub trait Bind {
    fn bind(&mut self, walker: &mut Walker<'_>) -> Result<(), LoadError>;
}

impl<B: Bind + ?Sized> Bind for Box<B> {
    fn bind(&mut self, walker: &mut Walker<'_>) -> Result<(), LoadError> {
        (**self).bind(walker)
    }
}

/// A nested optional struct is allocated when visited.
impl<B: Bind + Default> Bind for Option<B> {
    fn bind(&mut self, walker: &mut Walker<'_>) -> Result<(), LoadError> {
        self.get_or_insert_with(B::default).bind(walker)
    }
}

/// Drives one load over one target. Setup errors come back as `Err` from
/// its methods; value errors are kept until [`finish`](Self::finish).
pub struct Walker<'a> {
    source: &'a dyn KeySource,
    registry: &'a Registry,
    ctx: &'a Context,
    path: String,
    errors: ConfigErrors,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(source: &'a dyn KeySource, registry: &'a Registry, ctx: &'a Context) -> Self {
        Self {
            source,
            registry,
            ctx,
            path: String::new(),
            errors: ConfigErrors::new(),
        }
    }

    /// Dotted path of the struct currently being walked; empty at the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Value errors recorded so far.
    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn finish(self) -> ConfigErrors {
        self.errors
    }

    fn field_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.path)
        }
    }

    /// Bind one leaf field.
    pub fn leaf<T: Leaf>(&mut self, name: &str, field: &mut T, meta: Metadata) -> Result<(), LoadError> {
        let path = self.field_path(name);
        let Some(key) = meta.key() else {
            debug!(event = "envbind.walker.field_unbound", path = %path);
            return Ok(());
        };
        let invalid_flag = |source| LoadError::Build {
            path: path.clone(),
            source,
        };
        let required = meta.required().map_err(invalid_flag)?;
        let key_required = meta.key_required().map_err(invalid_flag)?;

        let found = self
            .source
            .lookup(self.ctx, key)
            .map_err(|source| LoadError::Source {
                key: key.to_string(),
                source,
            })?;
        let present = found.is_some();

        let effective = match found {
            Some(value) if !value.is_empty() => Some(value),
            Some(_) => None,
            None => meta.default_value().map(|default| {
                debug!(event = "envbind.walker.default_applied", path = %path, key = key);
                default.to_string()
            }),
        };

        let Some(raw) = effective else {
            if required {
                self.record(key, ConfigError::new(key, MissingValue));
            } else if key_required && !present {
                self.record(key, ConfigError::new(key, MissingKey));
            } else {
                debug!(event = "envbind.walker.field_unchanged", path = %path, key = key, present);
            }
            return Ok(());
        };

        let ty = TypeInfo::of::<T>();
        let no_handler = || LoadError::NoHandler {
            path: path.clone(),
            type_name: ty.name,
        };
        let handler = self.registry.lookup(&ty).ok_or_else(no_handler)?;
        let pipeline = handler
            .build(&meta)
            .map_err(|source| LoadError::Build {
                path: path.clone(),
                source,
            })?
            .ok_or_else(no_handler)?;

        match pipeline(&raw) {
            Ok(boxed) => {
                *field = T::from_boxed(boxed).map_err(|_| LoadError::TypeMismatch {
                    path: path.clone(),
                    expected: ty.name,
                })?;
                debug!(event = "envbind.walker.field_resolved", path = %path, key = key);
            }
            Err(error) => self.record(key, ConfigError::new(key, error)),
        }
        Ok(())
    }

    /// Walk a nested struct with the path extended by `name`. Its value errors
    /// join this walk's; its setup errors abort.
    pub fn nested<B: Bind + ?Sized>(&mut self, name: &str, field: &mut B) -> Result<(), LoadError> {
        let nested = self.field_path(name);
        let parent = std::mem::replace(&mut self.path, nested);
        let result = field.bind(self);
        self.path = parent;
        result
    }

    /// A field that cannot be bound. Fine unless it asks for a key.
    pub fn skip(&mut self, name: &str, meta: &Metadata) -> Result<(), LoadError> {
        let path = self.field_path(name);
        if let Some(key) = meta.key() {
            return Err(LoadError::Unbindable {
                path,
                key: key.to_string(),
            });
        }
        debug!(event = "envbind.walker.field_skipped", path = %path);
        Ok(())
    }

    fn record(&mut self, key: &str, error: ConfigError) {
        debug!(event = "envbind.walker.value_error", key = key, error = %error);
        self.errors.push(error);
    }
}

/// Define a struct and derive its [`Bind`] impl from `#[bind(...)]` field
/// attributes.
///
/// - `#[bind(key = "NAME", ...)]` binds a leaf field; the remaining entries
///   are metadata (`default`, `required`, `key_required`, `min`, `max`,
///   `pattern`, or anything a custom handler reads).
/// - `#[bind(nested)]` walks a nested [`Bind`] struct.
/// - `#[bind(skip, ...)]` marks a field that cannot be bound; giving it a
///   `key` is a setup error.
/// - Fields without `#[bind]` are left alone.
///
/// The `#[bind]` attribute may be mixed with other field attributes such as
/// doc comments.
///
/// ```
/// envbind::bindable! {
///     #[derive(Debug, Default)]
///     pub struct Server {
///         /// Listening port.
///         #[bind(key = "PORT", default = 8080, min = 1024, max = 65535)]
///         pub port: u16,
///
///         #[bind(key = "HOST", default = "localhost")]
///         pub host: String,
///     }
/// }
///
/// let mut server = Server::default();
/// envbind::Envbind::builder()
///     .source(envbind::MapSource::from_iter([("HOST", "db.example.com")]))
///     .load(&mut server)
///     .unwrap();
/// assert_eq!(server.port, 8080);
/// assert_eq!(server.host, "db.example.com");
/// ```
#[macro_export]
macro_rules! bindable {
    (
        $(#[$struct_attr:meta])*
        $vis:vis struct $name:ident {
            $($body:tt)*
        }
    ) => {
        $crate::__bindable_fields! {
            @item [$(#[$struct_attr])* $vis struct $name]
            @name [$name]
            @fields []
            @binds []
            @attrs []
            @bind []
            $($body)*
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __bindable_fields {
    // Done: emit the struct and its Bind impl.
    (
        @item [$($item:tt)*]
        @name [$name:ident]
        @fields [$($fields:tt)*]
        @binds [$(($field:ident [$($bind:tt)*]))*]
        @attrs []
        @bind []
    ) => {
        $($item)* {
            $($fields)*
        }

        impl $crate::Bind for $name {
            #[allow(unused_variables)]
            fn bind(
                &mut self,
                walker: &mut $crate::Walker<'_>,
            ) -> ::core::result::Result<(), $crate::LoadError> {
                $($crate::__bind_field!(walker, self, $field, [$($bind)*]);)*
                ::core::result::Result::Ok(())
            }
        }
    };

    // The field's bind attribute.
    (
        @item $item:tt
        @name $name:tt
        @fields $fields:tt
        @binds $binds:tt
        @attrs $attrs:tt
        @bind []
        #[bind($($bind:tt)*)]
        $($rest:tt)*
    ) => {
        $crate::__bindable_fields! {
            @item $item
            @name $name
            @fields $fields
            @binds $binds
            @attrs $attrs
            @bind [$($bind)*]
            $($rest)*
        }
    };

    // Any other field attribute is kept on the field.
    (
        @item $item:tt
        @name $name:tt
        @fields $fields:tt
        @binds $binds:tt
        @attrs [$($attrs:tt)*]
        @bind $bind:tt
        #[$attr:meta]
        $($rest:tt)*
    ) => {
        $crate::__bindable_fields! {
            @item $item
            @name $name
            @fields $fields
            @binds $binds
            @attrs [$($attrs)* #[$attr]]
            @bind $bind
            $($rest)*
        }
    };

    // A field followed by more fields.
    (
        @item $item:tt
        @name $name:tt
        @fields [$($fields:tt)*]
        @binds [$($binds:tt)*]
        @attrs [$($attrs:tt)*]
        @bind [$($bind:tt)*]
        $field_vis:vis $field:ident : $ty:ty,
        $($rest:tt)*
    ) => {
        $crate::__bindable_fields! {
            @item $item
            @name $name
            @fields [$($fields)* $($attrs)* $field_vis $field: $ty,]
            @binds [$($binds)* ($field [$($bind)*])]
            @attrs []
            @bind []
            $($rest)*
        }
    };

    // The last field, without a trailing comma.
    (
        @item $item:tt
        @name $name:tt
        @fields [$($fields:tt)*]
        @binds [$($binds:tt)*]
        @attrs [$($attrs:tt)*]
        @bind [$($bind:tt)*]
        $field_vis:vis $field:ident : $ty:ty
    ) => {
        $crate::__bindable_fields! {
            @item $item
            @name $name
            @fields [$($fields)* $($attrs)* $field_vis $field: $ty,]
            @binds [$($binds)* ($field [$($bind)*])]
            @attrs []
            @bind []
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __bind_field {
    ($walker:ident, $this:ident, $field:ident, []) => {};
    ($walker:ident, $this:ident, $field:ident, [nested]) => {
        $walker.nested(stringify!($field), &mut $this.$field)?;
    };
    ($walker:ident, $this:ident, $field:ident, [skip]) => {
        $walker.skip(stringify!($field), &$crate::Metadata::new())?;
    };
    ($walker:ident, $this:ident, $field:ident, [skip, $($meta:tt)*]) => {
        $walker.skip(stringify!($field), &$crate::meta!($($meta)*))?;
    };
    ($walker:ident, $this:ident, $field:ident, [$($meta:tt)+]) => {
        $walker.leaf(stringify!($field), &mut $this.$field, $crate::meta!($($meta)+))?;
    };
}
