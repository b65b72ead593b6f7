//! Bind key/value configuration into typed structs. Declare the fields, point
//! at a source, and get every problem back in one report.
//!
//! Envbind reads raw strings from a key source (environment variables by
//! default), converts them to each field's type, validates them against the
//! field's annotations, and writes them into your struct in place.
//!
//! ```
//! envbind::bindable! {
//!     #[derive(Debug, Default)]
//!     pub struct Server {
//!         #[bind(key = "PORT", default = 8080, min = 1024, max = 65535)]
//!         pub port: u16,
//!
//!         #[bind(key = "HOST", default = "localhost")]
//!         pub host: String,
//!     }
//! }
//!
//! let server: Server = envbind::Envbind::builder()
//!     .source(envbind::MapSource::from_iter([("HOST", "db.example.com")]))
//!     .load_default()?;
//! assert_eq!(server.port, 8080);
//! assert_eq!(server.host, "db.example.com");
//! # Ok::<(), envbind::LoadError>(())
//! ```
//!
//! # Annotations
//!
//! Each bound field carries a small set of named string annotations:
//!
//! | Name | Effect |
//! |---|---|
//! | `key` | Key to look up. Fields without one are not bound. |
//! | `default` | Used when the key is not configured at all. |
//! | `required` | The key must be configured with a non-empty value. |
//! | `key_required` | The key must be configured; empty is fine. |
//! | `min` / `max` | Inclusive bounds, parsed with the field's own converter. |
//! | `pattern` | Regular expression the raw value must match. |
//!
//! Presence, not emptiness, gates the default: a key configured as the empty
//! string keeps the default out. A field whose key resolves to nothing keeps
//! the value it had before the load.
//!
//! # Two kinds of errors
//!
//! A load can fail in two ways, and they never mix:
//!
//! - **Setup errors** mean the declaration or the backend is broken: a field
//!   type with no handler, an unparsable `min`, a field that cannot be bound
//!   but asks for a key, or a key source that failed. The load stops at the
//!   first one.
//! - **Value errors** mean a configured value is wrong. The walk records them
//!   per key and carries on, so [`LoadError::Invalid`] lists every bad value
//!   in field declaration order.
//!
//! ```text
//! PORT: value is below minimum 1024
//! MODE: invalid value: `turbo`
//! ```
//!
//! # Handlers and the registry
//!
//! Each field type is converted by a [`TypedHandler`]: a converter from the
//! raw string plus a wrapper that reads the field's annotations and adds
//! validation stages. Handlers are composed with the functions in
//! [`compose`] and stored, type-erased, in a [`Registry`].
//!
//! Lookup for a type tries an exact match in every layer first, from the
//! load's own layer up to the root. Only then is the root's category factory
//! for the type's [`Kind`] asked, which is how a newtype such as
//! `struct Port(u16)` binds through its [`Leaf`] impl without a handler of
//! its own. `Option<T>` and `Box<T>` fall back to `T`'s handler.
//!
//! The process-wide [`global`] registry holds the built-in catalog:
//! integers, floats, `bool`, `String`, `char`, `PathBuf`, `IpAddr`,
//! `SocketAddr`, `Duration` (with the `humantime` feature), `url::Url` (with
//! the `url` feature), and JSON for collections. Add to it with
//! [`register_global`], or keep overrides local to one load with
//! [`EnvbindBuilder::handler`].
//!
//! # Key sources
//!
//! Anything implementing [`KeySource`] can feed a load: [`EnvSource`],
//! [`MapSource`] (from pairs, a `Serialize` value, or a TOML string),
//! [`Prefixed`], a [`Chain`] of sources, or a plain closure.

pub mod compose;
pub mod error;
pub mod meta;
pub mod pipeline;

mod builder;
mod builtin;
mod env;
mod flatten;
mod handler;
mod leaf;
mod registry;
mod source;
mod types;
mod walker;

#[cfg(test)]
mod fixtures;

pub use builder::{Envbind, EnvbindBuilder, load};
pub use builtin::parse_bool;
#[cfg(feature = "humantime")]
pub use builtin::parse_duration;
pub use env::EnvSource;
pub use error::{
    BoxError, BuildError, ConfigError, ConfigErrors, LoadError, MissingKey, MissingValue,
    SourceError, ValidationError,
};
pub use flatten::FlattenError;
pub use handler::{ErasedHandler, ErasedPipeline, TypedHandler, erase};
pub use leaf::{Leaf, from_json_repr};
pub use meta::{Metadata, MetadataParseError};
pub use registry::{KindFactory, Registry, global, register_global, register_global_kind};
pub use source::{Chain, Context, KeySource, KeySourceExt, MapSource, Prefixed, chain};
pub use types::{BoxedValue, Kind, Repr, TypeInfo};
pub use walker::{Bind, Walker};
