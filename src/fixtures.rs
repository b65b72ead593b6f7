//! Shared load targets for tests.

use crate::builder::Envbind;
use crate::error::{BoxError, LoadError, ValidationError};
use crate::leaf::Leaf;
use crate::source::MapSource;
use crate::types::{Kind, Repr};
use crate::walker::Bind;

crate::bindable! {
    #[derive(Debug, Default, PartialEq)]
    pub struct Server {
        /// The port number.
        #[bind(key = "PORT", default = 8080, min = 1024, max = 65535)]
        pub port: u16,

        /// The application host.
        #[bind(key = "HOST", default = "localhost")]
        pub host: String,

        /// Database settings.
        #[bind(nested)]
        pub database: Database,
    }
}

crate::bindable! {
    #[derive(Debug, Default, PartialEq)]
    pub struct Database {
        /// Connection string URL.
        #[bind(key = "DB_URL")]
        pub url: Option<String>,

        /// Connection pool size.
        #[bind(key = "DB_POOL", default = 5, min = 1)]
        pub pool_size: u32,
    }
}

// -- Fixture for multi-error tests --------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Fast,
    Slow,
}

impl Leaf for Mode {
    const KIND: Kind = Kind::String;

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        match String::from_repr(repr)?.as_str() {
            "fast" => Ok(Mode::Fast),
            "slow" => Ok(Mode::Slow),
            other => Err(ValidationError::InvalidChoice(other.to_string()).into()),
        }
    }
}

crate::bindable! {
    #[derive(Debug, Default)]
    pub struct Tuning {
        #[bind(key = "RETRIES", default = 3)]
        pub retries: u32,

        #[bind(key = "RATIO", default = 0.5, min = "0.0", max = "1.0")]
        pub ratio: f64,

        #[bind(key = "MODE", default = "fast")]
        pub mode: Mode,

        #[bind(key = "NAME", pattern = "^[a-z]+$")]
        pub name: String,
    }
}

// -- Fixture for category fallback tests --------------------------------------

/// A string newtype with no exact handler.
#[derive(Debug, Default, PartialEq)]
pub struct Level(pub String);

impl Leaf for Level {
    const KIND: Kind = Kind::String;

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        String::from_repr(repr).map(Level)
    }
}

/// Load `target` from an in-memory source with the global registry.
pub fn load_pairs<B: Bind + ?Sized>(target: &mut B, pairs: &[(&str, &str)]) -> Result<(), LoadError> {
    Envbind::builder()
        .source(pairs.iter().copied().collect::<MapSource>())
        .load(target)
}

#[test]
fn server_loads_defaults() {
    let server: Server = Envbind::builder()
        .source(MapSource::new())
        .load_default()
        .unwrap();
    assert_eq!(server.host, "localhost");
    assert_eq!(server.port, 8080);
    assert_eq!(server.database.url, None);
    assert_eq!(server.database.pool_size, 5);
}

#[test]
fn tuning_loads_defaults() {
    let mut tuning = Tuning::default();
    load_pairs(&mut tuning, &[]).unwrap();
    assert_eq!(tuning.retries, 3);
    assert_eq!(tuning.ratio, 0.5);
    assert_eq!(tuning.mode, Mode::Fast);
    assert_eq!(tuning.name, "");
}

#[test]
fn tuning_mode_by_name() {
    let mut tuning = Tuning::default();
    load_pairs(&mut tuning, &[("MODE", "slow")]).unwrap();
    assert_eq!(tuning.mode, Mode::Slow);
}
