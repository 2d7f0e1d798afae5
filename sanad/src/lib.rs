//! # Sanad: Dependency Injection Container for Rust
//!
//! Registrations map contracts (a type plus an optional name) to a way of
//! producing values. Every resolve runs a cached, staged pipeline built
//! per registration, so lifetimes, mappings, injection members and custom
//! strategies compose without touching the resolve path.
//!
//! ```rust
//! use std::sync::Arc;
//! use sanad::prelude::*;
//! use sanad::Injectable;
//!
//! struct Config {
//!     url: String,
//! }
//!
//! #[derive(Injectable)]
//! struct Database {
//!     config: Arc<Config>,
//! }
//!
//! let container = Container::builder()
//!     .instance(Config { url: "postgres://localhost".into() })
//!     .singleton::<Database>()
//!     .build()
//!     .unwrap();
//!
//! let db = container.resolve::<Database>().unwrap();
//! assert_eq!(db.config.url, "postgres://localhost");
//! assert!(Arc::ptr_eq(&db, &container.resolve::<Database>().unwrap()));
//! ```

pub use sanad_container::*;
pub use sanad_derive::*;
pub use sanad_support::*;
