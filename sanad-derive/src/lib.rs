//! Derive macros for Sanad, re-exported by the `sanad` crate.

pub use sanad_macros::Injectable;
