//! # Sanad Support
//!
//! Shared utilities for the Sanad DI crates: contract labels, resolution
//! paths and "did you mean?" suggestions for error messages.

pub mod rendering;
