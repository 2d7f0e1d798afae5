//! Error types for container operations.
//!
//! Every error carries the [`Contract`] it concerns. Errors propagate through
//! nested resolutions unchanged; only failures raised by user code
//! (constructors, factories, injection methods) are wrapped, once, in
//! [`ResolveError::Captured`], which keeps the original error as its source.

use std::fmt;
use std::time::Duration;

use sanad_support::rendering::render_path;

use crate::contract::Contract;
use crate::lifetime::Lifetime;
use crate::reflect::ArgumentError;

/// Boxed user error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for all container operations.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Requested contract has no registration and cannot be auto-built.
    #[error("{}", .0)]
    NotRegistered(NotRegisteredError),

    /// No constructor fits the configured or available parameter shape.
    #[error("No suitable constructor for {contract}: {reason}")]
    ConstructorNotFound { contract: Contract, reason: String },

    /// A contract re-entered its own resolution.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// The registration cannot be turned into a pipeline.
    #[error("Invalid registration for {contract}: {reason}")]
    InvalidRegistration { contract: Contract, reason: String },

    /// A synchronized lifetime slot was not released in time.
    #[error("Timed out after {waited:?} waiting for another thread to build {contract}")]
    Timeout { contract: Contract, waited: Duration },

    /// User code failed while building `contract`.
    #[error("Failed to construct {contract}: {source}")]
    Captured {
        contract: Contract,
        #[source]
        source: BoxError,
    },

    /// The registration exists but cannot produce this particular type.
    #[error("Type could not be loaded for {contract}: {reason}")]
    TypeLoad { contract: Contract, reason: String },

    /// A resolved or supplied value has the wrong type.
    #[error("Type mismatch for {contract}: expected {expected}, found {found}")]
    TypeMismatch {
        contract: Contract,
        expected: &'static str,
        found: &'static str,
    },

    /// Dependency was already registered and overriding is disabled.
    #[error("{}", .0)]
    AlreadyRegistered(AlreadyRegisteredError),

    /// A long-lived registration captures a shorter-lived dependency.
    #[error("{}", .0)]
    LifetimeMismatch(LifetimeMismatchError),

    /// A deferred resolver outlived the container that created it.
    #[error("The container that created the deferred resolver for {contract} has been dropped")]
    ContainerDropped { contract: Contract },
}

impl ResolveError {
    /// Wraps a user error raised while building `contract`.
    pub fn captured(contract: Contract, source: impl Into<BoxError>) -> Self {
        ResolveError::Captured {
            contract,
            source: source.into(),
        }
    }

    pub fn type_load(contract: Contract, reason: impl Into<String>) -> Self {
        ResolveError::TypeLoad {
            contract,
            reason: reason.into(),
        }
    }

    pub fn invalid(contract: Contract, reason: impl Into<String>) -> Self {
        ResolveError::InvalidRegistration {
            contract,
            reason: reason.into(),
        }
    }

    /// Classifies an error returned by user code building `contract`.
    ///
    /// Container errors raised inside a factory or constructor pass through
    /// unchanged; argument conversion failures become
    /// [`ResolveError::TypeMismatch`]; everything else is captured.
    pub fn from_user(contract: Contract, error: BoxError) -> Self {
        let error = match error.downcast::<ResolveError>() {
            Ok(inner) => return *inner,
            Err(error) => error,
        };
        match error.downcast::<ArgumentError>() {
            Ok(argument) => match *argument {
                ArgumentError::Mismatch {
                    expected, found, ..
                } => ResolveError::TypeMismatch {
                    contract,
                    expected,
                    found,
                },
                other => ResolveError::invalid(contract, other.to_string()),
            },
            Err(source) => ResolveError::Captured { contract, source },
        }
    }

    /// The contract the error is about.
    pub fn contract(&self) -> &Contract {
        match self {
            ResolveError::NotRegistered(e) => &e.requested,
            ResolveError::CircularDependency(e) => e.chain.last().unwrap_or(&e.root),
            ResolveError::AlreadyRegistered(e) => &e.contract,
            ResolveError::LifetimeMismatch(e) => &e.consumer,
            ResolveError::ConstructorNotFound { contract, .. }
            | ResolveError::InvalidRegistration { contract, .. }
            | ResolveError::Timeout { contract, .. }
            | ResolveError::Captured { contract, .. }
            | ResolveError::TypeLoad { contract, .. }
            | ResolveError::TypeMismatch { contract, .. }
            | ResolveError::ContainerDropped { contract } => contract,
        }
    }

    /// `true` when the root cause is a type that could not be loaded.
    pub fn is_type_load(&self) -> bool {
        match self {
            ResolveError::TypeLoad { .. } => true,
            ResolveError::Captured { source, .. } => source
                .downcast_ref::<ResolveError>()
                .is_some_and(ResolveError::is_type_load),
            _ => false,
        }
    }

    /// `true` for failures that a declared default may replace.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            ResolveError::NotRegistered(_)
                | ResolveError::ConstructorNotFound { .. }
                | ResolveError::TypeLoad { .. }
        )
    }

    /// The user error behind a [`ResolveError::Captured`].
    pub fn captured_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            ResolveError::Captured { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Error when a dependency was not registered.
#[derive(Debug)]
pub struct NotRegisteredError {
    /// The dependency that was requested
    pub requested: Contract,
    /// What required this dependency (if known)
    pub required_by: Option<Contract>,
    /// Similar registered contracts, for "did you mean?" hints
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dependency not registered: {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: register {} or derive Injectable for a concrete type",
            self.requested.short_name()
        )
    }
}

/// Error when a circular dependency is detected.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// Contract the outer resolve call started from.
    pub root: Contract,
    /// The cycle, first and last element equal. Example: `[A, B, C, A]`
    pub chain: Vec<Contract>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected:\n  ")?;
        write!(f, "{}", render_path(self.chain.iter().map(Contract::short_name)))?;
        write!(
            f,
            "\n  Hint: break the cycle with Lazy<T> or Func<T>, or restructure the dependencies"
        )
    }
}

/// Error when a registration captures a shorter-lived dependency.
#[derive(Debug)]
pub struct LifetimeMismatchError {
    pub consumer: Contract,
    pub consumer_lifetime: Lifetime,
    pub dependency: Contract,
    pub dependency_lifetime: Lifetime,
}

impl fmt::Display for LifetimeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lifetime mismatch: {} ({}) depends on {} ({})",
            self.consumer, self.consumer_lifetime, self.dependency, self.dependency_lifetime,
        )?;
        write!(
            f,
            "\n  Hint: the {} value would keep one {} instance alive for its whole lifetime",
            self.consumer_lifetime, self.dependency_lifetime,
        )
    }
}

/// Error when registering a contract that already exists.
#[derive(Debug)]
pub struct AlreadyRegisteredError {
    pub contract: Contract,
}

impl fmt::Display for AlreadyRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dependency already registered: {}", self.contract)?;
        write!(
            f,
            "\n  Hint: enable allow_override in the container options to replace registrations"
        )
    }
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, ResolveError>;
