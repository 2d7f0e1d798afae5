//! Resolution contracts.
//!
//! A [`Contract`] identifies what is being requested from the container:
//! a Rust type ([`TypeId`]) and an optional registration name. Contracts are
//! used as the lookup key everywhere (registry, pipeline caches, per-resolve
//! caches, cycle detection), so their hash is computed once at creation.

use std::any::{TypeId, type_name};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use sanad_support::rendering::contract_label;

/// Identifies a dependency: a type plus an optional name.
///
/// # Examples
/// ```
/// use sanad_container::contract::Contract;
///
/// let key = Contract::of::<String>();
/// assert_eq!(key.type_name(), "alloc::string::String");
/// assert_eq!(key.name(), None);
///
/// let key = Contract::named::<String>("database_url");
/// assert_eq!(key.name(), Some("database_url"));
/// ```
#[derive(Clone, Copy)]
pub struct Contract {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<&'static str>,
    type_hash: u64,
    hash: u64,
}

impl Contract {
    /// Creates an unnamed contract for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_raw(TypeId::of::<T>(), type_name::<T>(), None)
    }

    /// Creates a named contract for type `T`.
    ///
    /// ```
    /// use sanad_container::contract::Contract;
    ///
    /// let primary = Contract::named::<String>("primary_db");
    /// let replica = Contract::named::<String>("replica_db");
    /// assert_ne!(primary, replica);
    /// ```
    #[inline]
    pub fn named<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::from_raw(TypeId::of::<T>(), type_name::<T>(), Some(name))
    }

    /// Creates a contract from a raw [`TypeId`] and type name.
    ///
    /// Prefer [`Contract::of`] when the type is known statically.
    pub fn from_raw(type_id: TypeId, type_name: &'static str, name: Option<&'static str>) -> Self {
        let type_hash = hash_of(&type_id);
        Self {
            type_id,
            type_name,
            name,
            type_hash,
            hash: combine(type_hash, name),
        }
    }

    /// Same type, different name. Reuses the cached type hash.
    #[inline]
    pub fn with_name(&self, name: Option<&'static str>) -> Self {
        Self {
            name,
            hash: combine(self.type_hash, name),
            ..*self
        }
    }

    /// Same type, no name.
    #[inline]
    pub fn without_name(&self) -> Self {
        self.with_name(None)
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full type name, as reported by [`std::any::type_name`].
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// `true` when both contracts refer to the same type, ignoring names.
    #[inline]
    pub fn same_type(&self, other: &Contract) -> bool {
        self.type_id == other.type_id
    }

    /// Precomputed hash of type and name.
    #[inline]
    pub fn hash_code(&self) -> u64 {
        self.hash
    }

    /// Short, path-free rendering used in error messages.
    pub fn short_name(&self) -> String {
        contract_label(self.type_name, self.name)
    }
}

fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    // DefaultHasher::new() uses fixed keys, so hashes are stable within a process.
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn combine(type_hash: u64, name: Option<&str>) -> u64 {
    match name {
        None => type_hash,
        Some(name) => type_hash.rotate_left(5) ^ hash_of(name).wrapping_mul(0x9E37_79B9_7F4A_7C15),
    }
}

impl PartialEq for Contract {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for Contract {}

impl Hash for Contract {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "Contract({}, name={:?})", self.type_name, name),
            None => write!(f, "Contract({})", self.type_name),
        }
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "{} (name={:?})", self.type_name, name),
            None => write!(f, "{}", self.type_name),
        }
    }
}
