//! Registration table for one container.
//!
//! Reads are lock-free: lookups load an immutable [`Snapshot`] through
//! `ArcSwap`. Writers serialize on a mutex, copy the snapshot, apply the
//! change and publish the new one, so a resolve in progress keeps seeing
//! the table it started with.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::debug;

use crate::contract::Contract;
use crate::error::{AlreadyRegisteredError, ResolveError, Result};
use crate::registration::Registration;

#[derive(Debug, Default, Clone)]
struct Snapshot {
    entries: HashMap<Contract, Arc<Registration>>,
    by_type: HashMap<TypeId, Vec<Contract>>,
}

/// Stores the explicit registrations of a container.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    snapshot: ArcSwap<Snapshot>,
    write: Mutex<()>,
    version: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `registration`, replacing an existing one for the same contract
    /// when `allow_override` is set.
    ///
    /// # Errors
    /// [`ResolveError::AlreadyRegistered`] when the contract is taken and
    /// overriding is not allowed.
    pub fn register(&self, registration: Arc<Registration>, allow_override: bool) -> Result<()> {
        let contract = registration.contract();
        let _guard = self.write.lock();

        let current = self.snapshot.load();
        let replaced = current.entries.contains_key(&contract);
        if replaced && !allow_override {
            return Err(ResolveError::AlreadyRegistered(AlreadyRegisteredError { contract }));
        }

        let mut next = Snapshot::clone(&current);
        if !replaced {
            next.by_type.entry(contract.type_id()).or_default().push(contract);
        }
        debug!(
            contract = %contract,
            category = ?registration.category(),
            lifetime = %registration.lifetime(),
            replaced,
            "Registered contract"
        );
        next.entries.insert(contract, registration);

        self.snapshot.store(Arc::new(next));
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn get(&self, contract: &Contract) -> Option<Arc<Registration>> {
        self.snapshot.load().entries.get(contract).cloned()
    }

    pub fn contains(&self, contract: &Contract) -> bool {
        self.snapshot.load().entries.contains_key(contract)
    }

    /// Contracts registered for `type_id`, in registration order.
    pub fn contracts_of(&self, type_id: TypeId) -> Vec<Contract> {
        self.snapshot
            .load()
            .by_type
            .get(&type_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every registration (for validation and introspection).
    pub fn all(&self) -> Vec<Arc<Registration>> {
        self.snapshot.load().entries.values().cloned().collect()
    }

    /// Incremented on every successful registration.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Database;

    fn make_reg(contract: Contract) -> Arc<Registration> {
        Arc::new(
            Registration::instance_value(contract, crate::value::Value::new(42i32))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn register_and_get() {
        let reg = Registry::new();
        let contract = Contract::of::<Database>();
        reg.register(make_reg(contract), false).unwrap();
        assert!(reg.get(&contract).is_some());
        assert!(reg.contains(&contract));
        assert_eq!(reg.version(), 1);
    }

    #[test]
    fn duplicate_fails() {
        let reg = Registry::new();
        let contract = Contract::of::<Database>();
        reg.register(make_reg(contract), false).unwrap();
        let err = reg.register(make_reg(contract), false).unwrap_err();
        assert!(matches!(err, ResolveError::AlreadyRegistered(_)));
        assert_eq!(reg.version(), 1);
    }

    #[test]
    fn duplicate_with_override_replaces() {
        let reg = Registry::new();
        let contract = Contract::of::<Database>();
        let first = make_reg(contract);
        reg.register(first.clone(), false).unwrap();
        reg.register(make_reg(contract), true).unwrap();

        assert_eq!(reg.len(), 1);
        assert!(!Arc::ptr_eq(&reg.get(&contract).unwrap(), &first));
        assert_eq!(reg.contracts_of(TypeId::of::<Database>()), vec![contract]);
    }

    #[test]
    fn names_grouped_by_type() {
        let reg = Registry::new();
        reg.register(make_reg(Contract::named::<Database>("a")), false).unwrap();
        reg.register(make_reg(Contract::of::<Database>()), false).unwrap();
        reg.register(make_reg(Contract::named::<Database>("b")), false).unwrap();
        reg.register(make_reg(Contract::of::<String>()), false).unwrap();

        let names: Vec<_> = reg
            .contracts_of(TypeId::of::<Database>())
            .iter()
            .map(Contract::name)
            .collect();
        assert_eq!(names, vec![Some("a"), None, Some("b")]);
        assert!(reg.contracts_of(TypeId::of::<u8>()).is_empty());
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let reg = Registry::new();
        let contract = Contract::of::<Database>();
        let before = reg.all();
        reg.register(make_reg(contract), false).unwrap();
        assert!(before.is_empty());
        assert_eq!(reg.all().len(), 1);
    }
}
