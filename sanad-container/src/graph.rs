//! Dependency graph validation.
//!
//! Validates the registrations visible from a container:
//! - Detects circular dependencies
//! - Checks that all required dependencies are registered or auto-buildable
//! - Flags lifetime mismatches (strict mode fails, otherwise warns)
//!
//! Runs from [`Container::validate`](crate::Container::validate) and, with
//! `validate_on_build`, during [`ContainerBuilder::build`](crate::ContainerBuilder::build).
//! Optional imports are followed for cycles but may be missing. Shapes are
//! not followed: `Lazy`/`Func` resolve on demand and collections may
//! be empty.

use std::collections::{HashMap, HashSet};

use sanad_support::rendering::suggest_contracts;
use tracing::{debug, instrument, warn};

use crate::contract::Contract;
use crate::error::{
    CircularDependencyError, LifetimeMismatchError, NotRegisteredError, ResolveError, Result,
};
use crate::lifetime::Lifetime;

/// An import of one registration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Edge {
    pub contract: Contract,
    /// `false` for optional imports, which may be missing.
    pub required: bool,
}

impl Edge {
    pub fn required(contract: Contract) -> Self {
        Self {
            contract,
            required: true,
        }
    }
}

/// A registration as seen by validation.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub contract: Contract,
    pub lifetime: Lifetime,
    pub edges: Vec<Edge>,
}

/// Depth-first walk with a path set for cycle detection.
pub(crate) struct GraphValidator {
    nodes: HashMap<Contract, Node>,
    strict_lifetimes: bool,
    visiting: HashSet<Contract>,
    validated: HashSet<Contract>,
    path: Vec<Contract>,
}

impl GraphValidator {
    pub fn new(nodes: HashMap<Contract, Node>, strict_lifetimes: bool) -> Self {
        Self {
            nodes,
            strict_lifetimes,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// # Errors
    /// - [`ResolveError::CircularDependency`]: cycle detected
    /// - [`ResolveError::NotRegistered`]: missing required dependency
    /// - [`ResolveError::LifetimeMismatch`]: in strict mode only
    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(&mut self) -> Result<()> {
        let mut contracts: Vec<Contract> = self.nodes.keys().copied().collect();
        // Deterministic reports regardless of hash order.
        contracts.sort_by_key(|contract| contract.to_string());

        debug!(registrations = contracts.len(), "Starting dependency graph validation");

        for contract in contracts {
            if !self.validated.contains(&contract) {
                self.validate_contract(&contract)?;
            }
        }

        debug!("Dependency graph validation passed ✓");
        Ok(())
    }

    fn validate_contract(&mut self, contract: &Contract) -> Result<()> {
        if self.validated.contains(contract) {
            return Ok(());
        }

        if self.visiting.contains(contract) {
            let start = self.path.iter().position(|c| c == contract).unwrap_or(0);
            let mut chain: Vec<Contract> = self.path[start..].to_vec();
            chain.push(*contract);

            warn!(cycle = ?chain, "Circular dependency detected");
            let root = self.path.first().copied().unwrap_or(*contract);
            return Err(ResolveError::CircularDependency(CircularDependencyError { root, chain }));
        }

        let node = self.nodes.get(contract).cloned().ok_or_else(|| {
            ResolveError::NotRegistered(NotRegisteredError {
                requested: *contract,
                required_by: self.path.last().copied(),
                suggestions: self.similar(contract),
            })
        })?;

        self.visiting.insert(*contract);
        self.path.push(*contract);

        for edge in &node.edges {
            match self.nodes.get(&edge.contract) {
                Some(dependency) => {
                    if edge.required {
                        self.check_lifetimes(&node, dependency)?;
                    }
                    let dependency = dependency.contract;
                    self.validate_contract(&dependency)?;
                }
                None if edge.required => self.validate_contract(&edge.contract)?,
                None => {}
            }
        }

        self.path.pop();
        self.visiting.remove(contract);
        self.validated.insert(*contract);
        Ok(())
    }

    /// A dependency must not live shorter than its consumer:
    /// `Singleton > Hierarchical > PerThread > PerResolve > Transient`.
    fn check_lifetimes(&self, consumer: &Node, dependency: &Node) -> Result<()> {
        if consumer.lifetime.rank() <= dependency.lifetime.rank() {
            return Ok(());
        }

        warn!(
            consumer = %consumer.contract,
            consumer_lifetime = %consumer.lifetime,
            dependency = %dependency.contract,
            dependency_lifetime = %dependency.lifetime,
            "Lifetime mismatch detected"
        );
        if !self.strict_lifetimes {
            return Ok(());
        }

        Err(ResolveError::LifetimeMismatch(LifetimeMismatchError {
            consumer: consumer.contract,
            consumer_lifetime: consumer.lifetime,
            dependency: dependency.contract,
            dependency_lifetime: dependency.lifetime,
        }))
    }

    fn similar(&self, target: &Contract) -> Vec<String> {
        let labels: Vec<String> = self.nodes.keys().map(Contract::short_name).collect();
        let registered: Vec<&str> = labels.iter().map(String::as_str).collect();
        suggest_contracts(&target.short_name(), &registered, 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(contract: Contract, lifetime: Lifetime, deps: Vec<Contract>) -> Node {
        Node {
            contract,
            lifetime,
            edges: deps.into_iter().map(Edge::required).collect(),
        }
    }

    fn make_graph(nodes: Vec<Node>) -> HashMap<Contract, Node> {
        nodes.into_iter().map(|n| (n.contract, n)).collect()
    }

    struct Database;
    struct UserRepo;
    struct UserService;

    #[test]
    fn valid_simple_graph() {
        let graph = make_graph(vec![
            node(Contract::of::<Database>(), Lifetime::Singleton, vec![]),
            node(
                Contract::of::<UserRepo>(),
                Lifetime::Singleton,
                vec![Contract::of::<Database>()],
            ),
            node(
                Contract::of::<UserService>(),
                Lifetime::Hierarchical,
                vec![Contract::of::<UserRepo>()],
            ),
        ]);

        assert!(GraphValidator::new(graph, true).validate().is_ok());
    }

    #[test]
    fn detect_circular_dependency() {
        struct A;
        struct B;
        struct C;

        let graph = make_graph(vec![
            node(Contract::of::<A>(), Lifetime::Transient, vec![Contract::of::<B>()]),
            node(Contract::of::<B>(), Lifetime::Transient, vec![Contract::of::<C>()]),
            node(Contract::of::<C>(), Lifetime::Transient, vec![Contract::of::<A>()]),
        ]);

        match GraphValidator::new(graph, false).validate() {
            Err(ResolveError::CircularDependency(err)) => {
                assert_eq!(err.chain.len(), 4);
                assert_eq!(err.chain.first(), err.chain.last());
            }
            other => panic!("Expected CircularDependency, got: {:?}", other.err()),
        }
    }

    #[test]
    fn detect_self_dependency() {
        struct A;

        let graph = make_graph(vec![node(
            Contract::of::<A>(),
            Lifetime::Transient,
            vec![Contract::of::<A>()],
        )]);

        assert!(GraphValidator::new(graph, false).validate().is_err());
    }

    #[test]
    fn detect_missing_dependency() {
        struct A;
        struct B;

        let graph = make_graph(vec![node(
            Contract::of::<A>(),
            Lifetime::Transient,
            vec![Contract::of::<B>()],
        )]);

        match GraphValidator::new(graph, false).validate() {
            Err(ResolveError::NotRegistered(err)) => {
                assert!(err.requested.type_name().contains("B"));
                assert_eq!(err.required_by, Some(Contract::of::<A>()));
            }
            other => panic!("Expected NotRegistered, got: {:?}", other.err()),
        }
    }

    #[test]
    fn optional_edge_may_be_missing() {
        struct A;
        struct B;

        let mut a = node(Contract::of::<A>(), Lifetime::Transient, vec![]);
        a.edges.push(Edge {
            contract: Contract::of::<B>(),
            required: false,
        });

        assert!(GraphValidator::new(make_graph(vec![a]), true).validate().is_ok());
    }

    #[test]
    fn detect_lifetime_mismatch_in_strict_mode() {
        let graph = || {
            make_graph(vec![
                node(Contract::of::<Database>(), Lifetime::Transient, vec![]),
                node(
                    Contract::of::<UserService>(),
                    Lifetime::Singleton,
                    vec![Contract::of::<Database>()],
                ),
            ])
        };

        match GraphValidator::new(graph(), true).validate() {
            Err(ResolveError::LifetimeMismatch(err)) => {
                assert_eq!(err.consumer_lifetime, Lifetime::Singleton);
                assert_eq!(err.dependency_lifetime, Lifetime::Transient);
            }
            other => panic!("Expected LifetimeMismatch, got: {:?}", other.err()),
        }

        assert!(GraphValidator::new(graph(), false).validate().is_ok());
    }

    #[test]
    fn transient_depends_on_singleton_ok() {
        let graph = make_graph(vec![
            node(Contract::of::<Database>(), Lifetime::Singleton, vec![]),
            node(
                Contract::of::<UserService>(),
                Lifetime::Transient,
                vec![Contract::of::<Database>()],
            ),
        ]);

        assert!(GraphValidator::new(graph, true).validate().is_ok());
    }

    #[test]
    fn diamond_dependency_ok() {
        //     A
        //    / \
        //   B   C
        //    \ /
        //     D
        struct A;
        struct B;
        struct C;
        struct D;

        let graph = make_graph(vec![
            node(Contract::of::<D>(), Lifetime::Singleton, vec![]),
            node(Contract::of::<B>(), Lifetime::Singleton, vec![Contract::of::<D>()]),
            node(Contract::of::<C>(), Lifetime::Singleton, vec![Contract::of::<D>()]),
            node(
                Contract::of::<A>(),
                Lifetime::Singleton,
                vec![Contract::of::<B>(), Contract::of::<C>()],
            ),
        ]);

        assert!(GraphValidator::new(graph, true).validate().is_ok());
    }

    #[test]
    fn named_contracts_are_distinct_nodes() {
        let graph = make_graph(vec![
            node(Contract::named::<Database>("primary"), Lifetime::Singleton, vec![]),
            node(
                Contract::of::<UserRepo>(),
                Lifetime::Transient,
                vec![Contract::of::<Database>()],
            ),
        ]);

        match GraphValidator::new(graph, false).validate() {
            Err(ResolveError::NotRegistered(err)) => {
                assert_eq!(err.requested, Contract::of::<Database>());
                assert!(!err.suggestions.is_empty());
            }
            other => panic!("Expected NotRegistered, got: {:?}", other.err()),
        }
    }
}
