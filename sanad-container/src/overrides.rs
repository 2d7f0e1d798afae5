//! Resolve-time overrides.
//!
//! An [`Override`] replaces the value of a constructor parameter, field,
//! property or dependency for one resolve call, at any depth of the graph.
//! When several overrides match, the newest exact match wins; without an
//! exact match, the newest compatible one is used.

use std::any::TypeId;
use std::fmt;

use crate::contract::Contract;
use crate::injection::InjectionData;

/// How well an override fits an injection site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchRank {
    NoMatch,
    Compatible,
    ExactMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionSite {
    Parameter,
    Field,
    Property,
}

/// The member a value is being resolved for.
#[derive(Debug, Clone, Copy)]
pub struct MemberTarget {
    /// Type that declares the member.
    pub declaring: Contract,
    pub site: InjectionSite,
    pub name: &'static str,
    /// Contract the member imports.
    pub contract: Contract,
}

#[derive(Debug, Clone, Copy)]
enum Matcher {
    Parameter {
        name: &'static str,
        type_id: Option<TypeId>,
    },
    Field(&'static str),
    Property(&'static str),
    Dependency(Contract),
}

#[derive(Clone)]
pub struct Override {
    matcher: Matcher,
    on_type: Option<TypeId>,
    data: InjectionData,
}

impl Override {
    pub fn parameter(name: &'static str, data: impl Into<InjectionData>) -> Self {
        Self::new(Matcher::Parameter { name, type_id: None }, data)
    }

    pub fn field(name: &'static str, data: impl Into<InjectionData>) -> Self {
        Self::new(Matcher::Field(name), data)
    }

    pub fn property(name: &'static str, data: impl Into<InjectionData>) -> Self {
        Self::new(Matcher::Property(name), data)
    }

    /// Replaces every unnamed or named import of `T`.
    pub fn dependency<T: ?Sized + 'static>(data: impl Into<InjectionData>) -> Self {
        Self::contract(Contract::of::<T>(), data)
    }

    pub fn contract(contract: Contract, data: impl Into<InjectionData>) -> Self {
        Self::new(Matcher::Dependency(contract), data)
    }

    fn new(matcher: Matcher, data: impl Into<InjectionData>) -> Self {
        Self {
            matcher,
            on_type: None,
            data: data.into(),
        }
    }

    /// Restricts a parameter override to parameters importing `T`.
    pub fn of_type<T: ?Sized + 'static>(mut self) -> Self {
        if let Matcher::Parameter { name, .. } = self.matcher {
            self.matcher = Matcher::Parameter {
                name,
                type_id: Some(TypeId::of::<T>()),
            };
        }
        self
    }

    /// Applies only to members declared by `T`.
    pub fn on<T: ?Sized + 'static>(mut self) -> Self {
        self.on_type = Some(TypeId::of::<T>());
        self
    }

    pub fn data(&self) -> &InjectionData {
        &self.data
    }

    pub fn rank(&self, target: &MemberTarget) -> MatchRank {
        if self
            .on_type
            .is_some_and(|declaring| declaring != target.declaring.type_id())
        {
            return MatchRank::NoMatch;
        }

        match self.matcher {
            Matcher::Parameter { name, type_id } => {
                if target.site != InjectionSite::Parameter || target.name != name {
                    MatchRank::NoMatch
                } else if type_id.is_some_and(|t| t != target.contract.type_id()) {
                    MatchRank::NoMatch
                } else {
                    MatchRank::ExactMatch
                }
            }
            Matcher::Field(name) if target.site == InjectionSite::Field && target.name == name => {
                MatchRank::ExactMatch
            }
            Matcher::Property(name)
                if target.site == InjectionSite::Property && target.name == name =>
            {
                MatchRank::ExactMatch
            }
            Matcher::Dependency(contract) if contract == target.contract => MatchRank::ExactMatch,
            Matcher::Dependency(contract)
                if contract.name().is_none() && contract.same_type(&target.contract) =>
            {
                MatchRank::Compatible
            }
            _ => MatchRank::NoMatch,
        }
    }
}

impl fmt::Debug for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Override")
            .field("matcher", &self.matcher)
            .field("restricted", &self.on_type.is_some())
            .field("data", &self.data)
            .finish()
    }
}

/// Newest exact match, else newest compatible match.
pub(crate) fn find_override<'o>(overrides: &'o [Override], target: &MemberTarget) -> Option<&'o Override> {
    let mut compatible = None;
    for candidate in overrides.iter().rev() {
        match candidate.rank(target) {
            MatchRank::ExactMatch => return Some(candidate),
            MatchRank::Compatible if compatible.is_none() => compatible = Some(candidate),
            _ => {}
        }
    }
    compatible
}
