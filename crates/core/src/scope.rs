//! Configuration scopes and their precedence.
//!
//! Responsibilities:
//! - Define the `Scope` enumeration in declaration order (lowest to highest precedence).
//! - Provide `ScopeSet` for restricting lookups to a subset of scopes.
//! - Provide `ScopeOrder`, the explicit precedence list used by every resolution.
//!
//! Invariants:
//! - A `ScopeOrder` contains every scope exactly once.
//! - `ScopeOrder::default()` is the reverse of declaration order (Policy first).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Where a configuration layer comes from, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Product,
    Organization,
    Cloud,
    Cluster,
    Host,
    Application,
    User,
    Session,
    Runtime,
    Policy,
}

impl Scope {
    /// All scopes, lowest precedence first.
    pub const ALL: [Scope; 10] = [
        Scope::Product,
        Scope::Organization,
        Scope::Cloud,
        Scope::Cluster,
        Scope::Host,
        Scope::Application,
        Scope::User,
        Scope::Session,
        Scope::Runtime,
        Scope::Policy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Product => "product",
            Scope::Organization => "organization",
            Scope::Cloud => "cloud",
            Scope::Cluster => "cluster",
            Scope::Host => "host",
            Scope::Application => "application",
            Scope::User => "user",
            Scope::Session => "session",
            Scope::Runtime => "runtime",
            Scope::Policy => "policy",
        }
    }

    fn flag(self) -> ScopeSet {
        match self {
            Scope::Product => ScopeSet::PRODUCT,
            Scope::Organization => ScopeSet::ORGANIZATION,
            Scope::Cloud => ScopeSet::CLOUD,
            Scope::Cluster => ScopeSet::CLUSTER,
            Scope::Host => ScopeSet::HOST,
            Scope::Application => ScopeSet::APPLICATION,
            Scope::User => ScopeSet::USER,
            Scope::Session => ScopeSet::SESSION,
            Scope::Runtime => ScopeSet::RUNTIME,
            Scope::Policy => ScopeSet::POLICY,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::InvalidScope(s.to_string()))
    }
}

bitflags! {
    /// A subset of scopes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScopeSet: u16 {
        const PRODUCT = 1 << 0;
        const ORGANIZATION = 1 << 1;
        const CLOUD = 1 << 2;
        const CLUSTER = 1 << 3;
        const HOST = 1 << 4;
        const APPLICATION = 1 << 5;
        const USER = 1 << 6;
        const SESSION = 1 << 7;
        const RUNTIME = 1 << 8;
        const POLICY = 1 << 9;
    }
}

impl ScopeSet {
    /// Every scope except `Runtime`; the default set polled for changes.
    pub fn persistent() -> Self {
        ScopeSet::all().difference(ScopeSet::RUNTIME)
    }

    pub fn has(self, scope: Scope) -> bool {
        self.contains(scope.flag())
    }

    /// Scopes in this set, lowest precedence first.
    pub fn scopes(self) -> impl Iterator<Item = Scope> {
        Scope::ALL.into_iter().filter(move |scope| self.has(*scope))
    }
}

impl From<Scope> for ScopeSet {
    fn from(scope: Scope) -> Self {
        scope.flag()
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ScopeSet::empty(), |set, scope| set | scope.flag())
    }
}

/// Explicit scope precedence, highest precedence first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeOrder(Arc<[Scope]>);

impl ScopeOrder {
    /// Build an order from a highest-first list naming every scope exactly once.
    pub fn new(order: Vec<Scope>) -> Result<Self, ConfigError> {
        let seen: ScopeSet = order.iter().copied().collect();
        if order.len() != Scope::ALL.len() || seen != ScopeSet::all() {
            return Err(ConfigError::InvalidSetting {
                var: "scope_order".to_string(),
                message: "must name every scope exactly once".to_string(),
            });
        }
        Ok(Self(order.into()))
    }

    /// Scopes, highest precedence first.
    pub fn scopes(&self) -> &[Scope] {
        &self.0
    }

    /// Position of `scope`; 0 is the highest precedence.
    pub fn rank(&self, scope: Scope) -> usize {
        self.0
            .iter()
            .position(|candidate| *candidate == scope)
            .unwrap_or(self.0.len())
    }

    /// Orders `a` before `b` when `a` takes precedence.
    pub fn compare(&self, a: Scope, b: Scope) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }
}

impl Default for ScopeOrder {
    fn default() -> Self {
        let mut scopes = Scope::ALL.to_vec();
        scopes.reverse();
        Self(scopes.into())
    }
}
