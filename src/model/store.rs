//! Trust store addressing

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which account's stores to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreScope {
    #[default]
    CurrentUser,
    LocalMachine,
}

impl StoreScope {
    pub const ALL: [StoreScope; 2] = [StoreScope::CurrentUser, StoreScope::LocalMachine];

    pub fn dir_name(self) -> &'static str {
        match self {
            StoreScope::CurrentUser => "current_user",
            StoreScope::LocalMachine => "local_machine",
        }
    }
}

/// Named store within a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreName {
    /// Personal certificates, normally with private keys
    My,
    /// Trusted root certification authorities
    Root,
}

impl StoreName {
    pub const ALL: [StoreName; 2] = [StoreName::My, StoreName::Root];

    pub fn dir_name(self) -> &'static str {
        match self {
            StoreName::My => "my",
            StoreName::Root => "root",
        }
    }
}

/// A (scope, name) pair addressing one store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreLocation {
    pub scope: StoreScope,
    pub name: StoreName,
}

impl StoreLocation {
    pub const fn new(scope: StoreScope, name: StoreName) -> Self {
        Self { scope, name }
    }

    pub const fn personal(scope: StoreScope) -> Self {
        Self::new(scope, StoreName::My)
    }

    pub const fn root(scope: StoreScope) -> Self {
        Self::new(scope, StoreName::Root)
    }

    /// Every addressable store
    pub fn all() -> impl Iterator<Item = StoreLocation> {
        StoreScope::ALL
            .into_iter()
            .flat_map(|scope| StoreName::ALL.into_iter().map(move |name| Self::new(scope, name)))
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope.dir_name(), self.name.dir_name())
    }
}
