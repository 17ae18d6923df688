//! Collaborator Registries
//!
//! The operator registry answers which operators exist and what Bitcoin key
//! each one signs with; the application registry answers which applications
//! a pod may be delegated to. Both live outside the pod protocol, so the
//! manager only sees these traits.

use std::collections::{HashMap, HashSet};

use crate::types::AccountId;

/// Operator stake/key registry
#[cfg_attr(test, mockall::automock)]
pub trait OperatorRegistry: Send + Sync {
    fn is_operator_registered(&self, operator: &AccountId) -> bool;

    /// Compressed secp256k1 key the operator contributes to custody scripts
    fn operator_public_key(&self, operator: &AccountId) -> Option<Vec<u8>>;
}

/// Registry of applications pods may be delegated to
#[cfg_attr(test, mockall::automock)]
pub trait AppRegistry: Send + Sync {
    fn is_application_registered(&self, app: &AccountId) -> bool;
}

/// Fixed operator set
#[derive(Debug, Clone, Default)]
pub struct StaticOperatorRegistry {
    keys: HashMap<AccountId, Vec<u8>>,
}

impl StaticOperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operator(mut self, operator: AccountId, btc_public_key: Vec<u8>) -> Self {
        self.keys.insert(operator, btc_public_key);
        self
    }

    pub fn register(&mut self, operator: AccountId, btc_public_key: Vec<u8>) {
        self.keys.insert(operator, btc_public_key);
    }

    pub fn deregister(&mut self, operator: &AccountId) -> bool {
        self.keys.remove(operator).is_some()
    }
}

impl OperatorRegistry for StaticOperatorRegistry {
    fn is_operator_registered(&self, operator: &AccountId) -> bool {
        self.keys.contains_key(operator)
    }

    fn operator_public_key(&self, operator: &AccountId) -> Option<Vec<u8>> {
        self.keys.get(operator).cloned()
    }
}

/// Fixed application set
#[derive(Debug, Clone, Default)]
pub struct StaticAppRegistry {
    apps: HashSet<AccountId>,
}

impl StaticAppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app(mut self, app: AccountId) -> Self {
        self.apps.insert(app);
        self
    }

    pub fn register(&mut self, app: AccountId) {
        self.apps.insert(app);
    }
}

impl AppRegistry for StaticAppRegistry {
    fn is_application_registered(&self, app: &AccountId) -> bool {
        self.apps.contains(app)
    }
}
