use bulwark_types::{PolicyDefaults, PolicyName, ResilienceConfig};
use std::collections::HashMap;
use std::sync::Arc;

use super::{OperationKind, RetryPolicy};

/// Static endpoint → policy routing.
///
/// One shared instance per preset; endpoints routed to the same name get
/// the same `Arc`. Unmapped endpoints use STANDARD.
#[derive(Debug, Clone)]
pub struct RetryPolicyTable {
    routes: HashMap<String, PolicyName>,
    aggressive: Arc<RetryPolicy>,
    standard: Arc<RetryPolicy>,
    cautious: Arc<RetryPolicy>,
    none: Arc<RetryPolicy>,
}

impl Default for RetryPolicyTable {
    fn default() -> Self {
        Self::new(&PolicyDefaults::default())
    }
}

impl RetryPolicyTable {
    pub fn new(defaults: &PolicyDefaults) -> Self {
        Self {
            routes: HashMap::new(),
            aggressive: Arc::new(RetryPolicy::aggressive(defaults)),
            standard: Arc::new(RetryPolicy::standard(defaults)),
            cautious: Arc::new(RetryPolicy::cautious(defaults)),
            none: Arc::new(RetryPolicy::none()),
        }
    }

    pub fn from_config(config: &ResilienceConfig) -> Self {
        let mut table = Self::new(&config.policy);
        table.routes.clone_from(&config.endpoint_policies);
        table
    }

    #[must_use]
    pub fn route(mut self, endpoint: impl Into<String>, name: PolicyName) -> Self {
        self.routes.insert(endpoint.into(), name);
        self
    }

    /// Replace the shared instance for `policy.name`.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        let slot = match policy.name {
            PolicyName::Aggressive => &mut self.aggressive,
            PolicyName::Standard => &mut self.standard,
            PolicyName::Cautious => &mut self.cautious,
            PolicyName::None => &mut self.none,
        };
        *slot = Arc::new(policy);
        self
    }

    pub fn policy(&self, name: PolicyName) -> Arc<RetryPolicy> {
        let policy = match name {
            PolicyName::Aggressive => &self.aggressive,
            PolicyName::Standard => &self.standard,
            PolicyName::Cautious => &self.cautious,
            PolicyName::None => &self.none,
        };
        Arc::clone(policy)
    }

    /// Mutations and subscriptions always map to NONE, whatever their route.
    pub fn policy_name_for(&self, endpoint: &str, kind: OperationKind) -> PolicyName {
        if !kind.is_idempotent() {
            return PolicyName::None;
        }
        self.routes.get(endpoint).copied().unwrap_or_default()
    }

    pub fn resolve(&self, endpoint: &str, kind: OperationKind) -> Arc<RetryPolicy> {
        self.policy(self.policy_name_for(endpoint, kind))
    }
}
