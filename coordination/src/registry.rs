//! Agent registry contract.
//!
//! The registry is an external collaborator: it answers which agents exist
//! and what they declared they can do. The core uses it to pick consensus
//! participants and cross-validators.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Identifier of an agent participating in a session.
pub type AgentId = String;

/// An agent and its declared capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: AgentId,
    pub capabilities: Vec<String>,
}

impl AgentInfo {
    pub fn new(id: impl Into<AgentId>, capabilities: Vec<String>) -> Self {
        Self {
            id: id.into(),
            capabilities,
        }
    }
}

/// Registry contract consumed by the core.
pub trait AgentRegistry: Send + Sync {
    /// All currently registered agents.
    fn list_agents(&self) -> Vec<AgentInfo>;
}

/// In-memory registry for tests and single-process sessions.
///
/// BTreeMap keeps listing order deterministic, which makes validator
/// selection reproducible in tests.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    agents: RwLock<BTreeMap<AgentId, AgentInfo>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of agents.
    pub fn with_agents(agents: Vec<AgentInfo>) -> Self {
        let registry = Self::new();
        for agent in agents {
            registry.register(agent);
        }
        registry
    }

    pub fn register(&self, agent: AgentInfo) {
        self.agents
            .write()
            .expect("registry lock poisoned")
            .insert(agent.id.clone(), agent);
    }

    pub fn remove(&self, id: &AgentId) {
        self.agents
            .write()
            .expect("registry lock poisoned")
            .remove(id);
    }
}

impl AgentRegistry for StaticRegistry {
    fn list_agents(&self) -> Vec<AgentInfo> {
        self.agents
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_is_sorted_by_id() {
        let registry = StaticRegistry::with_agents(vec![
            AgentInfo::new("zeta", vec![]),
            AgentInfo::new("alpha", vec!["summarize".to_string()]),
        ]);

        let ids: Vec<_> = registry.list_agents().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_remove() {
        let registry = StaticRegistry::with_agents(vec![AgentInfo::new("a", vec![])]);
        registry.remove(&"a".to_string());
        assert!(registry.list_agents().is_empty());
    }
}
