// src/dsl/verifier.rs

//! Pluggable name resolution for the parser.

use std::collections::BTreeSet;

use crate::dag::settings::ANY_AGENT;

/// Answers the parser's questions about the host environment.
pub trait Verifier {
    fn node_exists(&self, id: &str) -> bool;

    fn agent_exists(&self, name: &str) -> bool;

    /// Reject unknown settings fields instead of recording them.
    fn strict_mode(&self) -> bool;

    /// Valid node ids, used to suggest alternatives in error messages.
    fn known_nodes(&self) -> Vec<String> {
        Vec::new()
    }

    fn known_agents(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Set-backed [`Verifier`].
///
/// With verification disabled every node and agent is accepted; strict mode
/// still applies to settings fields.
#[derive(Debug, Clone)]
pub struct SettingsVerifier {
    nodes: BTreeSet<String>,
    agents: BTreeSet<String>,
    strict: bool,
    verify: bool,
}

impl SettingsVerifier {
    pub fn new<N, A>(nodes: N, agents: A) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        let mut agents: BTreeSet<String> = agents.into_iter().map(Into::into).collect();
        agents.insert(ANY_AGENT.to_string());

        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            agents,
            strict: false,
            verify: true,
        }
    }

    /// Accept everything, non-strict.
    pub fn permissive() -> Self {
        Self::new(Vec::<String>::new(), Vec::<String>::new()).with_verification(false)
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

impl Verifier for SettingsVerifier {
    fn node_exists(&self, id: &str) -> bool {
        !self.verify || self.nodes.contains(id)
    }

    fn agent_exists(&self, name: &str) -> bool {
        !self.verify || self.agents.contains(name)
    }

    fn strict_mode(&self) -> bool {
        self.strict
    }

    fn known_nodes(&self) -> Vec<String> {
        self.nodes.iter().cloned().collect()
    }

    fn known_agents(&self) -> Vec<String> {
        self.agents.iter().cloned().collect()
    }
}
