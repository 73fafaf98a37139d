//! Agent filter policy
//!
//! Patterns are shell-style globs (`*`, `?`, `[...]`) matched against the whole
//! agent id, case-sensitively. Patterns without glob metacharacters, and
//! patterns that do not compile as globs, match by exact string.

use glob::Pattern;
use owui_core::{Agent, PolicyError};
use tracing::warn;

#[derive(Debug, Clone)]
enum Rule {
    Exact(String),
    Glob(Pattern),
}

impl Rule {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.contains(['*', '?', '[']) {
            match Pattern::new(raw) {
                Ok(pattern) => return Some(Rule::Glob(pattern)),
                Err(e) => warn!(pattern = %raw, error = %e, "Invalid glob, matching it literally"),
            }
        }
        Some(Rule::Exact(raw.to_string()))
    }

    fn matches(&self, agent_id: &str) -> bool {
        match self {
            Rule::Exact(id) => id == agent_id,
            Rule::Glob(pattern) => pattern.matches(agent_id),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Rule::Exact(id) => id,
            Rule::Glob(pattern) => pattern.as_str(),
        }
    }
}

/// Whitelist / blacklist over agent ids. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct FilterPolicy {
    whitelist: Vec<Rule>,
    blacklist: Vec<Rule>,
}

impl FilterPolicy {
    pub fn new<W, B, S>(whitelist: W, blacklist: B) -> Self
    where
        W: IntoIterator<Item = S>,
        B: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            whitelist: whitelist.into_iter().filter_map(|p| Rule::parse(p.as_ref())).collect(),
            blacklist: blacklist.into_iter().filter_map(|p| Rule::parse(p.as_ref())).collect(),
        }
    }

    /// Policy that lets every agent through
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Blacklist always wins; an empty whitelist allows everything else.
    pub fn is_allowed(&self, agent_id: &str) -> bool {
        if self.blacklist.iter().any(|rule| rule.matches(agent_id)) {
            return false;
        }
        self.whitelist.is_empty() || self.whitelist.iter().any(|rule| rule.matches(agent_id))
    }

    pub fn check(&self, agent_id: &str) -> Result<(), PolicyError> {
        if self.is_allowed(agent_id) {
            Ok(())
        } else {
            Err(PolicyError::Forbidden(agent_id.to_string()))
        }
    }

    /// Allowed agents, catalog order preserved
    pub fn filter(&self, agents: &[Agent]) -> Vec<Agent> {
        agents
            .iter()
            .filter(|agent| self.is_allowed(&agent.id))
            .cloned()
            .collect()
    }

    pub fn whitelist(&self) -> Vec<&str> {
        self.whitelist.iter().map(Rule::as_str).collect()
    }

    pub fn blacklist(&self) -> Vec<&str> {
        self.blacklist.iter().map(Rule::as_str).collect()
    }
}
