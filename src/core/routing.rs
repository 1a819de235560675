//! Task routing for orchd.
//!
//! Free-text tasks are classified into one of four agent kinds by an ordered
//! table of keyword rules. The first rule that matches wins; a task that
//! matches nothing goes to the reader.

use serde::{Deserialize, Serialize};

/// Agent categories a task can be routed to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Reader,
    Refactor,
    Test,
    Doc,
}

impl AgentKind {
    pub fn key(&self) -> &'static str {
        match self {
            AgentKind::Reader => "reader",
            AgentKind::Refactor => "refactor",
            AgentKind::Test => "test",
            AgentKind::Doc => "doc",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// One row of the routing table.
pub struct Rule {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    /// Decides the target once a keyword hit is found; receives the
    /// lowercased task.
    pub target: fn(&str) -> AgentKind,
}

impl Rule {
    fn matches(&self, task: &str) -> bool {
        self.keywords.iter().any(|k| task.contains(k))
    }
}

/// Routing rules in priority order.
pub const RULES: &[Rule] = &[
    Rule {
        name: "refactor",
        keywords: &["refactor", "optimize", "rewrite", "improve"],
        target: to_refactor,
    },
    Rule {
        name: "test",
        keywords: &["test", "verify", "unittest", "pytest"],
        target: to_test,
    },
    Rule {
        name: "doc",
        keywords: &["doc", "explain", "readme", "comment"],
        target: doc_or_reader,
    },
];

fn to_refactor(_: &str) -> AgentKind {
    AgentKind::Refactor
}

fn to_test(_: &str) -> AgentKind {
    AgentKind::Test
}

/// "explain how X works" is a reading request, not a documentation one.
fn doc_or_reader(task: &str) -> AgentKind {
    if task.contains("explain") && task.split_whitespace().count() > 3 {
        AgentKind::Reader
    } else {
        AgentKind::Doc
    }
}

/// Classify a task against [`RULES`], defaulting to the reader.
pub fn classify(task: &str) -> AgentKind {
    let task = task.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matches(&task))
        .map(|rule| (rule.target)(&task))
        .unwrap_or(AgentKind::Reader)
}
