//! Core orchestration: task routing and the coordinator that ties routing,
//! retrieval and agents together.

pub mod coordinator;
pub mod routing;

pub use coordinator::{build_context, Coordinator};
pub use routing::{classify, AgentKind, Rule, RULES};
