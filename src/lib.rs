#![warn(clippy::pedantic)]
// Noisy doc/signature lints that would require annotating most pub functions
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Mixed format! styles are fine here
#![allow(clippy::uninlined_format_args)]
// Intentional casts in token estimation and backoff math
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
// The tools module uses the foo::FooTool pattern
#![allow(clippy::module_name_repetitions)]

//! Middleware-orchestrated agent execution loop with context-budget
//! management.
//!
//! One [`AgentLoop`] drives one run: it repeatedly invokes an
//! [`LLMProvider`], dispatches tool calls against a [`RunState`] owned by the
//! run, and threads every turn through an ordered [`AgentMiddleware`] chain.
//! The built-in middleware keep the context window bounded:
//!
//! - a plan tracker exposed as the `write_todos` tool,
//! - a virtual filesystem (`read_file` / `write_file` / `list_files` /
//!   `search_files`) that oversized tool results are evicted into,
//! - a summarizer that compresses old history through a secondary model call,
//! - a `task` tool that delegates bounded sub-tasks to isolated child runs.

pub mod agent_loop;
pub mod config;
pub mod errors;
pub mod events;
pub mod middleware;
pub mod plan;
pub mod provider;
pub mod state;
pub mod subagent;
pub mod tools;
pub mod vfs;

pub use agent_loop::{AgentLoop, RunOutcome};
pub use config::{RetryConfig, RunConfig};
pub use errors::{LoomError, LoomResult};
pub use events::{AgentEvent, EventSink};
pub use middleware::AgentMiddleware;
pub use provider::{ChatRequest, LLMProvider, LLMResponse, Message, ToolCallRequest};
pub use state::{PlanItem, PlanStatus, RunState};
pub use tools::{Tool, ToolResult};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
