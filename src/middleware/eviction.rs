//! Large tool-result eviction.
//!
//! Oversized tool output is moved into the virtual filesystem and replaced
//! in the conversation with a short pointer, so a single verbose tool cannot
//! flood the context window. The model can still page through the full
//! content with `read_file`.

use crate::events::EventSink;
use crate::middleware::AgentMiddleware;
use crate::provider::ToolCallRequest;
use crate::state::{LARGE_RESULTS_PREFIX, RunState};
use crate::tools::ToolResult;
use crate::vfs;
use async_trait::async_trait;
use tracing::info;

pub struct EvictionMiddleware {
    threshold_chars: usize,
}

impl EvictionMiddleware {
    pub fn new(threshold_chars: usize) -> Self {
        Self { threshold_chars }
    }
}

#[async_trait]
impl AgentMiddleware for EvictionMiddleware {
    fn name(&self) -> &str {
        "eviction"
    }

    async fn post_tool(
        &self,
        call: &ToolCallRequest,
        result: &mut ToolResult,
        state: &mut RunState,
        _events: &EventSink,
    ) {
        let chars = result.content.chars().count();
        if chars <= self.threshold_chars {
            return;
        }

        let path = format!("{LARGE_RESULTS_PREFIX}/{}", call.id);
        vfs::write(&mut state.files, &path, &result.content, false);
        info!(tool = %call.name, chars, %path, "evicted large tool result");

        result.content = format!(
            "Result too large for context ({chars} chars). Full output saved to {path}. \
             Use read_file with offset/limit to view it."
        );
    }
}
