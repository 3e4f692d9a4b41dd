//! Virtual-filesystem tools.
//!
//! Thin argument-parsing shells over [`crate::vfs`]; all real semantics
//! (normalization, character windows, caps) live there.

use crate::tools::{Tool, ToolInvocation, ToolResult};
use crate::vfs::{self, DEFAULT_READ_LIMIT, MAX_MATCHES, ReadOutcome};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

fn args_error(tool: &str, e: serde_json::Error) -> ToolResult {
    ToolResult::error(format!("Invalid arguments for {tool}: {e}"))
}

#[derive(Deserialize)]
struct ReadArgs {
    path: String,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    limit: Option<usize>,
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file from the run's virtual filesystem. Large files are \
         windowed; pass offset and limit (in characters) to page through."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "offset": {"type": "integer", "description": "Characters to skip from the start", "default": 0},
                "limit": {"type": "integer", "description": format!("Maximum characters to return (default {DEFAULT_READ_LIMIT})")}
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        params: Value,
        invocation: &mut ToolInvocation<'_>,
    ) -> anyhow::Result<ToolResult> {
        let args: ReadArgs = match serde_json::from_value(params) {
            Ok(args) => args,
            Err(e) => return Ok(args_error(self.name(), e)),
        };
        match vfs::read(&invocation.state.files, &args.path, args.offset, args.limit) {
            ReadOutcome::Content {
                text,
                offset,
                total_chars,
                truncated,
            } => {
                if truncated {
                    let shown = text.chars().count();
                    Ok(ToolResult::ok(format!(
                        "[chars {offset}..{} of {total_chars}; continue with offset={}]\n{text}",
                        offset + shown,
                        offset + shown,
                    )))
                } else {
                    Ok(ToolResult::ok(text))
                }
            }
            ReadOutcome::NotFound => Ok(ToolResult::error(format!(
                "File not found: {}",
                vfs::normalize_path(&args.path)
            ))),
        }
    }
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
    #[serde(default)]
    append: bool,
}

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write a file in the run's virtual filesystem, overwriting any \
         existing content unless append is true."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"},
                "append": {"type": "boolean", "default": false}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        params: Value,
        invocation: &mut ToolInvocation<'_>,
    ) -> anyhow::Result<ToolResult> {
        let args: WriteArgs = match serde_json::from_value(params) {
            Ok(args) => args,
            Err(e) => return Ok(args_error(self.name(), e)),
        };
        let chars = args.content.chars().count();
        vfs::write(
            &mut invocation.state.files,
            &args.path,
            &args.content,
            args.append,
        );
        let verb = if args.append { "Appended" } else { "Wrote" };
        Ok(ToolResult::ok(format!(
            "{verb} {chars} chars to {}",
            vfs::normalize_path(&args.path)
        )))
    }
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default)]
    prefix: Option<String>,
}

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List virtual-filesystem paths, optionally restricted to a prefix."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prefix": {"type": "string", "description": "Path prefix to filter by"}
            }
        })
    }

    async fn execute(
        &self,
        params: Value,
        invocation: &mut ToolInvocation<'_>,
    ) -> anyhow::Result<ToolResult> {
        let args: ListArgs = match serde_json::from_value(params) {
            Ok(args) => args,
            Err(e) => return Ok(args_error(self.name(), e)),
        };
        let paths = vfs::list(&invocation.state.files, args.prefix.as_deref().unwrap_or("/"));
        if paths.is_empty() {
            Ok(ToolResult::ok("No files"))
        } else {
            let mut listing = paths.join("\n");
            if paths.len() == MAX_MATCHES {
                listing.push_str("\n(listing capped; narrow the prefix to see more)");
            }
            Ok(ToolResult::ok(listing))
        }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    #[serde(default)]
    path_query: String,
    #[serde(default)]
    content_query: Option<String>,
}

pub struct SearchFilesTool;

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Find virtual-filesystem files by path substring and, optionally, \
         content substring."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path_query": {"type": "string", "description": "Substring the path must contain"},
                "content_query": {"type": "string", "description": "Substring the content must contain"}
            }
        })
    }

    async fn execute(
        &self,
        params: Value,
        invocation: &mut ToolInvocation<'_>,
    ) -> anyhow::Result<ToolResult> {
        let args: SearchArgs = match serde_json::from_value(params) {
            Ok(args) => args,
            Err(e) => return Ok(args_error(self.name(), e)),
        };
        let matches = vfs::search(
            &invocation.state.files,
            &args.path_query,
            args.content_query.as_deref(),
        );
        if matches.is_empty() {
            Ok(ToolResult::ok("No matches"))
        } else {
            Ok(ToolResult::ok(matches.join("\n")))
        }
    }
}
