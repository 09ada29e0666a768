use crate::tools::{ToolName, Toolkit};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;

/// Fixed per-tool-call timeout. One global value for every tool; whether
/// slower tools deserve their own allowance is an open product question.
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(30);

type CapabilityFuture = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>>;

/// Resolves tool names against the toolkit and races execution against a
/// timeout and external cancellation.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    timeout: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            timeout: TOOL_TIMEOUT,
        }
    }
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Resolve and run one tool call. Infallible by contract: every failure
    /// mode comes back as a descriptive observation string, never blank,
    /// since blank content is indistinguishable from failure to a model
    /// reading it back.
    ///
    /// The race between completion, timeout and cancellation is a
    /// `tokio::select!`: losing branches are dropped in place, so no timer
    /// or in-flight call outlives the decision.
    pub async fn execute(
        &self,
        name: &str,
        args: &Map<String, Value>,
        toolkit: &Toolkit,
        cancel: &CancellationToken,
    ) -> String {
        let Ok(tool) = name.parse::<ToolName>() else {
            return unknown_tool_message(name);
        };

        let future: CapabilityFuture = match tool {
            ToolName::WebSearch => {
                let Some(capability) = toolkit.web_search.clone() else {
                    return unavailable_message(tool);
                };
                let Some(query) = string_arg(args, tool) else {
                    return invalid_arg_message(args, tool);
                };
                Box::pin(async move { capability.search(&query).await })
            }
            ToolName::RagSearch => {
                let Some(capability) = toolkit.rag_search.clone() else {
                    return unavailable_message(tool);
                };
                let Some(query) = string_arg(args, tool) else {
                    return invalid_arg_message(args, tool);
                };
                Box::pin(async move { capability.search(&query).await })
            }
            ToolName::Python => {
                let Some(capability) = toolkit.python.clone() else {
                    return unavailable_message(tool);
                };
                let Some(code) = string_arg(args, tool) else {
                    return invalid_arg_message(args, tool);
                };
                Box::pin(async move { capability.run(&code).await })
            }
            ToolName::MemorySave => {
                let Some(capability) = toolkit.memory_save.clone() else {
                    return unavailable_message(tool);
                };
                let Some(content) = string_arg(args, tool) else {
                    return invalid_arg_message(args, tool);
                };
                Box::pin(async move { capability.save(&content).await })
            }
            ToolName::MemoryRecall => {
                // Synchronous by contract: never suspends, so it skips the
                // race entirely.
                let Some(capability) = &toolkit.memory_recall else {
                    return unavailable_message(tool);
                };
                let Some(query) = string_arg(args, tool) else {
                    return invalid_arg_message(args, tool);
                };
                return normalize(tool, Ok(capability.recall(&query)));
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => "Cancelled".to_string(),
            () = tokio::time::sleep(self.timeout) => {
                format!("Tool \"{tool}\" timed out after {}s", self.timeout.as_secs())
            }
            result = future => normalize(tool, result),
        }
    }
}

/// First present argument alias, as an owned string. Scalars the model
/// emitted unquoted (numbers, booleans) are coerced to their text form;
/// arrays, objects and null are not.
fn string_arg(args: &Map<String, Value>, tool: ToolName) -> Option<String> {
    match tool.arg_aliases().iter().find_map(|alias| args.get(*alias))? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn normalize(tool: ToolName, result: anyhow::Result<String>) -> String {
    match result {
        Ok(output) if output.trim().is_empty() => {
            format!("Tool \"{tool}\" returned empty result")
        }
        Ok(output) => output,
        Err(error) => format!("Tool \"{tool}\" failed: {error:#}"),
    }
}

fn unknown_tool_message(name: &str) -> String {
    let valid = ToolName::iter()
        .map(|tool| tool.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Unknown tool \"{name}\". Valid tools: {valid}")
}

fn unavailable_message(tool: ToolName) -> String {
    format!("Tool \"{tool}\" is not currently available in this session")
}

/// Absent and wrong-typed arguments get distinct messages; the model reads
/// these back and needs to know which mistake to correct.
fn invalid_arg_message(args: &Map<String, Value>, tool: ToolName) -> String {
    match tool.arg_aliases().iter().find_map(|alias| args.get(*alias)) {
        Some(value) => format!(
            "Tool \"{tool}\" argument \"{}\" must be a string, not {}",
            tool.arg_key(),
            value_kind(value)
        ),
        None => format!(
            "Tool \"{tool}\" call is missing required argument \"{}\"",
            tool.arg_key()
        ),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
