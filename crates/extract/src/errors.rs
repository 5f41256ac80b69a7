//! Errors raised by the tool-use client.
//!
//! Callers branch on these to tell an unreachable endpoint apart from a
//! response that simply did not invoke any of the declared tools.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolUseError {
    /// The request never produced an HTTP response.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response from the generation endpoint.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body was not a valid Converse response.
    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),

    /// At least one tool must be declared per request.
    #[error("no tools declared for request")]
    NoToolsDeclared,

    /// The model answered without invoking any declared tool.
    #[error("response contained no tool invocation (stop reason: {stop_reason})")]
    NoToolUse { stop_reason: String },

    /// The model invoked a tool the caller does not know how to interpret.
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    /// The tool input did not match the shape the caller expected.
    #[error("invalid input for tool {name}: {source}")]
    InvalidInput {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ToolUseError {
    /// HTTP status code, if the endpoint answered with an error status.
    pub fn status(&self) -> Option<u16> {
        match self {
            ToolUseError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
