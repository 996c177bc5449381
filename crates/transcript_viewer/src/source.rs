//! Transcript data sources and the JSON wire format.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::{ContentBlock, Message, MessageKind, ToolInvocation, ToolResult};

/// Errors surfaced while acquiring a transcript.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read transcript: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed transcript: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Supplies the raw message sequence. Implementations may be backed by
/// canned data, files, or a live agent session.
#[async_trait]
pub trait ConversationSource: Send + Sync {
    async fn fetch_transcript(&self) -> Result<Vec<Message>, SourceError>;
}

/// Reads a whole transcript from a JSON file.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConversationSource for JsonFileSource {
    async fn fetch_transcript(&self) -> Result<Vec<Message>, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        parse_transcript(&raw)
    }
}

/// Parse a JSON transcript: an array of role-tagged messages.
pub fn parse_transcript(raw: &str) -> Result<Vec<Message>, SourceError> {
    let wire: Vec<WireMessage> = serde_json::from_str(raw)?;
    Ok(wire.into_iter().map(WireMessage::into_message).collect())
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    role: WireRole,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    working_dir: Option<PathBuf>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    blocks: Vec<WireBlock>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireRole {
    User,
    Assistant,
    Error,
    System,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        markdown: String,
    },
    Thinking {
        markdown: String,
    },
    Json {
        json: Value,
    },
    ToolUse {
        tool: String,
        #[serde(default)]
        display_name: Option<String>,
        #[serde(default)]
        arguments: IndexMap<String, Value>,
        /// Inline result for already-resolved calls; absent means pending.
        #[serde(default)]
        result: Option<WireResult>,
    },
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    children: Vec<WireMessage>,
}

impl WireMessage {
    fn into_message(self) -> Message {
        Message {
            kind: self.role.into_kind(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            working_dir: self.working_dir,
            text: self.text,
            blocks: self.blocks.into_iter().map(WireBlock::into_block).collect(),
        }
    }
}

impl WireRole {
    fn into_kind(self) -> MessageKind {
        match self {
            Self::User => MessageKind::User,
            Self::Assistant => MessageKind::Assistant,
            Self::Error => MessageKind::Error,
            Self::System => MessageKind::System,
        }
    }
}

impl WireBlock {
    fn into_block(self) -> ContentBlock {
        match self {
            Self::Text { markdown } => ContentBlock::Text { markdown },
            Self::Thinking { markdown } => ContentBlock::Thinking { markdown },
            Self::Json { json } => ContentBlock::Json {
                json: serde_json::to_string_pretty(&json).unwrap_or_default(),
            },
            Self::ToolUse {
                tool,
                display_name,
                arguments,
                result,
            } => {
                let mut invocation = ToolInvocation::new(tool, arguments);
                if let Some(name) = display_name {
                    invocation = invocation.with_display_name(name);
                }
                if let Some(result) = result {
                    invocation.complete(result.into_result());
                }
                ContentBlock::ToolUse(Arc::new(invocation))
            }
        }
    }
}

impl WireResult {
    fn into_result(self) -> ToolResult {
        let mut result = if self.is_error {
            ToolResult::failure(
                self.error_message
                    .unwrap_or_else(|| "tool failed".to_string()),
            )
        } else if !self.children.is_empty() {
            ToolResult::with_children(
                self.children
                    .into_iter()
                    .map(WireMessage::into_message)
                    .collect(),
            )
        } else {
            ToolResult::success(None)
        };
        result.output = self.output.or(result.output);
        result
    }
}
