//! Immutable conversation data model.
//!
//! A transcript is a flat, chronologically ordered sequence of [`Message`]
//! values. Everything is fixed at construction except the result slot of a
//! [`ToolInvocation`], which is replaced by reference exactly once when the
//! tool call resolves.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use derive_more::IsVariant;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

/// Who produced a message. Closed set; display grouping keys off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    User,
    Assistant,
    Error,
    System,
}

/// One logical turn of the conversation.
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    pub working_dir: Option<PathBuf>,
    pub text: Option<String>,
    /// Content blocks; populated for assistant turns, empty otherwise.
    pub blocks: Vec<ContentBlock>,
}

impl Message {
    pub fn user(timestamp: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::User,
            timestamp,
            working_dir: None,
            text: Some(text.into()),
            blocks: Vec::new(),
        }
    }

    pub fn assistant(timestamp: DateTime<Utc>, blocks: Vec<ContentBlock>) -> Self {
        Self {
            kind: MessageKind::Assistant,
            timestamp,
            working_dir: None,
            text: None,
            blocks,
        }
    }

    pub fn error(timestamp: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            timestamp,
            working_dir: None,
            text: Some(text.into()),
            blocks: Vec::new(),
        }
    }

    pub fn system(timestamp: DateTime<Utc>, text: Option<String>) -> Self {
        Self {
            kind: MessageKind::System,
            timestamp,
            working_dir: None,
            text,
            blocks: Vec::new(),
        }
    }
}

/// Different kinds of content inside a turn.
#[derive(Debug, Clone, IsVariant)]
pub enum ContentBlock {
    /// Regular assistant prose (markdown).
    Text { markdown: String },
    /// Assistant reasoning (markdown).
    Thinking { markdown: String },
    /// Raw structured payload rendered verbatim.
    Json { json: String },
    /// A tool call; shared with whatever resolves it.
    ToolUse(Arc<ToolInvocation>),
}

/// A tool call made by the assistant.
///
/// Everything except the result slot is fixed at construction. The slot
/// holds an `Arc<ToolResult>` so each snapshot observers hold on to is
/// independently immutable; resolution swaps the whole value.
#[derive(Debug)]
pub struct ToolInvocation {
    tool_name: String,
    display_name: Option<String>,
    arguments: IndexMap<String, Value>,
    result: RwLock<Arc<ToolResult>>,
}

impl ToolInvocation {
    /// Create a pending invocation.
    pub fn new(tool_name: impl Into<String>, arguments: IndexMap<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            display_name: None,
            arguments,
            result: RwLock::new(Arc::new(ToolResult::pending())),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Human-facing name; falls back to the tool name when no display name
    /// was provided or it is blank.
    pub fn display_name(&self) -> &str {
        match &self.display_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.tool_name,
        }
    }

    pub fn arguments(&self) -> &IndexMap<String, Value> {
        &self.arguments
    }

    /// Snapshot of the current result. The returned value never changes;
    /// call again to observe a later completion.
    pub fn result(&self) -> Arc<ToolResult> {
        // A poisoned lock only ever holds a fully-written Arc, so the value
        // is still safe to hand out.
        match self.result.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Resolve the invocation. The Pending -> Completed transition happens
    /// at most once; a repeat completion (or a non-completed argument) is
    /// rejected and leaves the stored result untouched.
    pub fn complete(&self, result: ToolResult) -> bool {
        if result.status != ToolStatus::Completed {
            warn!(tool = %self.tool_name, "ignoring completion with non-completed result");
            return false;
        }
        let mut slot = match self.result.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.status == ToolStatus::Completed {
            warn!(tool = %self.tool_name, "invocation already completed");
            return false;
        }
        *slot = Arc::new(result);
        true
    }
}

/// Lifecycle of a tool call. Completed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Pending,
    Completed,
}

/// Outcome of a tool call. A value is immutable; resolution replaces the
/// whole value behind the invocation's result slot.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub is_error: bool,
    pub output: Option<String>,
    pub error_message: Option<String>,
    /// Nested sub-conversation produced by composite tools.
    pub child_messages: Vec<Message>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ToolResult {
    pub fn pending() -> Self {
        Self {
            status: ToolStatus::Pending,
            is_error: false,
            output: None,
            error_message: None,
            child_messages: Vec::new(),
            completed_at: None,
        }
    }

    pub fn success(output: Option<String>) -> Self {
        Self {
            status: ToolStatus::Completed,
            is_error: false,
            output,
            error_message: None,
            child_messages: Vec::new(),
            completed_at: Some(Utc::now()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Completed,
            is_error: true,
            output: None,
            error_message: Some(message.into()),
            child_messages: Vec::new(),
            completed_at: Some(Utc::now()),
        }
    }

    pub fn with_children(children: Vec<Message>) -> Self {
        Self {
            status: ToolStatus::Completed,
            is_error: false,
            output: None,
            error_message: None,
            child_messages: children,
            completed_at: Some(Utc::now()),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ToolStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_invocation() -> ToolInvocation {
        let mut arguments = IndexMap::new();
        arguments.insert("path".to_string(), json!("docs/overview.md"));
        ToolInvocation::new("read", arguments)
    }

    #[test]
    fn display_name_falls_back_to_tool_name() {
        let plain = read_invocation();
        assert_eq!(plain.display_name(), "read");

        let named = read_invocation().with_display_name("Read file");
        assert_eq!(named.display_name(), "Read file");

        let blank = read_invocation().with_display_name("   ");
        assert_eq!(blank.display_name(), "read");
    }

    #[test]
    fn complete_transitions_exactly_once() {
        let invocation = read_invocation();
        assert!(invocation.result().is_pending());

        assert!(invocation.complete(ToolResult::success(Some("X".to_string()))));
        let first = invocation.result();
        assert_eq!(first.output.as_deref(), Some("X"));
        assert!(!first.is_pending());

        // The second completion is rejected and the stored value is unchanged.
        assert!(!invocation.complete(ToolResult::failure("late")));
        assert!(Arc::ptr_eq(&first, &invocation.result()));
    }

    #[test]
    fn completing_with_a_pending_result_is_rejected() {
        let invocation = read_invocation();
        assert!(!invocation.complete(ToolResult::pending()));
        assert!(invocation.result().is_pending());
    }

    #[test]
    fn snapshots_are_independent() {
        let invocation = read_invocation();
        let before = invocation.result();
        invocation.complete(ToolResult::success(None));
        assert!(before.is_pending());
        assert!(!invocation.result().is_pending());
    }
}
