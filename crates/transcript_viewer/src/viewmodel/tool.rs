//! Binds tool-use blocks to their underlying invocation and keeps the
//! derived projections in step as results resolve.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use derive_more::IsVariant;
use indexmap::IndexMap;
use serde_json::Value;

use crate::model::{ContentBlock, Message, ToolInvocation, ToolResult, ToolStatus};

/// View-state for one tool-use block: the invocation it is bound to plus
/// the result and content projections derived from it.
#[derive(Debug)]
pub struct ToolBlockView {
    invocation: Arc<ToolInvocation>,
    result: ResultView,
    content: ToolContent,
    /// Last result snapshot folded into the projections. Results are
    /// replaced by reference, so pointer identity detects staleness.
    last_seen: Arc<ToolResult>,
}

impl ToolBlockView {
    /// Build the view and synchronize it against the invocation's current
    /// state. The content kind is selected here, once, by tool name, and
    /// never re-selected afterward.
    pub fn new(invocation: Arc<ToolInvocation>) -> Self {
        let snapshot = invocation.result();
        let mut content = ToolContent::for_tool(invocation.tool_name());
        content.synchronize(&invocation, &snapshot);
        Self {
            result: ResultView::from_result(&snapshot),
            content,
            last_seen: snapshot,
            invocation,
        }
    }

    /// Re-read the bound invocation and update both projections.
    ///
    /// Idempotent: when the result has not been replaced since the last
    /// call the projections are left untouched and `false` is returned.
    pub fn synchronize(&mut self) -> bool {
        let snapshot = self.invocation.result();
        if Arc::ptr_eq(&snapshot, &self.last_seen) {
            return false;
        }
        self.result = ResultView::from_result(&snapshot);
        self.content.synchronize(&self.invocation, &snapshot);
        self.last_seen = snapshot;
        true
    }

    pub fn invocation(&self) -> &Arc<ToolInvocation> {
        &self.invocation
    }

    pub fn display_name(&self) -> &str {
        self.invocation.display_name()
    }

    pub fn result(&self) -> &ResultView {
        &self.result
    }

    pub fn content(&self) -> &ToolContent {
        &self.content
    }

    pub fn is_pending(&self) -> bool {
        self.result.is_pending()
    }
}

/// Flat projection of the invocation's latest result.
#[derive(Debug, Clone)]
pub struct ResultView {
    pub status: ToolStatus,
    pub is_error: bool,
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub child_messages: Vec<Message>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ResultView {
    fn from_result(result: &ToolResult) -> Self {
        Self {
            status: result.status,
            is_error: result.is_error,
            output: result.output.clone(),
            error_message: result.error_message.clone(),
            child_messages: result.child_messages.clone(),
            completed_at: result.completed_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ToolStatus::Pending
    }
}

/// Kind-specific projection of an invocation's arguments and output.
#[derive(Debug, Clone, IsVariant)]
pub enum ToolContent {
    Read(ReadContent),
    Edit(EditContent),
    Task(TaskContent),
    Generic(GenericContent),
}

#[derive(Debug, Clone, Default)]
pub struct ReadContent {
    pub path: Option<String>,
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EditContent {
    pub path: Option<String>,
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskContent {
    pub children: Vec<ChildSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct GenericContent {
    pub arguments: IndexMap<String, Value>,
    pub output: Option<String>,
}

/// One line of a composite tool's child transcript.
#[derive(Debug, Clone)]
pub struct ChildSummary {
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

impl ChildSummary {
    fn from_message(message: &Message) -> Self {
        Self {
            summary: summarize(message),
            timestamp: message.timestamp,
        }
    }
}

impl ToolContent {
    /// Select the content kind for a tool name. Unknown names fall back to
    /// the generic projection; that is never an error.
    pub fn for_tool(tool_name: &str) -> Self {
        match tool_name {
            "read" => Self::Read(ReadContent::default()),
            "edit" => Self::Edit(EditContent::default()),
            "task" => Self::Task(TaskContent::default()),
            _ => Self::Generic(GenericContent::default()),
        }
    }

    fn synchronize(&mut self, invocation: &ToolInvocation, result: &ToolResult) {
        match self {
            Self::Read(read) => {
                read.path = string_argument(invocation, "path");
                read.preview = result.output.clone();
            }
            Self::Edit(edit) => {
                edit.path = string_argument(invocation, "path");
                edit.diff = result.output.clone();
            }
            Self::Task(task) => {
                task.children = result
                    .child_messages
                    .iter()
                    .map(ChildSummary::from_message)
                    .collect();
            }
            Self::Generic(generic) => {
                generic.arguments = invocation.arguments().clone();
                generic.output = result.output.clone();
            }
        }
    }
}

fn string_argument(invocation: &ToolInvocation, name: &str) -> Option<String> {
    invocation
        .arguments()
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn summarize(message: &Message) -> String {
    if let Some(text) = message.text.as_deref() {
        if !text.trim().is_empty() {
            return text.to_string();
        }
    }
    for block in &message.blocks {
        match block {
            ContentBlock::Text { markdown } | ContentBlock::Thinking { markdown } => {
                return markdown.clone();
            }
            _ => {}
        }
    }
    "(no content)".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invocation(tool: &str) -> Arc<ToolInvocation> {
        let mut arguments = IndexMap::new();
        arguments.insert("path".to_string(), json!("src/lib.rs"));
        Arc::new(ToolInvocation::new(tool, arguments))
    }

    #[test]
    fn content_kind_is_selected_by_tool_name() {
        assert!(ToolBlockView::new(invocation("read")).content().is_read());
        assert!(ToolBlockView::new(invocation("edit")).content().is_edit());
        assert!(ToolBlockView::new(invocation("task")).content().is_task());
        assert!(ToolBlockView::new(invocation("frobnicate"))
            .content()
            .is_generic());
    }

    #[test]
    fn read_projection_fills_path_and_preview() {
        let invocation = invocation("read");
        let mut view = ToolBlockView::new(Arc::clone(&invocation));
        assert!(view.is_pending());

        invocation.complete(ToolResult::success(Some("X".to_string())));
        assert!(view.synchronize());
        assert!(!view.is_pending());
        match view.content() {
            ToolContent::Read(read) => {
                assert_eq!(read.path.as_deref(), Some("src/lib.rs"));
                assert_eq!(read.preview.as_deref(), Some("X"));
            }
            other => panic!("expected read content, got {other:?}"),
        }
    }

    #[test]
    fn synchronize_is_idempotent_on_unchanged_results() {
        let invocation = invocation("read");
        let mut view = ToolBlockView::new(Arc::clone(&invocation));
        assert!(!view.synchronize());

        invocation.complete(ToolResult::success(None));
        assert!(view.synchronize());
        assert!(!view.synchronize());
    }

    #[test]
    fn failure_is_modeled_not_exceptional() {
        let invocation = invocation("edit");
        let mut view = ToolBlockView::new(Arc::clone(&invocation));
        invocation.complete(ToolResult::failure("file locked"));
        view.synchronize();

        assert!(view.result().is_error);
        assert_eq!(view.result().error_message.as_deref(), Some("file locked"));
        assert!(!view.is_pending());
    }

    #[test]
    fn task_children_are_summarized() {
        let now = Utc::now();
        let children = vec![
            Message::assistant(
                now,
                vec![ContentBlock::Text {
                    markdown: "step one".to_string(),
                }],
            ),
            Message::user(now, "step two"),
            Message::assistant(now, Vec::new()),
        ];
        let invocation = Arc::new(ToolInvocation::new("task", IndexMap::new()));
        let mut view = ToolBlockView::new(Arc::clone(&invocation));
        invocation.complete(ToolResult::with_children(children));
        view.synchronize();

        match view.content() {
            ToolContent::Task(task) => {
                let summaries: Vec<&str> =
                    task.children.iter().map(|c| c.summary.as_str()).collect();
                assert_eq!(summaries, ["step one", "step two", "(no content)"]);
            }
            other => panic!("expected task content, got {other:?}"),
        }
    }

    #[test]
    fn generic_projection_carries_raw_arguments_and_output() {
        let invocation = invocation("frobnicate");
        let mut view = ToolBlockView::new(Arc::clone(&invocation));
        invocation.complete(ToolResult::success(Some("done".to_string())));
        view.synchronize();

        match view.content() {
            ToolContent::Generic(generic) => {
                assert_eq!(generic.arguments.get("path"), Some(&json!("src/lib.rs")));
                assert_eq!(generic.output.as_deref(), Some("done"));
            }
            other => panic!("expected generic content, got {other:?}"),
        }
    }
}
