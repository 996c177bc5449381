//! Built-in demo conversation used when no transcript file is given.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde_json::json;

use crate::model::{ContentBlock, Message, ToolInvocation, ToolResult};
use crate::source::{ConversationSource, SourceError};

pub struct SampleSource;

#[async_trait]
impl ConversationSource for SampleSource {
    async fn fetch_transcript(&self) -> Result<Vec<Message>, SourceError> {
        Ok(sample_transcript(Utc::now()))
    }
}

fn path_args(path: &str) -> IndexMap<String, serde_json::Value> {
    let mut arguments = IndexMap::new();
    arguments.insert("path".to_string(), json!(path));
    arguments
}

/// A multi-turn conversation exercising every display path: user turns,
/// thinking, a pending and a completed read, a composite task with child
/// messages, a failing edit, and a trailing error turn. The pending read is
/// left unresolved so a driver can demonstrate asynchronous completion.
pub fn sample_transcript(now: DateTime<Utc>) -> Vec<Message> {
    let at = |seconds: i64| now + Duration::seconds(seconds);

    let pending_read = Arc::new(
        ToolInvocation::new("read", path_args("docs/overview.md")).with_display_name("Read file"),
    );

    let completed_read = Arc::new(
        ToolInvocation::new("read", path_args("docs/architecture.md"))
            .with_display_name("Read file"),
    );
    completed_read.complete(ToolResult::success(Some(
        "# Architecture\n- scheduler\n- executor\n- notifier".to_string(),
    )));

    let mut task_args = IndexMap::new();
    task_args.insert("title".to_string(), json!("Trace the task flow"));
    let task = Arc::new(ToolInvocation::new("task", task_args).with_display_name("Run sub-task"));
    task.complete(ToolResult::with_children(vec![
        Message::assistant(
            at(15),
            vec![ContentBlock::Text {
                markdown: "Scheduler picks up the request and spawns a worker".to_string(),
            }],
        ),
        Message::assistant(
            at(16),
            vec![ContentBlock::Text {
                markdown: "Progress is streamed back to the timeline".to_string(),
            }],
        ),
    ]));

    let failing_edit = Arc::new(
        ToolInvocation::new("edit", path_args("docs/overview.md")).with_display_name("Edit file"),
    );
    failing_edit.complete(ToolResult::failure("file is locked, cannot write"));

    vec![
        Message::user(
            at(0),
            "Please look at the project docs and summarize the core capabilities.",
        ),
        Message::assistant(
            at(2),
            vec![
                ContentBlock::Thinking {
                    markdown: "Looking for docs/overview.md to understand the project.".to_string(),
                },
                ContentBlock::ToolUse(pending_read),
            ],
        ),
        // Synthetic echo of the tool call inputs; the filter drops it.
        Message {
            blocks: vec![ContentBlock::ToolUse(Arc::new(ToolInvocation::new(
                "read",
                path_args("docs/overview.md"),
            )))],
            text: None,
            ..Message::user(at(3), "")
        },
        Message::assistant(
            at(5),
            vec![
                ContentBlock::ToolUse(completed_read),
                ContentBlock::Text {
                    markdown: "I have read the architecture notes; a summary follows.".to_string(),
                },
            ],
        ),
        Message::assistant(
            at(8),
            vec![ContentBlock::Text {
                markdown: "**Core capabilities**\n1. Parallel task execution\n2. Multi-model \
                           routing\n3. Push notifications"
                    .to_string(),
            }],
        ),
        Message::user(at(12), "Now walk me through the task execution flow."),
        Message::assistant(
            at(14),
            vec![
                ContentBlock::ToolUse(task),
                ContentBlock::Thinking {
                    markdown: "Collating sub-task results before summarizing.".to_string(),
                },
            ],
        ),
        Message::assistant(
            at(18),
            vec![ContentBlock::Text {
                markdown: "The flow has three phases: scheduling, execution and notification."
                    .to_string(),
            }],
        ),
        Message::assistant(at(20), vec![ContentBlock::ToolUse(failing_edit)]),
        Message::error(
            at(21),
            "Failed to update the document: the file is held by another process.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewmodel::ConversationViewModel;

    #[tokio::test]
    async fn sample_loads_with_one_pending_invocation() {
        let mut engine = ConversationViewModel::new(Box::new(SampleSource));
        engine.load_conversation().await.expect("sample never fails");

        // user / assistant run / user / assistant run / error
        assert_eq!(engine.groups().len(), 5);
        assert!(engine.has_pending_tool_results());

        let pending = engine.pending_invocations();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].tool_name(), "read");
    }
}
