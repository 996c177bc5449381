//! One display group: a maximal run of consecutive same-kind messages.

use std::sync::Arc;

use tracing::trace;

use crate::model::{ContentBlock, Message, MessageKind};
use crate::viewmodel::events::{ChangeNotifier, SubscriptionId};
use crate::viewmodel::paginate::{paginate, TextPage};
use crate::viewmodel::tool::ToolBlockView;

/// Identifies a group for subscription bookkeeping across reloads.
pub type GroupId = u64;

/// Change events published by a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEvent {
    /// The OR over this group's tool blocks' pending status flipped.
    PendingChanged(bool),
    /// Accumulated text and pagination changed.
    TextChanged,
    /// One or more assistant blocks were appended.
    BlocksAppended,
    /// The expand toggle flipped.
    ExpandChanged(bool),
}

/// Materialized view-state of one assistant content block.
#[derive(Debug)]
pub enum BlockView {
    Text { markdown: String },
    Thinking { markdown: String },
    Json { json: String },
    ToolUse(ToolBlockView),
}

/// Derived display unit for a run of same-kind messages.
///
/// The kind is fixed at creation; a message of a different kind always
/// starts a new group. Groups are only ever appended to, never merged or
/// split.
#[derive(Debug)]
pub struct DisplayGroup {
    id: GroupId,
    kind: MessageKind,
    messages: Vec<Message>,
    combined_text: String,
    page: TextPage,
    blocks: Vec<BlockView>,
    expanded: bool,
    has_pending: bool,
    events: ChangeNotifier<GroupEvent>,
}

impl DisplayGroup {
    /// Seed a new group from its first message.
    pub(crate) fn from_message(id: GroupId, message: Message) -> Self {
        let mut group = Self {
            id,
            kind: message.kind,
            messages: Vec::new(),
            combined_text: String::new(),
            page: TextPage::default(),
            blocks: Vec::new(),
            expanded: false,
            has_pending: false,
            events: ChangeNotifier::new(),
        };
        group.append(message);
        group
    }

    /// Absorb a message of this group's kind. Callers guarantee the kind
    /// matches; appending delegates to kind-specific logic.
    pub(crate) fn append(&mut self, message: Message) {
        debug_assert_eq!(message.kind, self.kind);
        match self.kind {
            MessageKind::User | MessageKind::Error => self.append_text(&message),
            MessageKind::Assistant => self.append_blocks(&message),
            // System turns are absorbed for run bookkeeping but materialize
            // no display content.
            MessageKind::System => {}
        }
        self.messages.push(message);
    }

    fn append_text(&mut self, message: &Message) {
        let Some(text) = message.text.as_deref() else {
            return;
        };
        if text.trim().is_empty() {
            return;
        }
        if !self.combined_text.is_empty() {
            self.combined_text.push_str("\n\n");
        }
        self.combined_text.push_str(text);
        self.page = paginate(&self.combined_text);
        self.events.emit(&GroupEvent::TextChanged);
    }

    fn append_blocks(&mut self, message: &Message) {
        let mut appended = false;
        for block in &message.blocks {
            let view = match block {
                ContentBlock::Text { markdown } => BlockView::Text {
                    markdown: markdown.clone(),
                },
                ContentBlock::Thinking { markdown } => BlockView::Thinking {
                    markdown: markdown.clone(),
                },
                ContentBlock::Json { json } => BlockView::Json { json: json.clone() },
                ContentBlock::ToolUse(invocation) => {
                    // Synchronized at construction; later resolutions come
                    // in through `synchronize_tools`.
                    BlockView::ToolUse(ToolBlockView::new(Arc::clone(invocation)))
                }
            };
            let is_tool = matches!(view, BlockView::ToolUse(_));
            self.blocks.push(view);
            appended = true;
            if is_tool {
                self.recompute_pending();
            }
        }
        if appended {
            self.events.emit(&GroupEvent::BlocksAppended);
        }
    }

    /// Re-synchronize every tool block against its invocation. Returns true
    /// if any projection changed.
    pub fn synchronize_tools(&mut self) -> bool {
        let mut changed = false;
        for block in &mut self.blocks {
            if let BlockView::ToolUse(tool) = block {
                changed |= tool.synchronize();
            }
        }
        if changed {
            self.recompute_pending();
        }
        changed
    }

    fn recompute_pending(&mut self) {
        let pending = self
            .blocks
            .iter()
            .any(|block| matches!(block, BlockView::ToolUse(tool) if tool.is_pending()));
        if pending != self.has_pending {
            self.has_pending = pending;
            trace!(group = self.id, pending, "pending tool flag changed");
            self.events.emit(&GroupEvent::PendingChanged(pending));
        }
    }

    /// Toggle visibility of the overflow text. Ignored while there is
    /// nothing hidden; never alters preview or remainder content.
    pub fn toggle_expand(&mut self) -> bool {
        if !self.page.has_overflow() {
            return false;
        }
        self.expanded = !self.expanded;
        self.events.emit(&GroupEvent::ExpandChanged(self.expanded));
        true
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn combined_text(&self) -> &str {
        &self.combined_text
    }

    pub fn preview_text(&self) -> &str {
        &self.page.preview
    }

    pub fn remaining_text(&self) -> &str {
        &self.page.remainder
    }

    pub fn has_overflow(&self) -> bool {
        self.page.has_overflow()
    }

    pub fn remainder_line_count(&self) -> usize {
        self.page.remainder_line_count()
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn blocks(&self) -> &[BlockView] {
        &self.blocks
    }

    pub fn has_pending_tool_result(&self) -> bool {
        self.has_pending
    }

    pub fn subscribe(
        &mut self,
        listener: impl Fn(&GroupEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ToolInvocation, ToolResult};
    use chrono::Utc;
    use indexmap::IndexMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn user_group(text: &str) -> DisplayGroup {
        DisplayGroup::from_message(0, Message::user(Utc::now(), text))
    }

    fn tool_message(invocation: &Arc<ToolInvocation>) -> Message {
        Message::assistant(
            Utc::now(),
            vec![ContentBlock::ToolUse(Arc::clone(invocation))],
        )
    }

    #[test]
    fn user_text_accumulates_with_blank_line_separator() {
        let mut group = user_group("first");
        group.append(Message::user(Utc::now(), "second"));
        assert_eq!(group.combined_text(), "first\n\nsecond");

        // Blank user text contributes nothing.
        group.append(Message::user(Utc::now(), "   "));
        assert_eq!(group.combined_text(), "first\n\nsecond");
    }

    #[test]
    fn nine_line_user_text_overflows() {
        let text = (1..=9)
            .map(|n| format!("line {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        let group = user_group(&text);
        assert!(group.has_overflow());
        assert_eq!(group.remaining_text(), "line 9");
        assert_eq!(group.preview_text().lines().count(), 8);
    }

    #[test]
    fn toggle_expand_requires_overflow_and_keeps_content() {
        let mut short = user_group("Hi");
        assert!(!short.toggle_expand());
        assert!(!short.is_expanded());

        let text = (1..=9)
            .map(|n| format!("line {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut long = user_group(&text);
        let preview = long.preview_text().to_string();
        let remainder = long.remaining_text().to_string();
        assert!(long.toggle_expand());
        assert!(long.is_expanded());
        assert_eq!(long.preview_text(), preview);
        assert_eq!(long.remaining_text(), remainder);
    }

    #[test]
    fn pending_flag_is_or_over_tool_blocks() {
        let first = Arc::new(ToolInvocation::new("read", IndexMap::new()));
        let second = Arc::new(ToolInvocation::new("edit", IndexMap::new()));
        let mut group = DisplayGroup::from_message(0, tool_message(&first));
        group.append(tool_message(&second));
        assert!(group.has_pending_tool_result());

        first.complete(ToolResult::success(None));
        group.synchronize_tools();
        assert!(group.has_pending_tool_result());

        second.complete(ToolResult::success(None));
        group.synchronize_tools();
        assert!(!group.has_pending_tool_result());
    }

    #[test]
    fn pending_change_is_published_once_per_flip() {
        let invocation = Arc::new(ToolInvocation::new("read", IndexMap::new()));
        let mut group = DisplayGroup::from_message(0, tool_message(&invocation));

        let flips = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&flips);
        group.subscribe(move |event| {
            if matches!(event, GroupEvent::PendingChanged(_)) {
                observed.fetch_add(1, Ordering::SeqCst);
            }
        });

        // No underlying change: no recompute, no event.
        group.synchronize_tools();
        assert_eq!(flips.load(Ordering::SeqCst), 0);

        invocation.complete(ToolResult::success(None));
        group.synchronize_tools();
        group.synchronize_tools();
        assert_eq!(flips.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn system_group_materializes_nothing() {
        let mut group =
            DisplayGroup::from_message(0, Message::system(Utc::now(), Some("booted".to_string())));
        group.append(Message::system(Utc::now(), None));
        assert_eq!(group.messages().len(), 2);
        assert!(group.combined_text().is_empty());
        assert!(group.blocks().is_empty());
    }
}
