//! Drops display-irrelevant messages before grouping.

use crate::model::{ContentBlock, Message, MessageKind};

/// Lazily filter a transcript down to displayable messages.
///
/// A user turn whose non-empty block list is nothing but tool-use blocks is
/// a synthetic echo of tool-call inputs, carrying no human-authored content;
/// it is dropped. Everything else passes through unchanged, in order.
pub fn display_messages<I>(messages: I) -> impl Iterator<Item = Message>
where
    I: IntoIterator<Item = Message>,
{
    messages.into_iter().filter(|message| !is_tool_echo(message))
}

fn is_tool_echo(message: &Message) -> bool {
    message.kind == MessageKind::User
        && !message.blocks.is_empty()
        && message.blocks.iter().all(ContentBlock::is_tool_use)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolInvocation;
    use chrono::Utc;
    use indexmap::IndexMap;
    use std::sync::Arc;

    fn tool_block() -> ContentBlock {
        ContentBlock::ToolUse(Arc::new(ToolInvocation::new("read", IndexMap::new())))
    }

    fn tool_echo_user() -> Message {
        Message {
            blocks: vec![tool_block()],
            text: None,
            ..Message::user(Utc::now(), "")
        }
    }

    #[test]
    fn drops_tool_echo_user_messages() {
        let messages = vec![
            Message::user(Utc::now(), "Hi"),
            tool_echo_user(),
            Message::assistant(Utc::now(), Vec::new()),
        ];
        let kept: Vec<Message> = display_messages(messages).collect();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].kind, MessageKind::User);
        assert_eq!(kept[1].kind, MessageKind::Assistant);
    }

    #[test]
    fn keeps_user_messages_with_mixed_content() {
        let mut mixed = Message::user(Utc::now(), "look at this");
        mixed.blocks.push(tool_block());
        // Text alongside tool blocks means human-authored content.
        mixed.blocks.push(ContentBlock::Text {
            markdown: "note".to_string(),
        });
        let kept: Vec<Message> = display_messages(vec![mixed]).collect();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn only_user_kind_is_filtered() {
        let mut error = Message::error(Utc::now(), "");
        error.blocks.push(tool_block());
        let kept: Vec<Message> = display_messages(vec![error]).collect();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn filtering_is_idempotent() {
        let messages = vec![
            Message::user(Utc::now(), "Hi"),
            tool_echo_user(),
            Message::error(Utc::now(), "boom"),
        ];
        let once: Vec<Message> = display_messages(messages).collect();
        let twice: Vec<Message> = display_messages(once.clone()).collect();
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.text, b.text);
        }
    }
}
