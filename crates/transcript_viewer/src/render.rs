//! Turns display groups into styled terminal lines.
//!
//! This is the rendering collaborator, not the engine: it reads derived
//! view-state and picks glyphs and colors per message kind and tool content.
//! System groups produce no lines at all.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use tui_markdown as md;

use crate::model::{MessageKind, ToolStatus};
use crate::viewmodel::group::{BlockView, DisplayGroup};
use crate::viewmodel::tool::{ResultView, ToolBlockView, ToolContent};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Render a whole group list, separated by blank lines. `selected` marks one
/// group with a leading bar.
pub fn transcript_lines(
    groups: &[DisplayGroup],
    selected: Option<usize>,
    width: u16,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (index, group) in groups.iter().enumerate() {
        let mut group_lines = group_lines(group, width);
        if group_lines.is_empty() {
            continue;
        }
        if selected == Some(index) {
            if let Some(first) = group_lines.first_mut() {
                first
                    .spans
                    .insert(0, Span::styled("▎", Style::default().fg(Color::Cyan)));
            }
        }
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        lines.append(&mut group_lines);
    }
    lines
}

/// Render one group according to its message kind.
pub fn group_lines(group: &DisplayGroup, width: u16) -> Vec<Line<'static>> {
    match group.kind() {
        MessageKind::User => paged_text_lines(group, width, user_line),
        MessageKind::Error => paged_text_lines(group, width, error_line),
        MessageKind::Assistant => assistant_lines(group),
        // No template for system turns.
        MessageKind::System => Vec::new(),
    }
}

pub fn working_indicator_line(frame: usize) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            SPINNER_FRAMES[frame % SPINNER_FRAMES.len()],
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(" working…", Style::default().add_modifier(Modifier::DIM)),
    ])
}

/// Preview lines, then either the remainder (expanded) or a fold hint.
fn paged_text_lines(
    group: &DisplayGroup,
    width: u16,
    to_line: fn(Span<'static>, String) -> Line<'static>,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    push_prefixed_text(group.preview_text(), width, to_line, true, &mut lines);
    if !group.has_overflow() {
        return lines;
    }
    if group.is_expanded() {
        push_prefixed_text(group.remaining_text(), width, to_line, false, &mut lines);
        lines.push(Line::styled(
            "  ▲ collapse (e)",
            Style::default().add_modifier(Modifier::DIM),
        ));
    } else {
        lines.push(Line::styled(
            format!("  … +{} more lines (e)", group.remainder_line_count()),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }
    lines
}

fn user_line(prefix: Span<'static>, content: String) -> Line<'static> {
    Line::from(vec![prefix, Span::raw(content)])
}

fn error_line(prefix: Span<'static>, content: String) -> Line<'static> {
    Line::from(vec![
        prefix,
        Span::styled(content, Style::default().fg(Color::LightRed)),
    ])
}

/// Wrap logical lines to the render width, prefixing the first visual line
/// with `› ` (aligned continuation otherwise).
fn push_prefixed_text(
    content: &str,
    width: u16,
    to_line: fn(Span<'static>, String) -> Line<'static>,
    first_carries_prefix: bool,
    lines: &mut Vec<Line<'static>>,
) {
    if content.is_empty() {
        return;
    }
    let wrap_width = if width > 3 {
        // prefix "› " = 2, plus 1 right margin
        (width - 3) as usize
    } else {
        width.max(1) as usize
    };
    let opts = textwrap::Options::new(wrap_width).wrap_algorithm(textwrap::WrapAlgorithm::FirstFit);
    let prefix_style = Style::default()
        .add_modifier(Modifier::BOLD)
        .add_modifier(Modifier::DIM);

    let mut first = first_carries_prefix;
    for logical in content.split('\n') {
        if logical.is_empty() {
            let prefix = take_prefix(&mut first, prefix_style);
            lines.push(to_line(prefix, String::new()));
            continue;
        }
        for wrapped in textwrap::wrap(logical, &opts) {
            let prefix = take_prefix(&mut first, prefix_style);
            lines.push(to_line(prefix, wrapped.into_owned()));
        }
    }
}

fn take_prefix(first: &mut bool, prefix_style: Style) -> Span<'static> {
    if *first {
        *first = false;
        Span::styled("› ", prefix_style)
    } else {
        Span::raw("  ")
    }
}

fn assistant_lines(group: &DisplayGroup) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for block in group.blocks() {
        let block_start = lines.len();
        match block {
            BlockView::Text { markdown } => {
                for mut line in markdown_lines(markdown) {
                    line.spans.insert(0, Span::raw("  "));
                    lines.push(line);
                }
            }
            BlockView::Thinking { markdown } => {
                for line in markdown_lines(markdown) {
                    let mut spans: Vec<Span<'static>> = vec![Span::raw("  ")];
                    spans.extend(line.spans.into_iter().map(|span| {
                        let style = span
                            .style
                            .fg(Color::DarkGray)
                            .add_modifier(Modifier::DIM)
                            .add_modifier(Modifier::ITALIC);
                        Span::styled(span.content, style)
                    }));
                    lines.push(Line::from(spans));
                }
            }
            BlockView::Json { json } => {
                for raw in json.lines() {
                    lines.push(Line::styled(
                        format!("  {raw}"),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
            }
            BlockView::ToolUse(tool) => {
                push_tool_lines(tool, &mut lines);
            }
        }
        // Single blank line between blocks.
        if lines.len() > block_start && block_start > 0 {
            lines.insert(block_start, Line::from(""));
        }
    }
    lines
}

/// `● name` header colored by status, then content-kind-specific detail.
fn push_tool_lines(tool: &ToolBlockView, lines: &mut Vec<Line<'static>>) {
    let result = tool.result();
    lines.push(Line::from(vec![
        Span::styled("● ", Style::default().fg(result_color(result))),
        Span::styled(
            tool.display_name().to_string(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]));

    match tool.content() {
        ToolContent::Read(read) => {
            push_detail_line(lines, "path", read.path.as_deref());
            push_output_lines(lines, read.preview.as_deref());
        }
        ToolContent::Edit(edit) => {
            push_detail_line(lines, "path", edit.path.as_deref());
            push_output_lines(lines, edit.diff.as_deref());
        }
        ToolContent::Task(task) => {
            for child in &task.children {
                lines.push(Line::from(vec![
                    Span::styled("  ⤷ ", Style::default().fg(Color::DarkGray)),
                    Span::raw(child.summary.clone()),
                ]));
            }
        }
        ToolContent::Generic(generic) => {
            for (name, value) in &generic.arguments {
                let rendered = match value.as_str() {
                    Some(text) => text.to_string(),
                    None => value.to_string(),
                };
                push_detail_line(lines, name, Some(&truncate(&rendered, 100)));
            }
            push_output_lines(lines, generic.output.as_deref());
        }
    }

    if result.is_pending() {
        lines.push(Line::styled(
            "  running…",
            Style::default().add_modifier(Modifier::DIM),
        ));
    } else if result.is_error {
        if let Some(message) = result.error_message.as_deref() {
            lines.push(Line::styled(
                format!("  {message}"),
                Style::default().fg(Color::LightRed),
            ));
        }
    }
}

fn result_color(result: &ResultView) -> Color {
    match (result.status, result.is_error) {
        (ToolStatus::Pending, _) => Color::Yellow,
        (ToolStatus::Completed, false) => Color::Green,
        (ToolStatus::Completed, true) => Color::Red,
    }
}

fn push_detail_line(lines: &mut Vec<Line<'static>>, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        lines.push(Line::styled(
            format!("  {name}: {value}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
}

fn push_output_lines(lines: &mut Vec<Line<'static>>, output: Option<&str>) {
    if let Some(output) = output {
        for raw in output.lines() {
            lines.push(Line::from(format!("  {raw}")));
        }
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let cut: String = value.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}

fn markdown_lines(source: &str) -> Vec<Line<'static>> {
    let text = md::from_str(source);
    let mut lines: Vec<Line<'static>> = text.lines.iter().map(line_to_static).collect();
    if lines.is_empty() {
        lines.push(Line::from(""));
    }
    lines
}

fn line_to_static(line: &Line<'_>) -> Line<'static> {
    Line {
        style: line.style,
        alignment: line.alignment,
        spans: line
            .spans
            .iter()
            .map(|span| Span::styled(span.content.to_string(), span.style))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;
    use chrono::Utc;

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn system_groups_render_nothing() {
        let group =
            DisplayGroup::from_message(0, Message::system(Utc::now(), Some("boot".to_string())));
        assert!(group_lines(&group, 80).is_empty());
    }

    #[test]
    fn user_group_gets_prompt_prefix() {
        let group = DisplayGroup::from_message(0, Message::user(Utc::now(), "Hi"));
        let lines = group_lines(&group, 80);
        assert_eq!(lines.len(), 1);
        assert_eq!(line_text(&lines[0]), "› Hi");
    }

    #[test]
    fn collapsed_overflow_shows_fold_hint() {
        let text = (1..=10)
            .map(|n| format!("line {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut group = DisplayGroup::from_message(0, Message::user(Utc::now(), &text));

        let collapsed = group_lines(&group, 80);
        assert_eq!(collapsed.len(), 9);
        assert!(line_text(&collapsed[8]).contains("+2 more lines"));

        group.toggle_expand();
        let expanded = group_lines(&group, 80);
        assert!(line_text(&expanded[8]).ends_with("line 9"));
        assert!(line_text(&expanded[9]).ends_with("line 10"));
    }
}
