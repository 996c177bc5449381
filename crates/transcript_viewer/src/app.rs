//! Terminal front-end: owns the event loop and drives the engine.
//!
//! The loop mirrors the usual shape: draw when dirty, then wait on the next
//! wake source (input, working-indicator flip, external redraw request, or
//! the spinner timer while the indicator is on).

use std::io::{self, stdout, Stdout};
use std::panic;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Terminal;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::model::ToolResult;
use crate::render;
use crate::viewmodel::ConversationViewModel;

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

fn init() -> io::Result<Tui> {
    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen)?;
    set_panic_hook();
    Terminal::new(CrosstermBackend::new(stdout()))
}

fn restore() -> io::Result<()> {
    execute!(stdout(), LeaveAlternateScreen)?;
    disable_raw_mode()
}

fn set_panic_hook() {
    let hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        hook(panic_info);
    }));
}

/// Load the conversation, bring up the terminal, and run until quit.
///
/// With `resolve_pending` set (sample mode), a background task plays the
/// role of the external tool-resolution driver: it completes any pending
/// invocations after a short delay and re-synchronizes the engine.
pub async fn run(engine: ConversationViewModel, resolve_pending: bool) -> Result<()> {
    let engine = Arc::new(Mutex::new(engine));
    let (redraw_tx, redraw_rx) = watch::channel(());

    {
        let mut vm = engine.lock().await;
        if let Err(err) = vm.load_conversation().await {
            warn!(%err, "initial load failed");
        }
    }
    if resolve_pending {
        spawn_demo_resolver(Arc::clone(&engine), redraw_tx.clone());
    }

    let mut terminal = init()?;
    let result = event_loop(&engine, &mut terminal, redraw_tx, redraw_rx, resolve_pending).await;
    restore()?;
    result
}

async fn event_loop(
    engine: &Arc<Mutex<ConversationViewModel>>,
    terminal: &mut Tui,
    redraw_tx: watch::Sender<()>,
    mut redraw_rx: watch::Receiver<()>,
    resolve_pending: bool,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut indicator_rx = engine.lock().await.watch_working_indicator();
    let mut needs_redraw = true;
    let mut selected: usize = 0;
    let mut scroll: u16 = 0;
    let mut spinner_frame: usize = 0;

    loop {
        if needs_redraw {
            draw(terminal, engine, selected, scroll, spinner_frame).await?;
            needs_redraw = false;
        }

        let animation_delay = if *indicator_rx.borrow() {
            Duration::from_millis(120)
        } else {
            // Effectively infinite; nothing is animating.
            Duration::from_secs(86400)
        };

        tokio::select! {
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if handle_key(key, engine, &redraw_tx, resolve_pending, &mut selected, &mut scroll).await? {
                            break;
                        }
                        needs_redraw = true;
                    }
                    Some(Ok(Event::Resize(..))) => needs_redraw = true,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => warn!(%err, "terminal event stream error"),
                    None => break,
                }
            }
            changed = indicator_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                needs_redraw = true;
            }
            changed = redraw_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                needs_redraw = true;
            }
            _ = tokio::time::sleep(animation_delay) => {
                spinner_frame = spinner_frame.wrapping_add(1);
                needs_redraw = true;
            }
        }
    }
    Ok(())
}

/// Handle one key press. Returns true to quit.
async fn handle_key(
    key: KeyEvent,
    engine: &Arc<Mutex<ConversationViewModel>>,
    redraw_tx: &watch::Sender<()>,
    resolve_pending: bool,
    selected: &mut usize,
    scroll: &mut u16,
) -> Result<bool> {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Ok(true);
        }
        KeyCode::Char('r') => {
            let mut vm = engine.lock().await;
            if let Err(err) = vm.load_conversation().await {
                warn!(%err, "reload failed");
            }
            *selected = 0;
            *scroll = 0;
            drop(vm);
            if resolve_pending {
                spawn_demo_resolver(Arc::clone(engine), redraw_tx.clone());
            }
        }
        KeyCode::Up | KeyCode::Char('k') => {
            *selected = selected.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            let group_count = engine.lock().await.groups().len();
            if *selected + 1 < group_count {
                *selected += 1;
            }
        }
        KeyCode::Enter | KeyCode::Char('e') => {
            let mut vm = engine.lock().await;
            if !vm.toggle_expand(*selected) {
                debug!(group = *selected, "expand toggle ignored, no overflow");
            }
        }
        KeyCode::PageUp => *scroll = scroll.saturating_sub(10),
        KeyCode::PageDown => *scroll = scroll.saturating_add(10),
        _ => {}
    }
    Ok(false)
}

async fn draw(
    terminal: &mut Tui,
    engine: &Arc<Mutex<ConversationViewModel>>,
    selected: usize,
    scroll: u16,
    spinner_frame: usize,
) -> Result<()> {
    let width = terminal.size()?.width;
    let lines = {
        let vm = engine.lock().await;
        let mut lines = render::transcript_lines(vm.groups(), Some(selected), width);
        if vm.show_working_indicator() {
            lines.push(Line::from(""));
            lines.push(render::working_indicator_line(spinner_frame));
        }
        lines
    };

    terminal.draw(|frame| {
        let [body, footer] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(frame.area());
        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .scroll((scroll, 0)),
            body,
        );
        frame.render_widget(
            Paragraph::new(" q quit · r reload · ↑/↓ select · e expand · PgUp/PgDn scroll")
                .style(Style::default().add_modifier(Modifier::DIM)),
            footer,
        );
    })?;
    Ok(())
}

/// Background stand-in for the external tool-resolution mechanism: waits a
/// beat, completes every invocation that is still pending, then tells the
/// engine to re-synchronize.
fn spawn_demo_resolver(engine: Arc<Mutex<ConversationViewModel>>, redraw_tx: watch::Sender<()>) {
    tokio::spawn(async move {
        let pending = engine.lock().await.pending_invocations();
        if pending.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1500)).await;
        for invocation in pending {
            let result = demo_result(invocation.tool_name());
            if !invocation.complete(result) {
                debug!(tool = invocation.tool_name(), "invocation resolved elsewhere");
            }
        }
        if engine.lock().await.synchronize_tools() {
            let _ = redraw_tx.send(());
        }
    });
}

fn demo_result(tool_name: &str) -> ToolResult {
    match tool_name {
        "read" => ToolResult::success(Some(
            "# Agent UI\n- multi-model routing\n- live browser monitoring".to_string(),
        )),
        "edit" => ToolResult::success(Some("updated 1 file".to_string())),
        _ => ToolResult::success(None),
    }
}
