use std::io;
use std::time::Duration;

use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;

use easyagent_client::BackendApi;
use easyagent_core::{
    ClientAction, ClientEffect, ClientState, ConnectionStatus, FrameTarget, NoticeLevel,
    NoticeSource, Outcome, RunState, Selection, TranscriptEntry, UserAction,
};

use crate::session::Session;
use crate::view;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const VISIBLE_NOTICES: usize = 2;

struct TuiGuard;

impl Drop for TuiGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            io::stdout(),
            LeaveAlternateScreen,
            DisableBracketedPaste,
            crossterm::cursor::Show
        );
    }
}

pub fn run<B: BackendApi + 'static>(session: Session<B>) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableBracketedPaste,
        crossterm::cursor::Hide
    )?;
    let _guard = TuiGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut session = session;
    run_app(&mut terminal, &mut session).map_err(|e| e.into())
}

#[derive(Clone, Copy)]
struct UiPalette {
    accent: Color,
    success: Color,
    warning: Color,
    danger: Color,
    muted: Color,
    border: Color,
    selected_bg: Color,
}

const PALETTE: UiPalette = UiPalette {
    accent: Color::Cyan,
    success: Color::Green,
    warning: Color::Yellow,
    danger: Color::Red,
    muted: Color::DarkGray,
    border: Color::Gray,
    selected_bg: Color::DarkGray,
};

/// Keyboard binding for the run view. Plain characters go to the input line.
pub fn key_action(key: KeyEvent) -> Option<UserAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(UserAction::Quit),
            KeyCode::Char('s') => Some(UserAction::Stop),
            KeyCode::Char('a') => Some(UserAction::Acknowledge),
            KeyCode::Char('o') => Some(UserAction::ToggleCollapsed),
            KeyCode::Char('y') => Some(UserAction::CopyAnswer),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Esc => Some(UserAction::Quit),
        KeyCode::Enter => Some(UserAction::Submit),
        KeyCode::Backspace => Some(UserAction::InputBackspace),
        KeyCode::Left => Some(UserAction::SelectPrev),
        KeyCode::Right => Some(UserAction::SelectNext),
        KeyCode::Home => Some(UserAction::SelectFrame(FrameTarget::Step(0))),
        KeyCode::End => Some(UserAction::SelectFrame(FrameTarget::Live)),
        KeyCode::Char(c) => Some(UserAction::InputChar(c)),
        _ => None,
    }
}

/// Carry out the effects the session handed back. Returns true on exit.
fn apply_local_effects(state: &mut ClientState, effects: Vec<ClientEffect>) -> bool {
    let mut exit = false;
    for effect in effects {
        match effect {
            ClientEffect::CopyToClipboard(text) => {
                match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text)) {
                    Ok(()) => state.notify(NoticeLevel::Info, NoticeSource::Client, "answer copied"),
                    Err(err) => state.notify(
                        NoticeLevel::Warn,
                        NoticeSource::Client,
                        format!("clipboard unavailable: {err}"),
                    ),
                }
            }
            ClientEffect::Exit => exit = true,
            ClientEffect::RequestFrame
            | ClientEffect::Send { .. }
            | ClientEffect::Stop { .. }
            | ClientEffect::Ack { .. } => {}
        }
    }
    exit
}

fn run_app<T: Backend, B: BackendApi + 'static>(
    terminal: &mut Terminal<T>,
    session: &mut Session<B>,
) -> io::Result<()> {
    let mut tick: usize = 0;
    loop {
        let effects = session.pump();
        if apply_local_effects(&mut session.state, effects) {
            return Ok(());
        }

        terminal.draw(|f| ui(f, &session.state, tick))?;
        tick = tick.wrapping_add(1);

        if event::poll(Duration::from_millis(50))? {
            let action = match event::read()? {
                Event::Key(key) => key_action(key),
                Event::Paste(text) => Some(UserAction::InputPaste(text)),
                _ => None,
            };
            if let Some(action) = action {
                let effects = session.dispatch(ClientAction::User(action));
                if apply_local_effects(&mut session.state, effects) {
                    return Ok(());
                }
            }
        }
    }
}

fn spinner(tick: usize) -> &'static str {
    SPINNER[(tick / 2) % SPINNER.len()]
}

fn connection_color(status: ConnectionStatus, palette: UiPalette) -> Color {
    match status {
        ConnectionStatus::Live => palette.success,
        ConnectionStatus::Connecting | ConnectionStatus::Reconnecting { .. } => palette.warning,
        ConnectionStatus::Closed => palette.danger,
    }
}

fn notice_color(level: NoticeLevel, palette: UiPalette) -> Color {
    match level {
        NoticeLevel::Info => palette.muted,
        NoticeLevel::Warn => palette.warning,
        NoticeLevel::Error => palette.danger,
    }
}

fn bordered(title: &str, palette: UiPalette) -> Block<'_> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
}

fn ui(f: &mut ratatui::Frame, state: &ClientState, tick: usize) {
    let palette = PALETTE;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),                            // Header
            Constraint::Min(0),                               // Content
            Constraint::Length(VISIBLE_NOTICES as u16 + 2),   // Notices
            Constraint::Length(3),                            // Input
            Constraint::Length(1),                            // Key hints
        ])
        .split(f.area());

    render_header(f, chunks[0], state, tick, palette);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(chunks[1]);
    render_transcript(f, columns[0], state, palette);
    match &state.run {
        Some(run) => render_run(f, columns[1], run, tick, palette),
        None => {
            let p = Paragraph::new("No task yet. Type a prompt and press Enter.")
                .style(Style::default().fg(palette.muted))
                .alignment(Alignment::Center)
                .block(bordered("Run", palette));
            f.render_widget(p, columns[1]);
        }
    }

    render_notices(f, chunks[2], state, palette);
    render_input(f, chunks[3], state, palette);
    render_key_hints(f, chunks[4], state, palette);
}

fn render_header(f: &mut ratatui::Frame, area: Rect, state: &ClientState, tick: usize, palette: UiPalette) {
    let activity = match &state.run {
        Some(run) if run.stopping => format!("{} stopping", spinner(tick)),
        Some(run) if run.is_running() => format!("{} running", spinner(tick)),
        Some(run) => run.outcome().map_or("idle", Outcome::label).to_string(),
        None => "idle".to_string(),
    };
    let task = state
        .current_task_id
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string);
    let line = Line::from(vec![
        Span::styled("EasyAgent", Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)),
        Span::styled(" | session:", Style::default().fg(palette.muted)),
        Span::raw(state.session_id.to_string()),
        Span::styled(" | stream:", Style::default().fg(palette.muted)),
        Span::styled(
            state.connection.label(),
            Style::default().fg(connection_color(state.connection, palette)),
        ),
        Span::styled(" | task:", Style::default().fg(palette.muted)),
        Span::raw(task),
        Span::styled(" | ", Style::default().fg(palette.muted)),
        Span::raw(activity),
    ]);
    f.render_widget(Paragraph::new(line).block(bordered("", palette)), area);
}

fn transcript_lines(state: &ClientState, palette: UiPalette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for entry in &state.transcript {
        match entry {
            TranscriptEntry::User(text) => lines.push(Line::from(vec![
                Span::styled("you ", Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)),
                Span::raw(text.clone()),
            ])),
            TranscriptEntry::Assistant { task_id, summary } => lines.push(Line::from(vec![
                Span::styled(format!("{task_id} "), Style::default().fg(palette.muted)),
                Span::raw(summary.clone()),
            ])),
        }
    }
    lines
}

fn render_transcript(f: &mut ratatui::Frame, area: Rect, state: &ClientState, palette: UiPalette) {
    let lines = transcript_lines(state, palette);
    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(inner_height) as u16;
    let p = Paragraph::new(lines)
        .block(bordered("Transcript", palette))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(p, area);
}

fn run_card_lines(run: &RunState, tick: usize, palette: UiPalette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(prompt) = &run.user_text {
        lines.push(Line::from(vec![
            Span::styled("prompt ", Style::default().fg(palette.muted)),
            Span::raw(prompt.clone()),
        ]));
    }

    let marker = if run.is_running() { spinner(tick) } else { "•" };
    let toggle = if run.collapsed { "▸" } else { "▾" };
    lines.push(Line::from(vec![
        Span::styled(format!("{toggle} {marker} "), Style::default().fg(palette.accent)),
        Span::raw(run.headline().to_string()),
        Span::styled(
            format!("  ({} steps)", run.steps.len()),
            Style::default().fg(palette.muted),
        ),
    ]));

    if run.stopping {
        lines.push(Line::from(Span::styled(
            "stop requested, waiting for the backend",
            Style::default().fg(palette.warning),
        )));
    }

    if let Some(answer) = run.answer_text() {
        let color = match run.outcome() {
            Some(Outcome::Failed(_)) => palette.danger,
            Some(Outcome::AwaitingUser { .. }) => palette.warning,
            Some(Outcome::Stopped) => palette.muted,
            _ => palette.success,
        };
        lines.push(Line::from(Span::styled(
            answer.into_owned(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        if run.awaiting_user() {
            lines.push(Line::from(Span::styled(
                "Finish the step yourself, then press Ctrl-A to continue.",
                Style::default().fg(palette.warning),
            )));
        } else if run.ack_sent {
            lines.push(Line::from(Span::styled(
                "acknowledged",
                Style::default().fg(palette.muted),
            )));
        }
    }
    lines
}

fn render_run(f: &mut ratatui::Frame, area: Rect, run: &RunState, tick: usize, palette: UiPalette) {
    let card = run_card_lines(run, tick, palette);
    let card_height = card.len() as u16 + 2;
    let mut constraints = vec![Constraint::Length(card_height)];
    if !run.collapsed {
        constraints.push(Constraint::Min(3));
    }
    constraints.push(Constraint::Length(4));
    if run.collapsed {
        constraints.push(Constraint::Min(0));
    }
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let border = match run.outcome() {
        Some(Outcome::Failed(_)) => palette.danger,
        Some(Outcome::AwaitingUser { .. }) => palette.warning,
        Some(_) => palette.success,
        None => palette.border,
    };
    let card = Paragraph::new(card).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(format!("Run {} [{}]", run.task_id, run.mode().label()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border)),
    );
    f.render_widget(card, sections[0]);

    let frame_idx = if run.collapsed {
        1
    } else {
        render_timeline(f, sections[1], run, palette);
        2
    };
    render_frame_panel(f, sections[frame_idx], run, palette);
}

fn render_timeline(f: &mut ratatui::Frame, area: Rect, run: &RunState, palette: UiPalette) {
    let mut items: Vec<ListItem> = run
        .steps
        .iter()
        .enumerate()
        .map(|(position, step)| {
            let mark = if step.frame.is_some() { "●" } else { "○" };
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{mark} {:>2} ", view::step_number(step, position)),
                    Style::default().fg(palette.muted),
                ),
                Span::raw(step.text.clone()),
            ]))
        })
        .collect();
    items.push(ListItem::new(Line::from(Span::styled(
        "◉ live",
        Style::default().fg(palette.accent),
    ))));

    let mut list_state = ListState::default();
    list_state.select(Some(run.selected));
    let list = List::new(items)
        .block(bordered("Steps", palette))
        .highlight_style(
            Style::default()
                .bg(palette.selected_bg)
                .add_modifier(Modifier::BOLD),
        );
    f.render_stateful_widget(list, area, &mut list_state);
}

fn frame_panel_lines(run: &RunState, palette: UiPalette) -> Vec<Line<'static>> {
    let mut detail = view::frame_label(run.displayed_frame());
    if let Selection::Step(idx) = run.selection() {
        if run.steps[idx].frame.is_none() && run.live_frame.is_some() {
            detail.push_str(" (no screenshot for this step, showing live)");
        }
    }
    vec![
        Line::from(vec![
            Span::styled(
                format!("{} ", view::selection_label(run)),
                Style::default().fg(palette.accent),
            ),
            Span::raw(detail),
        ]),
        Line::from(Span::styled(
            view::scrubber(run),
            Style::default().fg(palette.muted),
        )),
    ]
}

fn render_frame_panel(f: &mut ratatui::Frame, area: Rect, run: &RunState, palette: UiPalette) {
    let p = Paragraph::new(frame_panel_lines(run, palette)).block(bordered("Frame", palette));
    f.render_widget(p, area);
}

fn render_notices(f: &mut ratatui::Frame, area: Rect, state: &ClientState, palette: UiPalette) {
    let skip = state.notices.len().saturating_sub(VISIBLE_NOTICES);
    let lines: Vec<Line> = state
        .notices
        .iter()
        .skip(skip)
        .map(|notice| {
            Line::from(vec![
                Span::styled(
                    format!("{:<5} ", notice.level.label()),
                    Style::default().fg(notice_color(notice.level, palette)),
                ),
                Span::raw(notice.message.clone()),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines).block(bordered("Notices", palette)), area);
}

fn render_input(f: &mut ratatui::Frame, area: Rect, state: &ClientState, palette: UiPalette) {
    let line = Line::from(vec![
        Span::styled("> ", Style::default().fg(palette.accent)),
        Span::raw(state.input.clone()),
        Span::styled("▏", Style::default().fg(palette.accent)),
    ]);
    f.render_widget(Paragraph::new(line).block(bordered("Prompt", palette)), area);
}

fn render_key_hints(f: &mut ratatui::Frame, area: Rect, state: &ClientState, palette: UiPalette) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(palette.accent));
    let label = |l: &'static str| Span::styled(l, Style::default().fg(palette.muted));
    let mut spans = vec![key("Enter"), label(" send  ")];
    if state.run.as_ref().is_some_and(RunState::is_running) {
        spans.extend([key("^S"), label(" stop  ")]);
    }
    if state.run.as_ref().is_some_and(RunState::awaiting_user) {
        spans.extend([key("^A"), label(" continue  ")]);
    }
    spans.extend([
        key("^O"),
        label(" steps  "),
        key("←/→"),
        label(" scrub  "),
        key("End"),
        label(" live  "),
        key("^Y"),
        label(" copy  "),
        Span::styled("Esc", Style::default().fg(palette.warning)),
        label(" quit"),
    ]);
    f.render_widget(Paragraph::new(Line::from(spans)).alignment(Alignment::Center), area);
}
