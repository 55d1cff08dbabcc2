use std::io::BufRead;
use std::io::Write;
use std::sync::mpsc;
use std::time::Duration;

use crossterm::style::Stylize;

use easyagent_client::BackendApi;
use easyagent_core::ClientAction;
use easyagent_core::ClientEffect;
use easyagent_core::ClientState;
use easyagent_core::ConnectionStatus;
use easyagent_core::NoticeLevel;
use easyagent_core::NoticeSource;
use easyagent_core::Outcome;
use easyagent_core::TaskId;
use easyagent_core::UserAction;

use crate::session::Session;
use crate::view;

const POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Status,
    Task,
    Step,
    Answer,
    Failure,
    Notice(NoticeLevel),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainLine {
    pub kind: LineKind,
    pub text: String,
}

impl PlainLine {
    fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    fn styled(&self) -> String {
        match self.kind {
            LineKind::Status => self.text.as_str().dark_grey().to_string(),
            LineKind::Task => self.text.as_str().cyan().bold().to_string(),
            LineKind::Step => self.text.clone(),
            LineKind::Answer => self.text.as_str().green().to_string(),
            LineKind::Failure => self.text.as_str().red().bold().to_string(),
            LineKind::Notice(NoticeLevel::Info) => self.text.as_str().dark_grey().to_string(),
            LineKind::Notice(NoticeLevel::Warn) => self.text.as_str().yellow().to_string(),
            LineKind::Notice(NoticeLevel::Error) => self.text.as_str().red().to_string(),
        }
    }
}

/// Tracks what has already been printed so each state change is reported once.
#[derive(Debug, Default)]
pub struct PlainPrinter {
    task: Option<TaskId>,
    steps: usize,
    answer: Option<String>,
    last_notice: u64,
    connection: Option<ConnectionStatus>,
}

impl PlainPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&mut self, state: &ClientState) -> Vec<PlainLine> {
        let mut out = Vec::new();

        if self.connection != Some(state.connection) {
            self.connection = Some(state.connection);
            out.push(PlainLine::new(
                LineKind::Status,
                format!("-- stream {}", state.connection.label()),
            ));
        }

        if let Some(run) = &state.run {
            if self.task.as_ref() != Some(&run.task_id) {
                self.task = Some(run.task_id.clone());
                self.steps = 0;
                self.answer = None;
                let prompt = run.user_text.as_deref().unwrap_or("(no prompt)");
                out.push(PlainLine::new(
                    LineKind::Task,
                    format!("task {}: {prompt}", run.task_id),
                ));
            }
            for (position, step) in run.steps.iter().enumerate().skip(self.steps) {
                out.push(PlainLine::new(
                    LineKind::Step,
                    format!(
                        "  [{}] {} ({})",
                        view::step_number(step, position),
                        step.text,
                        view::frame_label(step.frame.as_ref())
                    ),
                ));
            }
            self.steps = run.steps.len();

            let answer = run.answer_text().map(|text| text.into_owned());
            if answer.is_some() && answer != self.answer {
                let kind = match run.outcome() {
                    Some(Outcome::Failed(_)) => LineKind::Failure,
                    _ => LineKind::Answer,
                };
                let mut text = format!("=> {}", answer.as_deref().unwrap_or_default());
                if run.awaiting_user() {
                    text.push_str("  (type /ack when done)");
                }
                out.push(PlainLine::new(kind, text));
            }
            self.answer = answer;
        }

        for notice in state.notices.iter().filter(|n| n.seq > self.last_notice) {
            // Connection changes are already reported above.
            if notice.source == NoticeSource::Stream && notice.message.starts_with("stream ") {
                continue;
            }
            out.push(PlainLine::new(
                LineKind::Notice(notice.level),
                format!("!! {}: {}", notice.level.label(), notice.message),
            ));
        }
        if let Some(latest) = state.notices.latest() {
            self.last_notice = latest.seq;
        }
        out
    }
}

/// Map one line of stdin to an action. Unknown slash commands yield `Err`.
pub fn parse_command(line: &str) -> Result<Option<Vec<UserAction>>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let actions = match line {
        "/stop" => vec![UserAction::Stop],
        "/ack" => vec![UserAction::Acknowledge],
        "/prev" => vec![UserAction::SelectPrev],
        "/next" => vec![UserAction::SelectNext],
        "/quit" | "/exit" => vec![UserAction::Quit],
        other if other.starts_with('/') => return Err(format!("unknown command `{other}`")),
        text => vec![UserAction::InputPaste(text.to_string()), UserAction::Submit],
    };
    Ok(Some(actions))
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn is_final(state: &ClientState) -> bool {
    state
        .run
        .as_ref()
        .is_some_and(|run| !run.is_running() && !run.awaiting_user())
}

/// Release the queued prompt once the stream is live. The backend only
/// delivers events to subscribers that already exist.
fn take_ready_prompt(pending: &mut Option<String>, state: &ClientState) -> Option<String> {
    if state.connection == ConnectionStatus::Live {
        pending.take()
    } else {
        None
    }
}

pub fn run<B: BackendApi + 'static>(
    mut session: Session<B>,
    send: Option<String>,
    exit_on_answer: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut printer = PlainPrinter::new();
    let mut stdout = std::io::stdout();
    let stdin = spawn_stdin_reader();

    let mut pending = send;

    loop {
        let effects = session.wait(POLL);
        let mut exit = effects.contains(&ClientEffect::Exit);

        if let Some(text) = take_ready_prompt(&mut pending, &session.state) {
            tracing::debug!("stream live; sending queued prompt");
            session.dispatch(ClientAction::User(UserAction::InputPaste(text)));
            session.dispatch(ClientAction::User(UserAction::Submit));
        }

        while let Ok(line) = stdin.try_recv() {
            match parse_command(&line) {
                Ok(Some(actions)) => {
                    for action in actions {
                        exit |= session
                            .dispatch(ClientAction::User(action))
                            .contains(&ClientEffect::Exit);
                    }
                }
                Ok(None) => {}
                Err(message) => writeln!(stdout, "{}", message.as_str().yellow())?,
            }
        }

        for line in printer.lines(&session.state) {
            writeln!(stdout, "{}", line.styled())?;
        }
        stdout.flush()?;

        if exit {
            return Ok(());
        }
        if exit_on_answer && pending.is_none() && is_final(&session.state) {
            tracing::info!("run answered; exiting");
            return Ok(());
        }
        if session.state.connection == ConnectionStatus::Closed {
            return Err("event stream closed".into());
        }
    }
}
