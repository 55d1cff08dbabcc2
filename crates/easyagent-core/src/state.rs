use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::frame::Frame;

pub const DEFAULT_SESSION_ID: &str = "default-session";
pub const FAILURE_PREFIX: &str = "failed: ";
pub const STOPPED_TEXT: &str = "stopped";
pub const THINKING_TEXT: &str = "thinking";
pub const DEFAULT_NOTICE_CAPACITY: usize = 200;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(SessionId);
string_id!(TaskId);
string_id!(StepId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub id: StepId,
    /// 1-based position as reported by the backend, when it sends one.
    pub index: Option<u32>,
    pub text: String,
    pub frame: Option<Frame>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(String),
    Failed(String),
    AwaitingUser { text: String, show_ack: bool },
    Stopped,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded(_) => "completed",
            Self::Failed(_) => "failed",
            Self::AwaitingUser { .. } => "awaiting user",
            Self::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Running,
    Answered(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTag {
    Running,
    Answered,
}

impl ModeTag {
    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Answered => "answered",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Step(usize),
    Live,
}

/// View model for the task currently shown to the user.
///
/// Only the reducer mutates a `RunState`; renderers read it. `selected`
/// ranges over `0..=steps.len()`, where `steps.len()` means the live frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub task_id: TaskId,
    pub user_text: Option<String>,
    pub mode: RunMode,
    pub collapsed: bool,
    pub steps: Vec<Step>,
    pub live_frame: Option<Frame>,
    pub selected: usize,
    /// Set by the stop intent; live frames and new steps for this task are
    /// dropped until a terminal event arrives.
    pub stopping: bool,
    /// Set once the pending user action has been acknowledged.
    pub ack_sent: bool,
}

impl RunState {
    pub fn new(task_id: TaskId, user_text: Option<String>) -> Self {
        Self {
            task_id,
            user_text,
            mode: RunMode::Running,
            collapsed: true,
            steps: Vec::new(),
            live_frame: None,
            selected: 0,
            stopping: false,
            ack_sent: false,
        }
    }

    pub fn mode(&self) -> ModeTag {
        match self.mode {
            RunMode::Running => ModeTag::Running,
            RunMode::Answered(_) => ModeTag::Answered,
        }
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.mode {
            RunMode::Running => None,
            RunMode::Answered(outcome) => Some(outcome),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.mode, RunMode::Running)
    }

    /// Text shown for an answered run. Failures carry `FAILURE_PREFIX`.
    pub fn answer_text(&self) -> Option<Cow<'_, str>> {
        match self.outcome()? {
            Outcome::Succeeded(text) => Some(Cow::Borrowed(text.as_str())),
            Outcome::Failed(text) => Some(Cow::Owned(format!("{FAILURE_PREFIX}{text}"))),
            Outcome::AwaitingUser { text, .. } => Some(Cow::Borrowed(text.as_str())),
            Outcome::Stopped => Some(Cow::Borrowed(STOPPED_TEXT)),
        }
    }

    pub fn awaiting_user(&self) -> bool {
        matches!(
            self.mode,
            RunMode::Answered(Outcome::AwaitingUser { show_ack: true, .. })
        ) && !self.ack_sent
    }

    pub fn live_index(&self) -> usize {
        self.steps.len()
    }

    pub fn selection(&self) -> Selection {
        if self.selected >= self.steps.len() {
            Selection::Live
        } else {
            Selection::Step(self.selected)
        }
    }

    /// Frame for the current selection. A historical step without a
    /// screenshot falls back to the live frame rather than showing nothing.
    pub fn displayed_frame(&self) -> Option<&Frame> {
        match self.selection() {
            Selection::Live => self.live_frame.as_ref(),
            Selection::Step(idx) => self
                .steps
                .get(idx)
                .and_then(|step| step.frame.as_ref())
                .or(self.live_frame.as_ref()),
        }
    }

    /// Collapsed header text: the latest step, or a placeholder before any.
    pub fn headline(&self) -> &str {
        self.steps
            .last()
            .map(|step| step.text.as_str())
            .unwrap_or(THINKING_TEXT)
    }

    pub fn clamp_selection(&mut self) {
        if self.selected > self.steps.len() {
            self.selected = self.steps.len();
        }
    }

    /// One-line summary used when the run is moved into the transcript.
    pub fn summary(&self) -> String {
        match self.answer_text() {
            Some(text) => text.into_owned(),
            None => format!("{} ({} steps)", self.headline(), self.steps.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    User(String),
    Assistant { task_id: TaskId, summary: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Live,
    Reconnecting { attempt: u32 },
    Closed,
}

impl ConnectionStatus {
    pub fn label(self) -> String {
        match self {
            Self::Connecting => "connecting".to_string(),
            Self::Live => "live".to_string(),
            Self::Reconnecting { attempt } => format!("reconnecting (attempt {attempt})"),
            Self::Closed => "closed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

impl NoticeLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSource {
    Stream,
    Request,
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub seq: u64,
    pub level: NoticeLevel,
    pub source: NoticeSource,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, source: NoticeSource, message: impl Into<String>) -> Self {
        Self {
            seq: 0,
            level,
            source,
            message: message.into(),
        }
    }
}

/// Bounded FIFO of transient notices; sequence numbers keep increasing
/// across evictions.
#[derive(Debug, Clone)]
pub struct NoticeBuffer {
    cap: usize,
    next_seq: u64,
    buf: VecDeque<Notice>,
}

impl NoticeBuffer {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            next_seq: 1,
            buf: VecDeque::with_capacity(cap),
        }
    }

    pub fn append(&mut self, mut notice: Notice) {
        notice.seq = self.next_seq;
        self.next_seq += 1;

        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(notice);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.buf.iter()
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.buf.back()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Everything one client instance knows about its session.
#[derive(Debug, Clone)]
pub struct ClientState {
    pub session_id: SessionId,
    pub current_task_id: Option<TaskId>,
    pub run: Option<RunState>,
    pub transcript: Vec<TranscriptEntry>,
    pub notices: NoticeBuffer,
    pub connection: ConnectionStatus,
    pub input: String,
}

impl ClientState {
    pub fn new(session_id: SessionId) -> Self {
        Self::with_notice_capacity(session_id, DEFAULT_NOTICE_CAPACITY)
    }

    pub fn with_notice_capacity(session_id: SessionId, capacity: usize) -> Self {
        Self {
            session_id,
            current_task_id: None,
            run: None,
            transcript: Vec::new(),
            notices: NoticeBuffer::new(capacity),
            connection: ConnectionStatus::Connecting,
            input: String::new(),
        }
    }

    pub fn notify(&mut self, level: NoticeLevel, source: NoticeSource, message: impl Into<String>) {
        self.notices.append(Notice::new(level, source, message));
    }
}
