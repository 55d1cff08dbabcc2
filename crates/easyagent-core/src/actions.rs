use super::events::StreamEvent;
use super::state::ConnectionStatus;
use super::state::TaskId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    Stream(StreamEvent),
    User(UserAction),
    Runtime(RuntimeAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTarget {
    Step(usize),
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    SelectFrame(FrameTarget),
    SelectPrev,
    SelectNext,
    ToggleCollapsed,
    InputChar(char),
    InputBackspace,
    InputPaste(String),
    Submit,
    Stop,
    Acknowledge,
    CopyAnswer,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Send,
    Stop,
    Ack,
}

impl RequestKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Stop => "stop",
            Self::Ack => "acknowledge",
        }
    }
}

/// Outcomes of transport work, fed back into the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeAction {
    TaskAccepted(TaskId),
    RequestFailed { request: RequestKind, message: String },
    ConnectionChanged(ConnectionStatus),
    /// The stream reconnected with no id to resume from.
    StreamGap,
    StreamDecodeFailed { event: String, message: String },
}
