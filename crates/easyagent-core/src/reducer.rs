use super::actions::ClientAction;
use super::actions::FrameTarget;
use super::actions::RequestKind;
use super::actions::RuntimeAction;
use super::actions::UserAction;
use super::events::StreamEvent;
use super::events::TaskStartedPayload;
use super::frame::Frame;
use super::state::ClientState;
use super::state::ConnectionStatus;
use super::state::NoticeLevel;
use super::state::NoticeSource;
use super::state::Outcome;
use super::state::RunMode;
use super::state::RunState;
use super::state::SessionId;
use super::state::Step;
use super::state::TaskId;
use super::state::TranscriptEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEffect {
    Send { session_id: SessionId, text: String },
    Stop { task_id: TaskId },
    Ack { task_id: TaskId },
    CopyToClipboard(String),
    RequestFrame,
    Exit,
}

impl ClientEffect {
    /// Effects that must go out over the network.
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Send { .. } | Self::Stop { .. } | Self::Ack { .. })
    }
}

/// Fold one action into the client state. Never performs I/O; the returned
/// effects describe what the caller should do next.
pub fn reduce(state: &mut ClientState, action: ClientAction) -> Vec<ClientEffect> {
    let effects = match action {
        ClientAction::Stream(event) => {
            if reduce_stream(state, event) {
                vec![ClientEffect::RequestFrame]
            } else {
                Vec::new()
            }
        }
        ClientAction::User(user) => reduce_user(state, user),
        ClientAction::Runtime(runtime) => {
            reduce_runtime(state, runtime);
            Vec::new()
        }
    };

    if let Some(run) = state.run.as_mut() {
        run.clamp_selection();
    }
    effects
}

fn reduce_stream(state: &mut ClientState, event: StreamEvent) -> bool {
    match event {
        StreamEvent::TaskStarted(payload) => {
            start_run(state, payload);
            true
        }
        event => {
            let Some(run) = state.run.as_mut() else {
                tracing::debug!(event = event.name(), "no active run; event ignored");
                return false;
            };
            if let Some(task_id) = event.task_id() {
                if *task_id != run.task_id {
                    tracing::debug!(
                        event = event.name(),
                        event_task = %task_id,
                        active_task = %run.task_id,
                        "event for another task ignored"
                    );
                    return false;
                }
            }
            apply_to_run(run, event)
        }
    }
}

fn start_run(state: &mut ClientState, payload: TaskStartedPayload) {
    if let Some(previous) = state.run.take() {
        state.transcript.push(TranscriptEntry::Assistant {
            summary: previous.summary(),
            task_id: previous.task_id,
        });
    }
    state.current_task_id = Some(payload.task_id.clone());
    state.run = Some(RunState::new(payload.task_id, payload.user_text));
}

fn apply_to_run(run: &mut RunState, event: StreamEvent) -> bool {
    match event {
        StreamEvent::ScreenLive(payload) => {
            if run.stopping {
                return false;
            }
            run.live_frame = Some(Frame::new(payload.frame.data_url));
            run.selected = run.live_index();
        }
        StreamEvent::ProgressAppend(payload) => {
            if run.stopping {
                return false;
            }
            run.steps.push(Step::from(payload.step));
            run.mode = RunMode::Running;
            run.selected = run.live_index();
        }
        StreamEvent::TaskAwaitingUser(payload) => {
            run.mode = RunMode::Answered(Outcome::AwaitingUser {
                text: payload.text,
                show_ack: payload.show_ack_button,
            });
            run.ack_sent = false;
            run.stopping = false;
        }
        StreamEvent::TaskCompleted(payload) => {
            run.mode = RunMode::Answered(Outcome::Succeeded(payload.text));
            run.stopping = false;
        }
        StreamEvent::TaskFailed(payload) => {
            run.mode = RunMode::Answered(Outcome::Failed(payload.text));
            run.stopping = false;
        }
        StreamEvent::TaskStopped(_) => {
            run.mode = RunMode::Answered(Outcome::Stopped);
            run.stopping = false;
        }
        StreamEvent::TaskStarted(_) => return false,
    }
    true
}

fn reduce_user(state: &mut ClientState, action: UserAction) -> Vec<ClientEffect> {
    match action {
        UserAction::SelectFrame(target) => {
            let Some(run) = state.run.as_mut() else {
                return Vec::new();
            };
            run.selected = match target {
                FrameTarget::Step(idx) => idx.min(run.live_index()),
                FrameTarget::Live => run.live_index(),
            };
            vec![ClientEffect::RequestFrame]
        }
        UserAction::SelectPrev => {
            let Some(run) = state.run.as_mut() else {
                return Vec::new();
            };
            run.selected = run.selected.saturating_sub(1);
            vec![ClientEffect::RequestFrame]
        }
        UserAction::SelectNext => {
            let Some(run) = state.run.as_mut() else {
                return Vec::new();
            };
            run.selected = (run.selected + 1).min(run.live_index());
            vec![ClientEffect::RequestFrame]
        }
        UserAction::ToggleCollapsed => {
            let Some(run) = state.run.as_mut() else {
                return Vec::new();
            };
            run.collapsed = !run.collapsed;
            vec![ClientEffect::RequestFrame]
        }
        UserAction::InputChar(c) => {
            state.input.push(c);
            vec![ClientEffect::RequestFrame]
        }
        UserAction::InputBackspace => {
            state.input.pop();
            vec![ClientEffect::RequestFrame]
        }
        UserAction::InputPaste(text) => {
            state.input.push_str(&text);
            vec![ClientEffect::RequestFrame]
        }
        UserAction::Submit => {
            let text = state.input.trim().to_string();
            if text.is_empty() {
                return Vec::new();
            }
            state.input.clear();
            state.transcript.push(TranscriptEntry::User(text.clone()));
            vec![
                ClientEffect::Send {
                    session_id: state.session_id.clone(),
                    text,
                },
                ClientEffect::RequestFrame,
            ]
        }
        UserAction::Stop => {
            let Some(task_id) = state.current_task_id.clone() else {
                return Vec::new();
            };
            if let Some(run) = state.run.as_mut() {
                if run.task_id == task_id && run.is_running() {
                    run.stopping = true;
                }
            }
            vec![ClientEffect::Stop { task_id }, ClientEffect::RequestFrame]
        }
        UserAction::Acknowledge => {
            if state.current_task_id.is_none() {
                return Vec::new();
            }
            let Some(run) = state.run.as_mut() else {
                return Vec::new();
            };
            if !run.awaiting_user() {
                return Vec::new();
            }
            // The awaiting run may lag behind a newer accepted task.
            run.ack_sent = true;
            vec![
                ClientEffect::Ack {
                    task_id: run.task_id.clone(),
                },
                ClientEffect::RequestFrame,
            ]
        }
        UserAction::CopyAnswer => state
            .run
            .as_ref()
            .and_then(|run| run.answer_text())
            .map(|text| vec![ClientEffect::CopyToClipboard(text.into_owned())])
            .unwrap_or_default(),
        UserAction::Quit => vec![ClientEffect::Exit],
    }
}

fn reduce_runtime(state: &mut ClientState, action: RuntimeAction) {
    match action {
        RuntimeAction::TaskAccepted(task_id) => {
            tracing::debug!(task = %task_id, "send accepted");
            state.current_task_id = Some(task_id);
        }
        RuntimeAction::RequestFailed { request, message } => {
            tracing::warn!(request = request.label(), %message, "request failed");
            let current = state.current_task_id.as_ref();
            if let Some(run) = state.run.as_mut() {
                match request {
                    RequestKind::Ack => run.ack_sent = false,
                    RequestKind::Stop if current == Some(&run.task_id) => run.stopping = false,
                    _ => {}
                }
            }
            state.notify(
                NoticeLevel::Error,
                NoticeSource::Request,
                format!("{} request failed: {message}", request.label()),
            );
        }
        RuntimeAction::ConnectionChanged(status) => {
            if state.connection == status {
                return;
            }
            state.connection = status;
            let level = match status {
                ConnectionStatus::Reconnecting { .. } | ConnectionStatus::Closed => {
                    NoticeLevel::Warn
                }
                ConnectionStatus::Connecting | ConnectionStatus::Live => NoticeLevel::Info,
            };
            state.notify(
                level,
                NoticeSource::Stream,
                format!("stream {}", status.label()),
            );
        }
        RuntimeAction::StreamGap => {
            tracing::warn!("stream resumed without a last event id");
            state.notify(
                NoticeLevel::Warn,
                NoticeSource::Stream,
                "reconnected without a resume point; events may have been missed",
            );
        }
        RuntimeAction::StreamDecodeFailed { event, message } => {
            state.notify(
                NoticeLevel::Warn,
                NoticeSource::Stream,
                format!("dropped `{event}` event: {message}"),
            );
        }
    }
}

#[cfg(test)]
mod tests;
