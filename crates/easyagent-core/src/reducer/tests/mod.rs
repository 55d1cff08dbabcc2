pub(super) use super::reduce;
pub(super) use super::ClientEffect;
pub(super) use crate::actions::ClientAction;
pub(super) use crate::actions::FrameTarget;
pub(super) use crate::actions::RequestKind;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::events::AwaitingUserPayload;
pub(super) use crate::events::FramePayload;
pub(super) use crate::events::ProgressAppendPayload;
pub(super) use crate::events::ScreenLivePayload;
pub(super) use crate::events::StepPayload;
pub(super) use crate::events::StreamEvent;
pub(super) use crate::events::TaskStartedPayload;
pub(super) use crate::events::TaskStoppedPayload;
pub(super) use crate::events::TextPayload;
pub(super) use crate::frame::Frame;
pub(super) use crate::state::ClientState;
pub(super) use crate::state::ConnectionStatus;
pub(super) use crate::state::ModeTag;
pub(super) use crate::state::NoticeLevel;
pub(super) use crate::state::NoticeSource;
pub(super) use crate::state::Outcome;
pub(super) use crate::state::RunMode;
pub(super) use crate::state::RunState;
pub(super) use crate::state::Selection;
pub(super) use crate::state::SessionId;
pub(super) use crate::state::StepId;
pub(super) use crate::state::TaskId;
pub(super) use crate::state::TranscriptEntry;

mod invariants;

fn state() -> ClientState {
    ClientState::new(SessionId::from("default-session"))
}

fn started(task_id: &str) -> StreamEvent {
    StreamEvent::TaskStarted(TaskStartedPayload {
        task_id: TaskId::from(task_id),
        user_text: None,
    })
}

fn live(data_url: &str) -> StreamEvent {
    StreamEvent::ScreenLive(ScreenLivePayload {
        task_id: None,
        frame: FramePayload {
            id: None,
            data_url: data_url.to_string(),
        },
    })
}

fn step(id: &str, text: &str, data_url: &str) -> StreamEvent {
    StreamEvent::ProgressAppend(ProgressAppendPayload {
        task_id: None,
        step: StepPayload {
            id: StepId::from(id),
            index: None,
            text: text.to_string(),
            screenshot: Some(FramePayload {
                id: None,
                data_url: data_url.to_string(),
            }),
        },
    })
}

fn awaiting(text: &str, show_ack_button: bool) -> StreamEvent {
    StreamEvent::TaskAwaitingUser(AwaitingUserPayload {
        task_id: None,
        text: text.to_string(),
        show_ack_button,
    })
}

fn completed(text: &str) -> StreamEvent {
    StreamEvent::TaskCompleted(TextPayload {
        task_id: None,
        text: text.to_string(),
    })
}

fn failed(text: &str) -> StreamEvent {
    StreamEvent::TaskFailed(TextPayload {
        task_id: None,
        text: text.to_string(),
    })
}

fn stopped() -> StreamEvent {
    StreamEvent::TaskStopped(TaskStoppedPayload { task_id: None })
}

/// Re-stamps a run-scoped event with an explicit task id.
fn for_task(event: StreamEvent, task_id: &str) -> StreamEvent {
    let id = Some(TaskId::from(task_id));
    match event {
        StreamEvent::ScreenLive(mut payload) => {
            payload.task_id = id;
            StreamEvent::ScreenLive(payload)
        }
        StreamEvent::ProgressAppend(mut payload) => {
            payload.task_id = id;
            StreamEvent::ProgressAppend(payload)
        }
        StreamEvent::TaskAwaitingUser(mut payload) => {
            payload.task_id = id;
            StreamEvent::TaskAwaitingUser(payload)
        }
        StreamEvent::TaskCompleted(mut payload) => {
            payload.task_id = id;
            StreamEvent::TaskCompleted(payload)
        }
        StreamEvent::TaskFailed(mut payload) => {
            payload.task_id = id;
            StreamEvent::TaskFailed(payload)
        }
        StreamEvent::TaskStopped(mut payload) => {
            payload.task_id = id;
            StreamEvent::TaskStopped(payload)
        }
        other => other,
    }
}

fn run_stream(state: &mut ClientState, event: StreamEvent) -> Vec<ClientEffect> {
    reduce(state, ClientAction::Stream(event))
}

fn run_user(state: &mut ClientState, action: UserAction) -> Vec<ClientEffect> {
    reduce(state, ClientAction::User(action))
}

fn run_runtime(state: &mut ClientState, action: RuntimeAction) {
    let effects = reduce(state, ClientAction::Runtime(action));
    assert!(effects.is_empty());
}

fn active(state: &ClientState) -> &RunState {
    state.run.as_ref().expect("active run")
}

fn assert_selection_in_range(state: &ClientState) {
    if let Some(run) = state.run.as_ref() {
        assert!(
            run.selected <= run.steps.len(),
            "selected {} out of range for {} steps",
            run.selected,
            run.steps.len()
        );
    }
}
