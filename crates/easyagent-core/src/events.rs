use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use super::frame::Frame;
use super::state::Step;
use super::state::StepId;
use super::state::TaskId;

pub const TASK_STARTED: &str = "task.started";
pub const SCREEN_LIVE: &str = "screen.live";
pub const PROGRESS_APPEND: &str = "progress.append";
pub const TASK_AWAITING_USER: &str = "task.awaiting_user";
pub const TASK_COMPLETED: &str = "task.completed";
pub const TASK_FAILED: &str = "task.failed";
pub const TASK_STOPPED: &str = "task.stopped";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStartedPayload {
    pub task_id: TaskId,
    #[serde(default)]
    pub user_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePayload {
    #[serde(default)]
    pub id: Option<String>,
    pub data_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenLivePayload {
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub frame: FramePayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPayload {
    pub id: StepId,
    #[serde(default)]
    pub index: Option<u32>,
    pub text: String,
    #[serde(default)]
    pub screenshot: Option<FramePayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressAppendPayload {
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub step: StepPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitingUserPayload {
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub text: String,
    #[serde(default)]
    pub show_ack_button: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStoppedPayload {
    #[serde(default)]
    pub task_id: Option<TaskId>,
}

/// A named event pushed by the backend on the session stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TaskStarted(TaskStartedPayload),
    ScreenLive(ScreenLivePayload),
    ProgressAppend(ProgressAppendPayload),
    TaskAwaitingUser(AwaitingUserPayload),
    TaskCompleted(TextPayload),
    TaskFailed(TextPayload),
    TaskStopped(TaskStoppedPayload),
}

#[derive(Debug, Error)]
#[error("malformed `{event}` payload: {source}")]
pub struct EventDecodeError {
    pub event: String,
    #[source]
    pub source: serde_json::Error,
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskStarted(_) => TASK_STARTED,
            Self::ScreenLive(_) => SCREEN_LIVE,
            Self::ProgressAppend(_) => PROGRESS_APPEND,
            Self::TaskAwaitingUser(_) => TASK_AWAITING_USER,
            Self::TaskCompleted(_) => TASK_COMPLETED,
            Self::TaskFailed(_) => TASK_FAILED,
            Self::TaskStopped(_) => TASK_STOPPED,
        }
    }

    /// Task the backend stamped on this event, if any.
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::TaskStarted(payload) => Some(&payload.task_id),
            Self::ScreenLive(payload) => payload.task_id.as_ref(),
            Self::ProgressAppend(payload) => payload.task_id.as_ref(),
            Self::TaskAwaitingUser(payload) => payload.task_id.as_ref(),
            Self::TaskCompleted(payload) | Self::TaskFailed(payload) => payload.task_id.as_ref(),
            Self::TaskStopped(payload) => payload.task_id.as_ref(),
        }
    }

    /// Decode one stream frame. Unknown event names yield `Ok(None)`.
    pub fn decode(name: &str, data: &str) -> Result<Option<Self>, EventDecodeError> {
        let wrap = |source: serde_json::Error| EventDecodeError {
            event: name.to_string(),
            source,
        };
        let event = match name {
            TASK_STARTED => Self::TaskStarted(serde_json::from_str(data).map_err(wrap)?),
            SCREEN_LIVE => Self::ScreenLive(serde_json::from_str(data).map_err(wrap)?),
            PROGRESS_APPEND => Self::ProgressAppend(serde_json::from_str(data).map_err(wrap)?),
            TASK_AWAITING_USER => {
                Self::TaskAwaitingUser(serde_json::from_str(data).map_err(wrap)?)
            }
            TASK_COMPLETED => Self::TaskCompleted(serde_json::from_str(data).map_err(wrap)?),
            TASK_FAILED => Self::TaskFailed(serde_json::from_str(data).map_err(wrap)?),
            TASK_STOPPED => Self::TaskStopped(serde_json::from_str(data).map_err(wrap)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

impl From<StepPayload> for Step {
    fn from(payload: StepPayload) -> Self {
        Self {
            id: payload.id,
            index: payload.index,
            text: payload.text,
            frame: payload
                .screenshot
                .filter(|shot| !shot.data_url.is_empty())
                .map(|shot| Frame::new(shot.data_url)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_backend_payload_with_extra_fields() {
        let data = r#"{"task_id":"t1","step":{"id":"s1","index":2,"text":"open app",
            "screenshot":{"id":"f1","is_live":false,"data_url":"d1"}}}"#;
        let event = StreamEvent::decode(PROGRESS_APPEND, data)
            .expect("decode")
            .expect("known event");
        assert_eq!(event.task_id(), Some(&TaskId::from("t1")));
        let StreamEvent::ProgressAppend(payload) = event else {
            panic!("wrong variant");
        };
        let step = Step::from(payload.step);
        assert_eq!(step.index, Some(2));
        assert_eq!(step.frame, Some(Frame::new("d1")));
    }

    #[test]
    fn show_ack_button_defaults_to_false() {
        let event = StreamEvent::decode(TASK_AWAITING_USER, r#"{"text":"check"}"#)
            .expect("decode")
            .expect("known event");
        assert_eq!(
            event,
            StreamEvent::TaskAwaitingUser(AwaitingUserPayload {
                task_id: None,
                text: "check".to_string(),
                show_ack_button: false,
            })
        );
    }

    #[test]
    fn unknown_event_names_are_ignored() {
        assert!(StreamEvent::decode("heartbeat", "{}").expect("decode").is_none());
    }

    #[test]
    fn malformed_payload_reports_event_name() {
        let err = StreamEvent::decode(TASK_COMPLETED, "{not json").unwrap_err();
        assert_eq!(err.event, TASK_COMPLETED);
        assert!(err.to_string().starts_with("malformed `task.completed` payload"));
    }
}
