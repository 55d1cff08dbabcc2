use serde::Deserialize;
use serde::Serialize;

use easyagent_core::SessionId;
use easyagent_core::TaskId;

pub const SEND_PATH: &str = "/api/chat/send";
pub const STOP_PATH: &str = "/api/chat/stop";
pub const ACK_PATH: &str = "/api/chat/ack-user-action";
pub const STREAM_PATH: &str = "/api/chat/stream";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub session_id: SessionId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub task_id: TaskId,
}

/// Body shared by the stop and acknowledge endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_id: TaskId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    #[serde(default = "default_ok")]
    pub ok: bool,
}

fn default_ok() -> bool {
    true
}
