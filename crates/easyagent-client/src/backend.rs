use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;

use easyagent_core::ClientAction;
use easyagent_core::ClientEffect;
use easyagent_core::RequestKind;
use easyagent_core::RuntimeAction;
use easyagent_core::SessionId;
use easyagent_core::TaskId;

use crate::contracts::OkResponse;
use crate::contracts::SendRequest;
use crate::contracts::SendResponse;
use crate::contracts::TaskRequest;
use crate::contracts::ACK_PATH;
use crate::contracts::SEND_PATH;
use crate::contracts::STOP_PATH;
use crate::error::ClientError;
use crate::error::ClientResult;

/// The three commands the backend accepts.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn send(&self, session_id: &SessionId, text: &str) -> ClientResult<TaskId>;
    async fn stop(&self, task_id: &TaskId) -> ClientResult<()>;
    async fn ack(&self, task_id: &TaskId) -> ClientResult<()>;
}

pub fn parse_base_url(raw: &str) -> ClientResult<Url> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|err| ClientError::InvalidUrl {
        url: trimmed.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidUrl {
            url: trimmed.to_string(),
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    Ok(url)
}

/// Resolve an absolute API path against a base URL, keeping any path prefix
/// the base carries.
pub fn endpoint_url(base: &Url, path: &str) -> ClientResult<Url> {
    let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path);
    parse_base_url(&joined)
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let base = parse_base_url(base_url)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> ClientResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = endpoint_url(&self.base, path)?;
        tracing::debug!(%url, "POST");
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                code: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn post_task(&self, path: &str, task_id: &TaskId) -> ClientResult<()> {
        let body = TaskRequest {
            task_id: task_id.clone(),
        };
        let reply: OkResponse = self.post_json(path, &body).await?;
        if reply.ok {
            Ok(())
        } else {
            Err(ClientError::Rejected)
        }
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn send(&self, session_id: &SessionId, text: &str) -> ClientResult<TaskId> {
        let body = SendRequest {
            session_id: session_id.clone(),
            text: text.to_string(),
        };
        let reply: SendResponse = self.post_json(SEND_PATH, &body).await?;
        Ok(reply.task_id)
    }

    async fn stop(&self, task_id: &TaskId) -> ClientResult<()> {
        self.post_task(STOP_PATH, task_id).await
    }

    async fn ack(&self, task_id: &TaskId) -> ClientResult<()> {
        self.post_task(ACK_PATH, task_id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issued<T> {
    Sent(T),
    /// No task was known, so nothing went over the wire.
    Skipped,
}

/// Issues backend commands on behalf of the reducer's effects.
pub struct RequestIssuer<B> {
    backend: B,
}

impl<B: BackendApi> RequestIssuer<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn send(&self, session_id: &SessionId, text: &str) -> ClientResult<TaskId> {
        self.backend.send(session_id, text).await
    }

    pub async fn stop(&self, task_id: Option<&TaskId>) -> ClientResult<Issued<()>> {
        match task_id {
            Some(task_id) => self.backend.stop(task_id).await.map(Issued::Sent),
            None => {
                tracing::debug!("stop skipped: no current task");
                Ok(Issued::Skipped)
            }
        }
    }

    pub async fn ack(&self, task_id: Option<&TaskId>) -> ClientResult<Issued<()>> {
        match task_id {
            Some(task_id) => self.backend.ack(task_id).await.map(Issued::Sent),
            None => {
                tracing::debug!("ack skipped: no current task");
                Ok(Issued::Skipped)
            }
        }
    }

    /// Carry out a request effect and report the result as an action for the
    /// reducer. Non-request effects and plain successes return `None`.
    pub async fn perform(&self, effect: &ClientEffect) -> Option<ClientAction> {
        let (request, result) = match effect {
            ClientEffect::Send { session_id, text } => {
                let result = self.send(session_id, text).await;
                match result {
                    Ok(task_id) => {
                        return Some(ClientAction::Runtime(RuntimeAction::TaskAccepted(task_id)))
                    }
                    Err(err) => (RequestKind::Send, Err(err)),
                }
            }
            ClientEffect::Stop { task_id } => (RequestKind::Stop, self.stop(Some(task_id)).await),
            ClientEffect::Ack { task_id } => (RequestKind::Ack, self.ack(Some(task_id)).await),
            ClientEffect::CopyToClipboard(_) | ClientEffect::RequestFrame | ClientEffect::Exit => {
                return None
            }
        };
        match result {
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(request = request.label(), %err, "backend request failed");
                Some(ClientAction::Runtime(RuntimeAction::RequestFailed {
                    request,
                    message: err.to_string(),
                }))
            }
        }
    }
}
