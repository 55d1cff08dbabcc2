use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::header::CACHE_CONTROL;
use reqwest::Url;
use tokio::sync::mpsc;
use tokio::sync::watch;

use easyagent_core::config::StreamConfig;
use easyagent_core::ClientAction;
use easyagent_core::ConnectionStatus;
use easyagent_core::RuntimeAction;
use easyagent_core::SessionId;
use easyagent_core::StreamEvent;

use crate::backend::endpoint_url;
use crate::backend::parse_base_url;
use crate::contracts::STREAM_PATH;
use crate::error::ClientError;
use crate::error::ClientResult;
use crate::sse::SseDecoder;
use crate::sse::SseFrame;

const LAST_EVENT_ID: &str = "Last-Event-ID";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            initial_backoff: Duration::from_millis(config.reconnect_initial_ms),
            max_backoff: Duration::from_millis(config.reconnect_max_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }

    /// Delay before reconnect `attempt` (1-based). A server `retry:` hint
    /// replaces the initial backoff; doubling still applies and the result is
    /// capped at `max_backoff`.
    pub fn delay_for(&self, attempt: u32, server_retry_ms: Option<u64>) -> Duration {
        let base = server_retry_ms
            .map(Duration::from_millis)
            .unwrap_or(self.initial_backoff);
        let exponent = attempt.saturating_sub(1).min(16);
        base.saturating_mul(1u32 << exponent).min(self.max_backoff)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

/// What the stream task hands to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    Event { raw: SseFrame, event: StreamEvent },
    Malformed { raw: SseFrame, error: String },
    Status(ConnectionStatus),
    /// Reconnected with nothing to resume from; earlier events may be lost.
    Gap,
}

impl StreamMessage {
    /// Decode a raw frame. Frames with unknown event names yield `None`.
    pub fn from_frame(raw: SseFrame) -> Option<Self> {
        match StreamEvent::decode(&raw.event, &raw.data) {
            Ok(Some(event)) => Some(Self::Event { raw, event }),
            Ok(None) => {
                tracing::trace!(event = %raw.event, "ignoring unknown stream event");
                None
            }
            Err(err) => {
                tracing::warn!(event = %raw.event, %err, "dropping malformed stream event");
                Some(Self::Malformed {
                    raw,
                    error: err.to_string(),
                })
            }
        }
    }

    /// Frame as received, for journaling.
    pub fn raw(&self) -> Option<&SseFrame> {
        match self {
            Self::Event { raw, .. } | Self::Malformed { raw, .. } => Some(raw),
            Self::Status(_) | Self::Gap => None,
        }
    }

    pub fn into_action(self) -> ClientAction {
        match self {
            Self::Event { event, .. } => ClientAction::Stream(event),
            Self::Malformed { raw, error } => {
                ClientAction::Runtime(RuntimeAction::StreamDecodeFailed {
                    event: raw.event,
                    message: error,
                })
            }
            Self::Status(status) => ClientAction::Runtime(RuntimeAction::ConnectionChanged(status)),
            Self::Gap => ClientAction::Runtime(RuntimeAction::StreamGap),
        }
    }
}

/// Long-lived subscription to a session's event stream.
#[derive(Debug, Clone)]
pub struct EventStream {
    http: reqwest::Client,
    url: Url,
    policy: ReconnectPolicy,
}

enum SessionEnd {
    ServerClosed,
    ReceiverGone,
}

impl EventStream {
    pub fn new(base_url: &str, session_id: &SessionId, policy: ReconnectPolicy) -> ClientResult<Self> {
        let base = parse_base_url(base_url)?;
        let mut url = endpoint_url(&base, STREAM_PATH)?;
        url.query_pairs_mut()
            .append_pair("session_id", session_id.as_str());
        // No overall timeout: the response body stays open indefinitely.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, url, policy })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Keep the subscription open until `shutdown` flips, the receiver is
    /// dropped, or the policy gives up.
    pub async fn run(self, tx: mpsc::Sender<StreamMessage>, mut shutdown: watch::Receiver<bool>) {
        let mut decoder = SseDecoder::new();
        let mut attempt: u32 = 0;
        let mut connected = false;

        loop {
            if *shutdown.borrow() {
                break;
            }
            let status = if attempt == 0 {
                ConnectionStatus::Connecting
            } else {
                ConnectionStatus::Reconnecting { attempt }
            };
            if tx.send(StreamMessage::Status(status)).await.is_err() {
                return;
            }

            let outcome = tokio::select! {
                _ = shutdown.changed() => break,
                outcome = self.connect_once(&mut decoder, &tx, &mut attempt, &mut connected) => outcome,
            };
            match outcome {
                Ok(SessionEnd::ReceiverGone) => return,
                Ok(SessionEnd::ServerClosed) => tracing::info!("event stream closed by server"),
                Err(err) => tracing::warn!(%err, url = %self.url, "event stream failed"),
            }

            attempt = attempt.saturating_add(1);
            if !self.policy.should_retry(attempt) {
                tracing::warn!(attempt, "giving up on event stream");
                break;
            }
            let delay = self.policy.delay_for(attempt, decoder.retry_ms());
            decoder.reset();
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let _ = tx.send(StreamMessage::Status(ConnectionStatus::Closed)).await;
    }

    async fn connect_once(
        &self,
        decoder: &mut SseDecoder,
        tx: &mpsc::Sender<StreamMessage>,
        attempt: &mut u32,
        connected: &mut bool,
    ) -> ClientResult<SessionEnd> {
        let mut request = self
            .http
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = decoder.last_event_id() {
            request = request.header(LAST_EVENT_ID, id);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                code: status.as_u16(),
                body,
            });
        }

        tracing::info!(url = %self.url, "event stream connected");
        *attempt = 0;
        let resumed_blind = *connected && decoder.last_event_id().is_none();
        *connected = true;
        if tx
            .send(StreamMessage::Status(ConnectionStatus::Live))
            .await
            .is_err()
        {
            return Ok(SessionEnd::ReceiverGone);
        }
        if resumed_blind && tx.send(StreamMessage::Gap).await.is_err() {
            return Ok(SessionEnd::ReceiverGone);
        }

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for frame in decoder.push(&chunk) {
                let Some(message) = StreamMessage::from_frame(frame) else {
                    continue;
                };
                if tx.send(message).await.is_err() {
                    return Ok(SessionEnd::ReceiverGone);
                }
            }
        }
        Ok(SessionEnd::ServerClosed)
    }
}
