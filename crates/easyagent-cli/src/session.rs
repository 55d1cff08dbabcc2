use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::watch;

use easyagent_client::BackendApi;
use easyagent_client::ClientError;
use easyagent_client::EventStream;
use easyagent_client::HttpBackend;
use easyagent_client::ReconnectPolicy;
use easyagent_client::RequestIssuer;
use easyagent_client::StreamMessage;
use easyagent_core::config::Config;
use easyagent_core::reduce;
use easyagent_core::ClientAction;
use easyagent_core::ClientEffect;
use easyagent_core::ClientState;
use easyagent_core::EventJournal;
use easyagent_core::NoticeLevel;
use easyagent_core::NoticeSource;
use easyagent_core::SessionId;

const STREAM_BUFFER: usize = 256;

enum Incoming {
    Stream(StreamMessage),
    Followup(ClientAction),
}

/// Owns the client state and wires the reducer to the transport.
///
/// The UI thread calls `dispatch` for user input and `pump` to fold in
/// whatever the stream task and finished requests produced. Request effects
/// run on the tokio runtime; every other effect is handed back to the caller.
pub struct Session<B: BackendApi + 'static = HttpBackend> {
    pub state: ClientState,
    runtime: Handle,
    issuer: Arc<RequestIssuer<B>>,
    stream_rx: mpsc::Receiver<StreamMessage>,
    followup_tx: mpsc::UnboundedSender<ClientAction>,
    followup_rx: mpsc::UnboundedReceiver<ClientAction>,
    shutdown: watch::Sender<bool>,
    journal: Option<EventJournal>,
}

impl Session<HttpBackend> {
    pub fn connect(
        config: &Config,
        runtime: Handle,
        journal: Option<EventJournal>,
    ) -> Result<Self, ClientError> {
        let session_id = SessionId::new(config.server.session_id.clone());
        let backend = HttpBackend::new(
            &config.server.base_url,
            Duration::from_secs(config.server.request_timeout_secs),
        )?;
        let stream = EventStream::new(
            &config.server.base_url,
            &session_id,
            ReconnectPolicy::from_config(&config.stream),
        )?;
        tracing::info!(url = %stream.url(), session = %session_id, "subscribing");

        let (stream_tx, stream_rx) = mpsc::channel(STREAM_BUFFER);
        let (shutdown, shutdown_rx) = watch::channel(false);
        runtime.spawn(stream.run(stream_tx, shutdown_rx));

        let state = ClientState::with_notice_capacity(session_id, config.ui.notice_capacity);
        Ok(Self::from_parts(
            state,
            runtime,
            RequestIssuer::new(backend),
            stream_rx,
            shutdown,
            journal,
        ))
    }
}

impl<B: BackendApi + 'static> Session<B> {
    pub fn from_parts(
        state: ClientState,
        runtime: Handle,
        issuer: RequestIssuer<B>,
        stream_rx: mpsc::Receiver<StreamMessage>,
        shutdown: watch::Sender<bool>,
        journal: Option<EventJournal>,
    ) -> Self {
        let (followup_tx, followup_rx) = mpsc::unbounded_channel();
        Self {
            state,
            runtime,
            issuer: Arc::new(issuer),
            stream_rx,
            followup_tx,
            followup_rx,
            shutdown,
            journal,
        }
    }

    /// Reduce one action. Request effects are started in the background;
    /// the remaining effects are returned for the caller to carry out.
    pub fn dispatch(&mut self, action: ClientAction) -> Vec<ClientEffect> {
        let effects = reduce(&mut self.state, action);
        let mut local = Vec::new();
        for effect in effects {
            if effect.is_request() {
                self.spawn_request(effect);
            } else {
                local.push(effect);
            }
        }
        local
    }

    /// Fold everything that is already waiting, without blocking.
    pub fn pump(&mut self) -> Vec<ClientEffect> {
        let mut effects = Vec::new();
        while let Ok(message) = self.stream_rx.try_recv() {
            effects.extend(self.apply(Incoming::Stream(message)));
        }
        while let Ok(action) = self.followup_rx.try_recv() {
            effects.extend(self.apply(Incoming::Followup(action)));
        }
        effects
    }

    /// Block the calling thread until something arrives or `timeout` passes,
    /// then fold it together with anything else already waiting.
    pub fn wait(&mut self, timeout: Duration) -> Vec<ClientEffect> {
        let stream_rx = &mut self.stream_rx;
        let followup_rx = &mut self.followup_rx;
        let first = self.runtime.block_on(async {
            tokio::select! {
                Some(message) = stream_rx.recv() => Some(Incoming::Stream(message)),
                Some(action) = followup_rx.recv() => Some(Incoming::Followup(action)),
                _ = tokio::time::sleep(timeout) => None,
            }
        });
        let mut effects = match first {
            Some(incoming) => self.apply(incoming),
            None => Vec::new(),
        };
        effects.extend(self.pump());
        effects
    }

    /// Sender for actions produced outside the UI thread.
    pub fn action_sender(&self) -> mpsc::UnboundedSender<ClientAction> {
        self.followup_tx.clone()
    }

    fn apply(&mut self, incoming: Incoming) -> Vec<ClientEffect> {
        let action = match incoming {
            Incoming::Stream(message) => {
                self.record(&message);
                message.into_action()
            }
            Incoming::Followup(action) => action,
        };
        self.dispatch(action)
    }

    fn record(&mut self, message: &StreamMessage) {
        let Some(journal) = self.journal.as_mut() else {
            return;
        };
        let Some(raw) = message.raw() else {
            return;
        };
        if let Err(err) = journal.append(&self.state.session_id, &raw.event, &raw.data, raw.id.as_deref()) {
            tracing::warn!(path = %journal.path().display(), %err, "journal write failed; recording stopped");
            self.journal = None;
            self.state.notify(
                NoticeLevel::Warn,
                NoticeSource::Client,
                format!("journal write failed: {err}"),
            );
        }
    }

    fn spawn_request(&self, effect: ClientEffect) {
        let issuer = Arc::clone(&self.issuer);
        let tx = self.followup_tx.clone();
        self.runtime.spawn(async move {
            if let Some(action) = issuer.perform(&effect).await {
                let _ = tx.send(action);
            }
        });
    }
}

impl<B: BackendApi + 'static> Drop for Session<B> {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use easyagent_client::ClientResult;
    use easyagent_client::SseFrame;
    use easyagent_core::ConnectionStatus;
    use easyagent_core::ModeTag;
    use easyagent_core::StreamEvent;
    use easyagent_core::TaskId;
    use easyagent_core::UserAction;
    use pretty_assertions::assert_eq;

    struct FixedBackend;

    #[async_trait]
    impl BackendApi for FixedBackend {
        async fn send(&self, _session_id: &SessionId, _text: &str) -> ClientResult<TaskId> {
            Ok(TaskId::from("t-7"))
        }

        async fn stop(&self, _task_id: &TaskId) -> ClientResult<()> {
            Ok(())
        }

        async fn ack(&self, _task_id: &TaskId) -> ClientResult<()> {
            Err(ClientError::Rejected)
        }
    }

    fn session(
        runtime: &tokio::runtime::Runtime,
        journal: Option<EventJournal>,
    ) -> (Session<FixedBackend>, mpsc::Sender<StreamMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let (shutdown, _) = watch::channel(false);
        let session = Session::from_parts(
            ClientState::new(SessionId::from("s")),
            runtime.handle().clone(),
            RequestIssuer::new(FixedBackend),
            rx,
            shutdown,
            journal,
        );
        (session, tx)
    }

    fn message(event: &str, data: &str) -> StreamMessage {
        StreamMessage::from_frame(SseFrame {
            event: event.to_string(),
            data: data.to_string(),
            id: None,
        })
        .expect("known event")
    }

    #[test]
    fn submit_round_trips_task_id() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let (mut session, _tx) = session(&runtime, None);
        for c in "hi".chars() {
            session.dispatch(ClientAction::User(UserAction::InputChar(c)));
        }
        let local = session.dispatch(ClientAction::User(UserAction::Submit));
        assert_eq!(local, vec![ClientEffect::RequestFrame]);

        session.wait(Duration::from_secs(5));
        assert_eq!(session.state.current_task_id, Some(TaskId::from("t-7")));
    }

    #[test]
    fn stream_messages_are_folded_and_recorded() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = EventJournal::open(dir.path().join("j.jsonl")).expect("journal");
        let (mut session, tx) = session(&runtime, Some(journal));

        tx.try_send(message("task.started", r#"{"task_id":"t1"}"#))
            .expect("send");
        tx.try_send(message("task.completed", r#"{"task_id":"t1","text":"ok"}"#))
            .expect("send");
        let effects = session.pump();

        assert_eq!(effects, vec![ClientEffect::RequestFrame, ClientEffect::RequestFrame]);
        let run = session.state.run.as_ref().expect("run");
        assert_eq!(run.mode(), ModeTag::Answered);

        let records = EventJournal::open(dir.path().join("j.jsonl"))
            .expect("reopen")
            .load()
            .expect("load");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].event, "task.completed");
    }

    #[test]
    fn resume_gap_is_noticed_but_not_recorded() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = EventJournal::open(dir.path().join("j.jsonl")).expect("journal");
        let (mut session, tx) = session(&runtime, Some(journal));

        tx.try_send(StreamMessage::Status(ConnectionStatus::Live))
            .expect("send");
        tx.try_send(StreamMessage::Gap).expect("send");
        session.pump();

        assert_eq!(session.state.connection, ConnectionStatus::Live);
        let notice = session.state.notices.latest().expect("notice");
        assert_eq!(notice.level, NoticeLevel::Warn);
        assert!(notice.message.contains("events may have been missed"));

        let records = EventJournal::open(dir.path().join("j.jsonl"))
            .expect("reopen")
            .load()
            .expect("load");
        assert!(records.is_empty());
    }

    #[test]
    fn rejected_ack_surfaces_as_notice() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let (mut session, _tx) = session(&runtime, None);
        session.dispatch(ClientAction::Stream(
            StreamEvent::decode("task.started", r#"{"task_id":"t1"}"#)
                .expect("decode")
                .expect("event"),
        ));
        session.dispatch(ClientAction::Stream(
            StreamEvent::decode(
                "task.awaiting_user",
                r#"{"task_id":"t1","text":"log in","show_ack_button":true}"#,
            )
            .expect("decode")
            .expect("event"),
        ));
        session.dispatch(ClientAction::User(UserAction::Acknowledge));
        assert!(!session.state.run.as_ref().expect("run").awaiting_user());

        session.wait(Duration::from_secs(5));
        assert!(session.state.run.as_ref().expect("run").awaiting_user());
        let notice = session.state.notices.latest().expect("notice");
        assert_eq!(notice.message, "acknowledge request failed: backend rejected the request");
    }
}
