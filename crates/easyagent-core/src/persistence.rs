use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::actions::ClientAction;
use super::actions::RuntimeAction;
use super::events::StreamEvent;
use super::reducer::reduce;
use super::state::ClientState;
use super::state::SessionId;

/// One stream frame exactly as it arrived, so a replay re-runs decoding too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub seq: u64,
    pub ts_ms: i64,
    pub session_id: SessionId,
    pub event: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Append-only JSONL log of received stream events.
#[derive(Debug)]
pub struct EventJournal {
    path: PathBuf,
    next_seq: u64,
}

impl EventJournal {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let existing = load_records(path.as_path())?;
        let next_seq = existing
            .iter()
            .map(|record| record.seq)
            .max()
            .map_or(1, |seq| seq.saturating_add(1));
        Ok(Self { path, next_seq })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(
        &mut self,
        session_id: &SessionId,
        event: &str,
        data: &str,
        event_id: Option<&str>,
    ) -> std::io::Result<u64> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        let record = JournalRecord {
            seq,
            ts_ms: chrono::Utc::now().timestamp_millis(),
            session_id: session_id.clone(),
            event: event.to_string(),
            data: data.to_string(),
            event_id: event_id.map(str::to_string),
        };
        let line = serde_json::to_string(&record)
            .map_err(|err| std::io::Error::other(format!("serialize: {err}")))?;
        append_line(self.path.as_path(), line.as_str())?;
        Ok(seq)
    }

    pub fn load(&self) -> std::io::Result<Vec<JournalRecord>> {
        load_records(self.path.as_path())
    }
}

pub fn load_records(path: &Path) -> std::io::Result<Vec<JournalRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => {
                tracing::warn!(line = line_no + 1, %err, "skipping unreadable journal line");
            }
        }
    }
    Ok(records)
}

/// Fold journal records, in sequence order, into `state`.
pub fn replay_into(state: &mut ClientState, records: &[JournalRecord]) {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|record| record.seq);

    for record in sorted {
        match StreamEvent::decode(&record.event, &record.data) {
            Ok(Some(event)) => {
                reduce(state, ClientAction::Stream(event));
            }
            Ok(None) => {}
            Err(err) => {
                reduce(
                    state,
                    ClientAction::Runtime(RuntimeAction::StreamDecodeFailed {
                        event: record.event.clone(),
                        message: err.to_string(),
                    }),
                );
            }
        }
    }
}

pub fn replay(session_id: SessionId, records: &[JournalRecord]) -> ClientState {
    let mut state = ClientState::new(session_id);
    replay_into(&mut state, records);
    state
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut opts = OpenOptions::new();
    opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts.open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}
