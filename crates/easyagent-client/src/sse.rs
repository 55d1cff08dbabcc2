/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

const DEFAULT_EVENT: &str = "message";

/// Incremental `text/event-stream` decoder.
///
/// Chunks may split anywhere, including inside a UTF-8 sequence or between
/// the `\r` and `\n` of a line terminator.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    scanned: usize,
    started: bool,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_event_id: Option<String>,
    retry_ms: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the most recent event that carried one; sent back as
    /// `Last-Event-ID` when reconnecting.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnect delay requested by the server, if any.
    pub fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    /// Forget any partially received event. The last event id survives.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.scanned = 0;
        self.started = false;
        self.event = None;
        self.data.clear();
        self.has_data = false;
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        if !self.started {
            if self.buf.len() < 3 && b"\xEF\xBB\xBF".starts_with(&self.buf) {
                return Vec::new();
            }
            if self.buf.starts_with(b"\xEF\xBB\xBF") {
                self.buf.drain(..3);
            }
            self.started = true;
        }

        let mut frames = Vec::new();
        let mut line_start = 0;
        let mut pos = self.scanned;
        while pos < self.buf.len() {
            match self.buf[pos] {
                b'\n' => {
                    let line = self.buf[line_start..pos].to_vec();
                    self.process_line(&line, &mut frames);
                    pos += 1;
                    line_start = pos;
                }
                b'\r' => {
                    // A trailing `\r` may be the first half of `\r\n`.
                    if pos + 1 == self.buf.len() {
                        break;
                    }
                    let line = self.buf[line_start..pos].to_vec();
                    self.process_line(&line, &mut frames);
                    pos += if self.buf[pos + 1] == b'\n' { 2 } else { 1 };
                    line_start = pos;
                }
                _ => pos += 1,
            }
        }
        self.buf.drain(..line_start);
        self.scanned = pos - line_start;
        frames
    }

    fn process_line(&mut self, line: &[u8], frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            self.dispatch(frames);
            return;
        }
        if line[0] == b':' {
            return;
        }
        let line = String::from_utf8_lossy(line);
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_ref(), ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry_ms = Some(ms);
                }
            }
            other => tracing::trace!(field = other, "ignoring unknown sse field"),
        }
    }

    fn dispatch(&mut self, frames: &mut Vec<SseFrame>) {
        let event = self.event.take();
        if !self.has_data {
            return;
        }
        self.has_data = false;
        frames.push(SseFrame {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_event_id.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(event: &str, data: &str, id: Option<&str>) -> SseFrame {
        SseFrame {
            event: event.to_string(),
            data: data.to_string(),
            id: id.map(str::to_string),
        }
    }

    #[test]
    fn decodes_named_events_and_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(
            b": keepalive\n\nevent: task.started\ndata: {\"task_id\":\"t1\"}\nid: 7\n\n",
        );
        assert_eq!(
            frames,
            vec![frame("task.started", "{\"task_id\":\"t1\"}", Some("7"))]
        );
        assert_eq!(decoder.last_event_id(), Some("7"));
    }

    #[test]
    fn joins_multiline_data() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: one\ndata:two\ndata\n\n");
        assert_eq!(frames, vec![frame("message", "one\ntwo\n", None)]);
    }

    #[test]
    fn every_split_point_yields_the_same_frames() {
        let stream = "\u{feff}event: progress.append\r\ndata: {\"text\":\"caf\u{e9}\"}\r\n\r\nretry: 1500\nevent: task.completed\rdata: done\r\r\n".as_bytes();
        let expected = vec![
            frame("progress.append", "{\"text\":\"caf\u{e9}\"}", None),
            frame("task.completed", "done", None),
        ];
        for split in 0..=stream.len() {
            let mut decoder = SseDecoder::new();
            let mut frames = decoder.push(&stream[..split]);
            frames.extend(decoder.push(&stream[split..]));
            assert_eq!(frames, expected, "split at {split}");
            assert_eq!(decoder.retry_ms(), Some(1500));
        }
    }

    #[test]
    fn byte_by_byte_feed() {
        let stream = b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\n";
        let mut decoder = SseDecoder::new();
        let frames: Vec<_> = stream
            .iter()
            .flat_map(|byte| decoder.push(std::slice::from_ref(byte)))
            .collect();
        assert_eq!(frames, vec![frame("a", "1", None), frame("b", "2", None)]);
    }

    #[test]
    fn event_without_data_is_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: task.stopped\n\n").is_empty());
        assert_eq!(
            decoder.push(b"data: x\n\n"),
            vec![frame("message", "x", None)]
        );
    }

    #[test]
    fn reset_drops_partial_event_but_keeps_id() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"id: 3\ndata: ok\n\nevent: task.failed\ndata: par");
        decoder.reset();
        assert_eq!(decoder.last_event_id(), Some("3"));
        assert_eq!(
            decoder.push(b"data: fresh\n\n"),
            vec![frame("message", "fresh", Some("3"))]
        );
    }
}
