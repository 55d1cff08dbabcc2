use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use easyagent_core::load_records;
use easyagent_core::replay;
use easyagent_core::RunState;
use easyagent_core::SessionId;
use easyagent_core::TranscriptEntry;

use crate::plain::PlainPrinter;

pub fn run(
    journal: &Path,
    export_frames: Option<&Path>,
    session_id: SessionId,
) -> Result<(), Box<dyn std::error::Error>> {
    if !journal.is_file() {
        return Err(format!("journal not found: {}", journal.display()).into());
    }
    let records = load_records(journal)?;
    let state = replay(session_id, &records);
    let mut stdout = std::io::stdout();

    writeln!(stdout, "replayed {} events from {}", records.len(), journal.display())?;
    for entry in &state.transcript {
        match entry {
            TranscriptEntry::User(text) => writeln!(stdout, "you: {text}")?,
            TranscriptEntry::Assistant { task_id, summary } => {
                writeln!(stdout, "{task_id}: {summary}")?
            }
        }
    }
    for line in PlainPrinter::new().lines(&state) {
        writeln!(stdout, "{}", line.text)?;
    }

    if let (Some(dir), Some(run)) = (export_frames, state.run.as_ref()) {
        let written = export_run_frames(run, dir)?;
        writeln!(stdout, "wrote {} frames to {}", written.len(), dir.display())?;
    }
    Ok(())
}

fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Decode every step screenshot into `dir` as `NN-<step-id>.<ext>`.
/// Frames that fail to decode are skipped with a warning.
pub fn export_run_frames(run: &RunState, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (position, step) in run.steps.iter().enumerate() {
        let Some(frame) = &step.frame else {
            continue;
        };
        let bytes = match frame.decode() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(step = %step.id, %err, "skipping undecodable frame");
                continue;
            }
        };
        let path = dir.join(format!(
            "{:02}-{}.{}",
            position + 1,
            file_stem(step.id.as_str()),
            frame.extension()
        ));
        std::fs::write(&path, bytes)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use easyagent_core::Frame;
    use easyagent_core::Step;
    use easyagent_core::StepId;
    use easyagent_core::TaskId;
    use pretty_assertions::assert_eq;

    #[test]
    fn exports_decodable_step_frames() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut run = RunState::new(TaskId::from("t1"), None);
        for (id, url) in [
            ("s/1", Some("data:image/png;base64,aGVsbG8=")),
            ("s2", None),
            ("s3", Some("data:image/jpeg;base64,@@")),
        ] {
            run.steps.push(Step {
                id: StepId::from(id),
                index: None,
                text: String::new(),
                frame: url.map(Frame::new),
            });
        }

        let written = export_run_frames(&run, dir.path()).expect("export");
        assert_eq!(written, vec![dir.path().join("01-s_1.png")]);
        assert_eq!(std::fs::read(&written[0]).expect("read"), b"hello".to_vec());
    }
}
