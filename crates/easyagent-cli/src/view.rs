//! Text shared by the terminal skins.

use easyagent_core::Frame;
use easyagent_core::RunState;
use easyagent_core::Selection;
use easyagent_core::Step;

pub fn frame_label(frame: Option<&Frame>) -> String {
    match frame {
        None => "no frame".to_string(),
        Some(frame) => match frame.info() {
            Ok(info) => format!("{} {}", info.mime, info.size_label()),
            Err(err) => format!("unreadable frame ({err})"),
        },
    }
}

/// Which frame the run is showing, e.g. `step 2/5` or `live`.
pub fn selection_label(run: &RunState) -> String {
    match run.selection() {
        Selection::Live => "live".to_string(),
        Selection::Step(idx) => format!("step {}/{}", idx + 1, run.steps.len()),
    }
}

pub fn step_number(step: &Step, position: usize) -> u32 {
    step.index.unwrap_or(position as u32 + 1)
}

/// One character per step plus the live sentinel, selection in brackets.
pub fn scrubber(run: &RunState) -> String {
    let mut out = String::new();
    for idx in 0..=run.live_index() {
        let mark = if idx == run.live_index() {
            '◉'
        } else if run.steps[idx].frame.is_some() {
            '●'
        } else {
            '○'
        };
        if idx == run.selected {
            out.push('[');
            out.push(mark);
            out.push(']');
        } else {
            out.push(' ');
            out.push(mark);
            out.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use easyagent_core::StepId;
    use easyagent_core::TaskId;
    use pretty_assertions::assert_eq;

    fn run_with_steps() -> RunState {
        let mut run = RunState::new(TaskId::from("t1"), None);
        run.steps.push(Step {
            id: StepId::from("a"),
            index: None,
            text: "open".to_string(),
            frame: Some(Frame::new("data:image/png;base64,aGVsbG8=")),
        });
        run.steps.push(Step {
            id: StepId::from("b"),
            index: Some(7),
            text: "type".to_string(),
            frame: None,
        });
        run
    }

    #[test]
    fn scrubber_brackets_selection() {
        let mut run = run_with_steps();
        run.selected = 0;
        assert_eq!(scrubber(&run), "[●] ○  ◉ ");
        run.selected = run.live_index();
        assert_eq!(selection_label(&run), "live");
        assert_eq!(scrubber(&run), " ●  ○ [◉]");
    }

    #[test]
    fn labels_describe_frames_and_steps() {
        let run = run_with_steps();
        assert_eq!(frame_label(run.steps[0].frame.as_ref()), "image/png 5 B");
        assert_eq!(frame_label(None), "no frame");
        assert_eq!(step_number(&run.steps[0], 0), 1);
        assert_eq!(step_number(&run.steps[1], 1), 7);
        assert_eq!(selection_label(&RunState { selected: 1, ..run }), "step 2/2");
    }
}
