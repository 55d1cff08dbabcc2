use super::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Live,
    Step,
    Awaiting(bool),
    Completed,
    Failed,
    Stopped,
    Restart,
    Select(usize),
    SelectLive,
    Prev,
    Next,
    Toggle,
    Stop,
    Ack,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Live),
        4 => Just(Op::Step),
        1 => any::<bool>().prop_map(Op::Awaiting),
        1 => Just(Op::Completed),
        1 => Just(Op::Failed),
        1 => Just(Op::Stopped),
        1 => Just(Op::Restart),
        2 => (0usize..12).prop_map(Op::Select),
        1 => Just(Op::SelectLive),
        1 => Just(Op::Prev),
        1 => Just(Op::Next),
        1 => Just(Op::Toggle),
        1 => Just(Op::Stop),
        1 => Just(Op::Ack),
    ]
}

fn apply(state: &mut ClientState, op: &Op, counter: &mut usize) {
    *counter += 1;
    let n = *counter;
    match op {
        Op::Live => {
            run_stream(state, live(&format!("live-{n}")));
        }
        Op::Step => {
            run_stream(state, step(&format!("s{n}"), "step", &format!("d{n}")));
        }
        Op::Awaiting(show) => {
            run_stream(state, awaiting("confirm", *show));
        }
        Op::Completed => {
            run_stream(state, completed("done"));
        }
        Op::Failed => {
            run_stream(state, failed("boom"));
        }
        Op::Stopped => {
            run_stream(state, stopped());
        }
        Op::Restart => {
            run_stream(state, started(&format!("t{n}")));
        }
        Op::Select(idx) => {
            run_user(state, UserAction::SelectFrame(FrameTarget::Step(*idx)));
        }
        Op::SelectLive => {
            run_user(state, UserAction::SelectFrame(FrameTarget::Live));
        }
        Op::Prev => {
            run_user(state, UserAction::SelectPrev);
        }
        Op::Next => {
            run_user(state, UserAction::SelectNext);
        }
        Op::Toggle => {
            run_user(state, UserAction::ToggleCollapsed);
        }
        Op::Stop => {
            run_user(state, UserAction::Stop);
        }
        Op::Ack => {
            run_user(state, UserAction::Acknowledge);
        }
    }
}

proptest! {
    #[test]
    fn selection_stays_in_range(ops in prop::collection::vec(op(), 0..60)) {
        let mut state = state();
        run_stream(&mut state, started("t0"));
        let mut counter = 0;
        for op in &ops {
            apply(&mut state, op, &mut counter);
            assert_selection_in_range(&state);
        }
    }

    #[test]
    fn awaiting_user_implies_answered(ops in prop::collection::vec(op(), 0..60)) {
        let mut state = state();
        run_stream(&mut state, started("t0"));
        let mut counter = 0;
        for op in &ops {
            apply(&mut state, op, &mut counter);
            let run = active(&state);
            if run.awaiting_user() {
                prop_assert_eq!(run.mode(), ModeTag::Answered);
            }
        }
    }

    #[test]
    fn steps_are_append_only(ops in prop::collection::vec(op(), 0..60)) {
        let mut state = state();
        run_stream(&mut state, started("t0"));
        let mut counter = 0;
        for op in &ops {
            let before = active(&state).clone();
            apply(&mut state, op, &mut counter);
            let after = active(&state);
            if after.task_id != before.task_id {
                prop_assert!(after.steps.is_empty());
                continue;
            }
            let appended = matches!(op, Op::Step) && !before.stopping;
            let expected_len = before.steps.len() + usize::from(appended);
            prop_assert_eq!(after.steps.len(), expected_len);
            prop_assert_eq!(&after.steps[..before.steps.len()], &before.steps[..]);
            if appended {
                prop_assert_eq!(after.selected, after.steps.len());
            }
        }
    }
}
