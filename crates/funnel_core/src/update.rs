use crate::{Effect, FunnelState, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: FunnelState, msg: Msg) -> (FunnelState, Vec<Effect>) {
    let effects = match msg {
        Msg::CountdownStarted { at } => {
            state.set_start_time(at);
            vec![Effect::SyncCountdown {
                start_time: Some(at),
            }]
        }
        Msg::DraftUpdated(draft) => {
            state.set_draft(draft);
            Vec::new()
        }
        Msg::BrowsingOnlyChanged(value) => {
            state.set_browsing_only(value);
            Vec::new()
        }
        Msg::AutoSubmitDisabledChanged(value) => {
            state.set_auto_submit_disabled(value);
            Vec::new()
        }
        Msg::AttemptFailed => {
            state.record_failed_attempt();
            Vec::new()
        }
        Msg::SubmissionCompleted { batch_id } => {
            if state.complete_submission(batch_id) {
                vec![Effect::CancelAutoSubmit]
            } else {
                // Completion is monotonic; a late duplicate changes nothing.
                Vec::new()
            }
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
