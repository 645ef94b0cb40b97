use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A funnel step armed (or re-armed) the auto-submit countdown.
    CountdownStarted { at: Instant },
    /// Seeker edited the profile fields feeding the lead draft.
    DraftUpdated(crate::LeadDraft),
    /// Seeker toggled the "just browsing" intent.
    BrowsingOnlyChanged(bool),
    /// Host flipped the auto-submit kill switch.
    AutoSubmitDisabledChanged(bool),
    /// A submission attempt failed.
    AttemptFailed,
    /// A submission (manual or automatic) completed with a confirmation id.
    SubmissionCompleted { batch_id: String },
    /// Fallback for placeholder wiring.
    NoOp,
}
