use crate::ServiceKind;

/// Render-ready projection of a funnel session for the hosting page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelViewModel {
    pub service: ServiceKind,
    pub countdown_armed: bool,
    pub submission_completed: bool,
    pub batch_id: Option<String>,
    pub attempts: u32,
    /// All attempts spent without a completed submission.
    pub gave_up: bool,
    pub browsing_only: bool,
}
