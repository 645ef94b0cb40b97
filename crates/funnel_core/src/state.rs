use std::time::Instant;

use crate::policy::MAX_ATTEMPTS;
use crate::view_model::FunnelViewModel;

/// Service verticals a lead can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    ChildCare,
    Daycare,
    SeniorCare,
    Housekeeping,
    PetCare,
    Tutoring,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Seeker-side fields a lead submission is assembled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadDraft {
    pub service: ServiceKind,
    pub seeker_id: String,
    pub zip_code: String,
    pub contact: ContactInfo,
    pub message: Option<String>,
    pub provider_ids: Vec<String>,
}

impl LeadDraft {
    pub fn new(service: ServiceKind, seeker_id: impl Into<String>) -> Self {
        Self {
            service,
            seeker_id: seeker_id.into(),
            zip_code: String::new(),
            contact: ContactInfo::default(),
            message: None,
            provider_ids: Vec::new(),
        }
    }
}

/// Point-in-time view of the fields the auto-submit controller reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSubmitState {
    pub start_time: Option<Instant>,
    pub submission_completed: bool,
    pub attempts: u32,
    pub browsing_only: bool,
    pub auto_submit_disabled: bool,
}

/// One seeker's funnel session. Mutated only through [`update`](crate::update).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelState {
    start_time: Option<Instant>,
    submission_completed: bool,
    batch_id: Option<String>,
    attempts: u32,
    browsing_only: bool,
    auto_submit_disabled: bool,
    draft: LeadDraft,
}

impl FunnelState {
    pub fn new(draft: LeadDraft) -> Self {
        Self {
            start_time: None,
            submission_completed: false,
            batch_id: None,
            attempts: 0,
            browsing_only: false,
            auto_submit_disabled: false,
            draft,
        }
    }

    pub fn snapshot(&self) -> AutoSubmitState {
        AutoSubmitState {
            start_time: self.start_time,
            submission_completed: self.submission_completed,
            attempts: self.attempts,
            browsing_only: self.browsing_only,
            auto_submit_disabled: self.auto_submit_disabled,
        }
    }

    pub fn view(&self) -> FunnelViewModel {
        FunnelViewModel {
            service: self.draft.service,
            countdown_armed: self.start_time.is_some(),
            submission_completed: self.submission_completed,
            batch_id: self.batch_id.clone(),
            attempts: self.attempts,
            gave_up: !self.submission_completed && self.attempts >= MAX_ATTEMPTS,
            browsing_only: self.browsing_only,
        }
    }

    pub fn draft(&self) -> &LeadDraft {
        &self.draft
    }

    pub fn batch_id(&self) -> Option<&str> {
        self.batch_id.as_deref()
    }

    pub(crate) fn set_start_time(&mut self, at: Instant) {
        self.start_time = Some(at);
    }

    pub(crate) fn set_draft(&mut self, draft: LeadDraft) {
        self.draft = draft;
    }

    pub(crate) fn set_browsing_only(&mut self, value: bool) {
        self.browsing_only = value;
    }

    pub(crate) fn set_auto_submit_disabled(&mut self, value: bool) {
        self.auto_submit_disabled = value;
    }

    /// Caps at [`MAX_ATTEMPTS`]; failures past the cap do not accumulate.
    pub(crate) fn record_failed_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1).min(MAX_ATTEMPTS);
    }

    /// Marks the session submitted. Returns false when a submission had already
    /// completed; the first batch id wins.
    pub(crate) fn complete_submission(&mut self, batch_id: String) -> bool {
        if self.submission_completed {
            return false;
        }
        self.submission_completed = true;
        self.batch_id = Some(batch_id);
        true
    }
}
