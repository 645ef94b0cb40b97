use std::sync::{Arc, Mutex, MutexGuard};

use funnel_core::{
    update, AutoSubmitState, Effect, FunnelState, FunnelViewModel, LeadDraft, Msg, ServiceKind,
};
use funnel_logging::funnel_trace;

use crate::controller::{StateSource, SubmitSink};
use crate::{LeadSubmissionRequest, RequestContact, SubmissionReceipt, TriggerKind};

/// Shared, reducer-driven funnel state.
///
/// The host dispatches messages here and forwards the returned effects to the
/// controller; the controller reads snapshots and reports outcomes through the
/// [`StateSource`] and [`SubmitSink`] impls.
pub struct SharedFunnelStore {
    state: Mutex<FunnelState>,
}

impl SharedFunnelStore {
    pub fn new(draft: LeadDraft) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FunnelState::new(draft)),
        })
    }

    /// Applies a message through the pure reducer and returns its effects.
    pub fn dispatch(&self, msg: Msg) -> Vec<Effect> {
        let mut guard = self.lock_state();
        let (next, effects) = update(guard.clone(), msg);
        *guard = next;
        funnel_trace!("dispatched funnel msg; {} effect(s)", effects.len());
        effects
    }

    pub fn view(&self) -> FunnelViewModel {
        self.lock_state().view()
    }

    fn lock_state(&self) -> MutexGuard<'_, FunnelState> {
        self.state.lock().expect("funnel state lock poisoned")
    }
}

impl StateSource for SharedFunnelStore {
    fn snapshot(&self) -> AutoSubmitState {
        self.lock_state().snapshot()
    }

    fn assemble_request(&self, trigger: TriggerKind) -> LeadSubmissionRequest {
        let guard = self.lock_state();
        let draft = guard.draft();
        LeadSubmissionRequest {
            seeker_id: draft.seeker_id.clone(),
            service: service_code(draft.service).to_string(),
            zip_code: draft.zip_code.clone(),
            provider_ids: draft.provider_ids.clone(),
            contact: RequestContact {
                first_name: draft.contact.first_name.clone(),
                last_name: draft.contact.last_name.clone(),
                email: draft.contact.email.clone(),
                phone: draft.contact.phone.clone(),
            },
            message: draft.message.clone(),
            trigger: trigger.as_str().to_string(),
        }
    }
}

impl SubmitSink for SharedFunnelStore {
    fn attempt_failed(&self) {
        let _ = self.dispatch(Msg::AttemptFailed);
    }

    fn submission_completed(&self, receipt: &SubmissionReceipt) {
        // The controller cancels its own timers on success, so the
        // CancelAutoSubmit effect this produces carries no extra work.
        let _ = self.dispatch(Msg::SubmissionCompleted {
            batch_id: receipt.batch_id.clone(),
        });
    }
}

fn service_code(kind: ServiceKind) -> &'static str {
    match kind {
        ServiceKind::ChildCare => "CHILD_CARE",
        ServiceKind::Daycare => "DAY_CARE",
        ServiceKind::SeniorCare => "SENIOR_CARE",
        ServiceKind::Housekeeping => "HOUSEKEEPING",
        ServiceKind::PetCare => "PET_CARE",
        ServiceKind::Tutoring => "TUTORING",
    }
}
