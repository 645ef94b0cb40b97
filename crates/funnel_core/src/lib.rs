//! Funnel core: pure enrollment-funnel state machine and auto-submit policy.
mod effect;
mod msg;
mod policy;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use policy::{
    countdown_remaining, retry_delay_after_failure, suppression, SuppressReason, MAX_ATTEMPTS,
    RETRY_DELAY, SUBMIT_COUNTDOWN,
};
pub use state::{AutoSubmitState, ContactInfo, FunnelState, LeadDraft, ServiceKind};
pub use update::update;
pub use view_model::FunnelViewModel;
