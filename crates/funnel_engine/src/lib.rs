//! Funnel engine: auto-submit control loop, lead delivery, photo processing.
mod controller;
mod events;
mod photo;
mod store;
mod submit;
mod types;

pub use controller::{apply_effects, AutoSubmitController, StateSource, SubmitSink, TimerKind};
pub use events::{ChannelEventSink, EventSink, NullEventSink};
pub use photo::{
    crop, optimize, rotated_bounding_size, CropRect, PhotoError, PhotoSettings, ProcessedPhoto,
};
pub use store::SharedFunnelStore;
pub use submit::{GraphqlLeadSubmitter, LeadSubmitter, SubmitSettings};
pub use types::{
    FunnelEvent, LeadSubmissionRequest, RequestContact, SubmissionReceipt, SubmitError,
    SubmitFailureKind, TriggerKind,
};
