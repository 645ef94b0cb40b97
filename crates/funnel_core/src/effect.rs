use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    SyncCountdown { start_time: Option<Instant> },
    CancelAutoSubmit,
}
