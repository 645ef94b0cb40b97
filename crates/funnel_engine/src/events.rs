use crate::FunnelEvent;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: FunnelEvent);
}

pub struct ChannelEventSink {
    tx: std::sync::mpsc::Sender<FunnelEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: std::sync::mpsc::Sender<FunnelEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: FunnelEvent) {
        let _ = self.tx.send(event);
    }
}

/// Sink for hosts that do not consume analytics events.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: FunnelEvent) {}
}
