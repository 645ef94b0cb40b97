use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use funnel_core::{
    countdown_remaining, retry_delay_after_failure, suppression, AutoSubmitState, Effect,
    MAX_ATTEMPTS,
};
use funnel_logging::{funnel_debug, funnel_info, funnel_warn};

use crate::{
    EventSink, FunnelEvent, LeadSubmissionRequest, LeadSubmitter, SubmissionReceipt, SubmitError,
    SubmitFailureKind, TriggerKind,
};

/// Read access to the host-owned funnel state.
pub trait StateSource: Send + Sync {
    fn snapshot(&self) -> AutoSubmitState;
    fn assemble_request(&self, trigger: TriggerKind) -> LeadSubmissionRequest;
}

/// Outcome notifications delivered back to the host store.
///
/// `attempt_failed` must advance the attempt counter the next `snapshot`
/// reports. Implementations run on the controller's worker tasks and must not
/// call back into the controller.
pub trait SubmitSink: Send + Sync {
    fn attempt_failed(&self);
    fn submission_completed(&self, receipt: &SubmissionReceipt);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Countdown,
    Retry,
}

struct PendingTimer {
    kind: TimerKind,
    trigger: TriggerKind,
    seq: u64,
    token: CancellationToken,
}

struct Inner {
    attached: bool,
    torn_down: bool,
    in_flight: bool,
    pending: Option<PendingTimer>,
    next_seq: u64,
}

/// Drives unattended lead submission for one funnel session.
///
/// The controller owns no funnel state. It reads snapshots through
/// [`StateSource`], reports outcomes through [`SubmitSink`], and keeps at most
/// one timer armed and at most one submission in flight at any moment.
pub struct AutoSubmitController {
    source: Arc<dyn StateSource>,
    submitter: Arc<dyn LeadSubmitter>,
    sink: Arc<dyn SubmitSink>,
    events: Arc<dyn EventSink>,
    runtime: tokio::runtime::Handle,
    inner: Mutex<Inner>,
    // Serializes outcome delivery against teardown. Held while invoking the
    // sink/event callbacks so teardown cannot return mid-notification.
    detached: Mutex<bool>,
}

impl AutoSubmitController {
    /// Builds a controller on the current tokio runtime.
    ///
    /// Panics when called outside a runtime.
    pub fn new(
        source: Arc<dyn StateSource>,
        submitter: Arc<dyn LeadSubmitter>,
        sink: Arc<dyn SubmitSink>,
        events: Arc<dyn EventSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            submitter,
            sink,
            events,
            runtime: tokio::runtime::Handle::current(),
            inner: Mutex::new(Inner {
                attached: false,
                torn_down: false,
                in_flight: false,
                pending: None,
                next_seq: 0,
            }),
            detached: Mutex::new(false),
        })
    }

    /// Begins observing the session. Arms the countdown when the session
    /// already carries a start time and no timer is pending; a pending timer
    /// survives re-attach untouched. Safe to call repeatedly.
    pub fn attach(self: &Arc<Self>) {
        {
            let mut inner = self.lock_inner();
            if inner.torn_down {
                funnel_debug!("attach ignored: controller torn down");
                return;
            }
            if !inner.attached {
                funnel_info!("auto-submit controller attached");
            }
            inner.attached = true;
            if inner.pending.is_some() {
                return;
            }
        }
        let snapshot = self.source.snapshot();
        if let Some(start) = snapshot.start_time {
            self.countdown_start_changed(Some(start));
        }
    }

    /// Reconciles the countdown timer with a changed start time.
    ///
    /// `Some` cancels whatever timer is pending and arms a fresh countdown for
    /// the remaining window; `None` just cancels.
    pub fn countdown_start_changed(self: &Arc<Self>, start_time: Option<Instant>) {
        let mut inner = self.lock_inner();
        if inner.torn_down || !inner.attached {
            funnel_debug!("countdown change ignored: controller not attached");
            return;
        }
        match start_time {
            None => Self::cancel_pending_locked(&mut inner),
            Some(start) => {
                let remaining = countdown_remaining(start, tokio::time::Instant::now().into_std());
                self.arm_locked(
                    &mut inner,
                    TimerKind::Countdown,
                    TriggerKind::Countdown,
                    remaining,
                );
            }
        }
    }

    /// Handler for the host's leave-page signal. Runs a submission attempt
    /// with the [`TriggerKind::Close`] trigger, subject to the same guards as
    /// a fired countdown.
    pub async fn leave_page_intent(self: &Arc<Self>) {
        self.clone().run_attempt(TriggerKind::Close).await;
    }

    /// Cancels any pending countdown or retry timer.
    pub fn cancel_pending(&self) {
        let mut inner = self.lock_inner();
        Self::cancel_pending_locked(&mut inner);
    }

    /// Stops observing: cancels timers and suppresses every later callback.
    /// Once an in-progress outcome notification finishes, no sink or event
    /// call happens after this returns. Terminal and safe to call repeatedly.
    pub fn teardown(&self) {
        {
            let mut detached = self.lock_detached();
            *detached = true;
        }
        let mut inner = self.lock_inner();
        if inner.torn_down {
            return;
        }
        inner.torn_down = true;
        inner.attached = false;
        Self::cancel_pending_locked(&mut inner);
        funnel_info!("auto-submit controller torn down");
    }

    /// True while a countdown or retry timer is armed.
    pub fn has_pending_timer(&self) -> bool {
        self.lock_inner().pending.is_some()
    }

    pub fn pending_timer_kind(&self) -> Option<TimerKind> {
        self.lock_inner().pending.as_ref().map(|pending| pending.kind)
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("controller state lock poisoned")
    }

    fn lock_detached(&self) -> MutexGuard<'_, bool> {
        self.detached.lock().expect("detach gate lock poisoned")
    }

    // Single timer slot: arming always replaces the previous timer.
    fn arm_locked(
        self: &Arc<Self>,
        inner: &mut Inner,
        kind: TimerKind,
        trigger: TriggerKind,
        delay: Duration,
    ) {
        Self::cancel_pending_locked(inner);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let token = CancellationToken::new();
        inner.pending = Some(PendingTimer {
            kind,
            trigger,
            seq,
            token: token.clone(),
        });

        let deadline = tokio::time::Instant::now() + delay;
        let controller = Arc::downgrade(self);
        self.runtime.spawn(async move {
            if token
                .run_until_cancelled(tokio::time::sleep_until(deadline))
                .await
                .is_some()
            {
                if let Some(controller) = controller.upgrade() {
                    controller.timer_fired(seq).await;
                }
            }
        });
        funnel_debug!("armed {:?} timer seq={} delay={:?}", kind, seq, delay);
    }

    fn cancel_pending_locked(inner: &mut Inner) {
        if let Some(pending) = inner.pending.take() {
            pending.token.cancel();
            funnel_debug!(
                "cancelled pending {:?} timer seq={}",
                pending.kind,
                pending.seq
            );
        }
    }

    async fn timer_fired(self: Arc<Self>, seq: u64) {
        let trigger = {
            let mut inner = self.lock_inner();
            if inner.torn_down {
                return;
            }
            // A mismatched seq means a newer timer owns the slot.
            match inner.pending.take_if(|pending| pending.seq == seq) {
                Some(pending) => pending.trigger,
                None => return,
            }
        };
        self.run_attempt(trigger).await;
    }

    async fn run_attempt(self: Arc<Self>, trigger: TriggerKind) {
        {
            let mut inner = self.lock_inner();
            if inner.torn_down || !inner.attached {
                return;
            }
            if inner.in_flight {
                funnel_debug!("{} trigger dropped: submission already in flight", trigger);
                return;
            }
            inner.in_flight = true;
        }

        let snapshot = self.source.snapshot();
        if let Some(reason) = suppression(&snapshot) {
            funnel_debug!("{} trigger suppressed: {}", trigger, reason);
            self.lock_inner().in_flight = false;
            return;
        }

        let request = self.source.assemble_request(trigger);
        funnel_info!(
            "submitting lead batch trigger={} attempt={}",
            trigger,
            snapshot.attempts + 1
        );

        let outcome = self.submitter.submit_lead(&request).await;
        // A receipt without a batch id is a failed attempt, not a success.
        let outcome = match outcome {
            Ok(receipt) if receipt.batch_id.is_empty() => Err(SubmitError::new(
                SubmitFailureKind::MissingConfirmation,
                "receipt carried no batch id",
            )),
            other => other,
        };

        match outcome {
            Ok(receipt) => self.finish_success(trigger, snapshot.attempts, receipt),
            Err(err) => self.finish_failure(trigger, err),
        }
    }

    fn finish_success(&self, trigger: TriggerKind, failed_attempts: u32, receipt: SubmissionReceipt) {
        // Success is terminal; nothing may fire afterwards.
        self.cancel_pending();
        let delivered = {
            let detached = self.lock_detached();
            if *detached {
                false
            } else {
                self.sink.submission_completed(&receipt);
                self.events.emit(FunnelEvent::LeadSubmitted {
                    trigger,
                    batch_id: receipt.batch_id.clone(),
                    failed_attempts,
                });
                true
            }
        };
        self.lock_inner().in_flight = false;
        if delivered {
            funnel_info!(
                "lead batch submitted trigger={} batch_id={}",
                trigger,
                receipt.batch_id
            );
        } else {
            funnel_debug!("submission landed after teardown; outcome dropped");
        }
    }

    fn finish_failure(self: &Arc<Self>, trigger: TriggerKind, err: SubmitError) {
        let attempts_after = {
            let detached = self.lock_detached();
            if *detached {
                None
            } else {
                self.sink.attempt_failed();
                Some(self.source.snapshot().attempts)
            }
        };

        let Some(attempts) = attempts_after else {
            self.lock_inner().in_flight = false;
            funnel_debug!("submission failed after teardown; outcome dropped");
            return;
        };

        funnel_warn!(
            "lead submission failed ({}); attempt {} of {}",
            err,
            attempts,
            MAX_ATTEMPTS
        );

        let mut inner = self.lock_inner();
        inner.in_flight = false;
        if inner.torn_down {
            return;
        }
        match retry_delay_after_failure(attempts) {
            Some(delay) => self.arm_locked(&mut inner, TimerKind::Retry, trigger, delay),
            None => {
                Self::cancel_pending_locked(&mut inner);
                drop(inner);
                funnel_warn!("auto-submit giving up after {} attempts", MAX_ATTEMPTS);
            }
        }
    }
}

/// Forwards reducer effects to the controller.
pub fn apply_effects(controller: &Arc<AutoSubmitController>, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::SyncCountdown { start_time } => controller.countdown_start_changed(start_time),
            Effect::CancelAutoSubmit => controller.cancel_pending(),
        }
    }
}
