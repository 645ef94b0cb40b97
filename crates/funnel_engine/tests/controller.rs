use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::time;

use funnel_core::{ContactInfo, LeadDraft, Msg, ServiceKind, RETRY_DELAY, SUBMIT_COUNTDOWN};
use funnel_engine::{
    apply_effects, AutoSubmitController, ChannelEventSink, FunnelEvent, LeadSubmissionRequest,
    LeadSubmitter, NullEventSink, SharedFunnelStore, SubmissionReceipt, SubmitError,
    SubmitFailureKind, TimerKind, TriggerKind,
};

enum Reply {
    Ok(&'static str),
    Fail,
    EmptyReceipt,
    Hang,
}

struct ScriptedSubmitter {
    script: Mutex<VecDeque<Reply>>,
    calls: AtomicU32,
    requests: Mutex<Vec<LeadSubmissionRequest>>,
}

impl ScriptedSubmitter {
    fn new(script: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn triggers(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.trigger.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl LeadSubmitter for ScriptedSubmitter {
    async fn submit_lead(
        &self,
        request: &LeadSubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.script.lock().unwrap().pop_front().unwrap_or(Reply::Fail);
        match reply {
            Reply::Ok(batch_id) => Ok(SubmissionReceipt {
                batch_id: batch_id.to_string(),
            }),
            Reply::Fail => Err(SubmitError::new(
                SubmitFailureKind::Network,
                "scripted failure",
            )),
            Reply::EmptyReceipt => Ok(SubmissionReceipt {
                batch_id: String::new(),
            }),
            Reply::Hang => {
                // Parked until the virtual clock is advanced far enough.
                time::sleep(Duration::from_secs(24 * 3600)).await;
                Err(SubmitError::new(
                    SubmitFailureKind::Timeout,
                    "hung request released",
                ))
            }
        }
    }
}

struct Harness {
    store: Arc<SharedFunnelStore>,
    controller: Arc<AutoSubmitController>,
    submitter: Arc<ScriptedSubmitter>,
    events: mpsc::Receiver<FunnelEvent>,
}

fn draft() -> LeadDraft {
    LeadDraft {
        service: ServiceKind::ChildCare,
        seeker_id: "seeker-1".to_string(),
        zip_code: "94107".to_string(),
        contact: ContactInfo {
            first_name: "Kim".to_string(),
            last_name: "Lee".to_string(),
            email: "kim@example.com".to_string(),
            phone: None,
        },
        message: None,
        provider_ids: vec!["p-1".to_string()],
    }
}

impl Harness {
    async fn new(script: impl IntoIterator<Item = Reply>) -> Self {
        // Move the virtual clock away from the runtime epoch so backdated
        // start times cannot underflow the monotonic clock.
        time::advance(Duration::from_secs(48 * 3600)).await;
        let store = SharedFunnelStore::new(draft());
        let submitter = ScriptedSubmitter::new(script);
        let (tx, events) = mpsc::channel();
        let controller = AutoSubmitController::new(
            store.clone(),
            submitter.clone(),
            store.clone(),
            Arc::new(ChannelEventSink::new(tx)),
        );
        Self {
            store,
            controller,
            submitter,
            events,
        }
    }

    fn dispatch(&self, msg: Msg) {
        let effects = self.store.dispatch(msg);
        apply_effects(&self.controller, effects);
    }

    fn dispatch_without_forwarding(&self, msg: Msg) {
        let _ = self.store.dispatch(msg);
    }

    /// Starts a countdown whose window has already fully elapsed.
    fn start_countdown_elapsed(&self) {
        self.start_countdown_with_elapsed(SUBMIT_COUNTDOWN + Duration::from_secs(1));
    }

    fn start_countdown_with_elapsed(&self, elapsed: Duration) {
        let at = time::Instant::now().into_std() - elapsed;
        self.dispatch(Msg::CountdownStarted { at });
    }

    fn received_events(&self) -> Vec<FunnelEvent> {
        self.events.try_iter().collect()
    }
}

/// Lets spawned controller tasks run without advancing the clock.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn elapsed_countdown_fires_immediately_after_attach() {
    let h = Harness::new([Reply::Ok("batch-1")]).await;
    h.start_countdown_elapsed();
    h.controller.attach();
    settle().await;

    assert_eq!(h.submitter.calls(), 1);
    let view = h.store.view();
    assert!(view.submission_completed);
    assert_eq!(view.batch_id.as_deref(), Some("batch-1"));
    assert!(!h.controller.has_pending_timer());
    assert_eq!(
        h.received_events(),
        vec![FunnelEvent::LeadSubmitted {
            trigger: TriggerKind::Countdown,
            batch_id: "batch-1".to_string(),
            failed_attempts: 0,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_attempts_retry_twice_then_give_up() {
    let h = Harness::new([Reply::Fail, Reply::Fail, Reply::Fail]).await;
    h.start_countdown_elapsed();
    h.controller.attach();
    settle().await;
    assert_eq!(h.submitter.calls(), 1);
    assert_eq!(h.store.view().attempts, 1);
    assert_eq!(h.controller.pending_timer_kind(), Some(TimerKind::Retry));

    time::advance(RETRY_DELAY).await;
    settle().await;
    assert_eq!(h.submitter.calls(), 2);
    assert_eq!(h.store.view().attempts, 2);

    time::advance(RETRY_DELAY).await;
    settle().await;
    assert_eq!(h.submitter.calls(), 3);
    assert_eq!(h.store.view().attempts, 3);
    assert!(!h.controller.has_pending_timer());
    assert!(h.store.view().gave_up);

    // Exhausted means inert: no amount of waiting fires anything else.
    time::advance(Duration::from_secs(3600)).await;
    settle().await;
    assert_eq!(h.submitter.calls(), 3);
    assert!(h.received_events().is_empty());

    // Re-attaching and re-arming cannot revive an exhausted session.
    h.controller.attach();
    h.start_countdown_elapsed();
    for _ in 0..5 {
        h.controller.leave_page_intent().await;
    }
    settle().await;
    assert_eq!(h.submitter.calls(), 3);
    assert!(!h.controller.has_pending_timer());
}

#[tokio::test(start_paused = true)]
async fn browsing_only_suppresses_every_trigger() {
    let h = Harness::new([Reply::Ok("never")]).await;
    h.dispatch(Msg::BrowsingOnlyChanged(true));
    h.start_countdown_with_elapsed(Duration::ZERO);
    h.controller.attach();

    time::advance(SUBMIT_COUNTDOWN).await;
    settle().await;
    assert_eq!(h.submitter.calls(), 0);

    h.controller.leave_page_intent().await;
    h.controller.leave_page_intent().await;
    settle().await;

    assert_eq!(h.submitter.calls(), 0);
    assert!(!h.store.view().submission_completed);
    assert!(h.received_events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_triggers_collapse_to_one_submission() {
    let h = Harness::new([Reply::Hang]).await;
    h.start_countdown_elapsed();
    h.controller.attach();
    settle().await;
    assert_eq!(h.submitter.calls(), 1);

    // Both intents arrive while the first submission is still in flight.
    h.controller.leave_page_intent().await;
    h.controller.leave_page_intent().await;
    settle().await;

    assert_eq!(h.submitter.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn restarting_countdown_replaces_the_pending_timer() {
    let h = Harness::new([Reply::Ok("batch-2")]).await;
    h.start_countdown_with_elapsed(Duration::from_secs(20 * 60));
    h.controller.attach();
    settle().await;
    assert!(h.controller.has_pending_timer());

    // Restart pushes the deadline out to a fresh full window.
    h.start_countdown_with_elapsed(Duration::ZERO);
    settle().await;

    time::advance(Duration::from_secs(5 * 60)).await;
    settle().await;
    assert_eq!(h.submitter.calls(), 0);

    time::advance(SUBMIT_COUNTDOWN - Duration::from_secs(5 * 60)).await;
    settle().await;
    assert_eq!(h.submitter.calls(), 1);
    assert_eq!(h.submitter.triggers(), vec!["countdown".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn leave_page_submits_and_cancels_countdown() {
    let h = Harness::new([Reply::Ok("batch-3")]).await;
    h.start_countdown_with_elapsed(Duration::from_secs(60));
    h.controller.attach();
    settle().await;
    assert!(h.controller.has_pending_timer());

    h.controller.leave_page_intent().await;
    settle().await;

    assert_eq!(h.submitter.calls(), 1);
    assert_eq!(h.submitter.triggers(), vec!["close".to_string()]);
    assert!(h.store.view().submission_completed);
    assert!(!h.controller.has_pending_timer());

    // The old countdown deadline passing changes nothing.
    time::advance(SUBMIT_COUNTDOWN).await;
    settle().await;
    assert_eq!(h.submitter.calls(), 1);
    assert_eq!(h.received_events().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_reuses_the_original_trigger() {
    let h = Harness::new([Reply::Fail, Reply::Ok("batch-4")]).await;
    h.start_countdown_with_elapsed(Duration::from_secs(60));
    h.controller.attach();
    h.controller.leave_page_intent().await;
    settle().await;
    assert_eq!(h.store.view().attempts, 1);
    assert_eq!(h.controller.pending_timer_kind(), Some(TimerKind::Retry));

    time::advance(RETRY_DELAY).await;
    settle().await;

    assert_eq!(h.submitter.calls(), 2);
    assert_eq!(
        h.submitter.triggers(),
        vec!["close".to_string(), "close".to_string()]
    );
    assert!(h.store.view().submission_completed);
    assert!(!h.controller.has_pending_timer());
    assert_eq!(
        h.received_events(),
        vec![FunnelEvent::LeadSubmitted {
            trigger: TriggerKind::Close,
            batch_id: "batch-4".to_string(),
            failed_attempts: 1,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn empty_confirmation_counts_as_failure() {
    let h = Harness::new([Reply::EmptyReceipt, Reply::Ok("batch-5")]).await;
    h.start_countdown_elapsed();
    h.controller.attach();
    settle().await;

    assert_eq!(h.store.view().attempts, 1);
    assert!(!h.store.view().submission_completed);

    time::advance(RETRY_DELAY).await;
    settle().await;
    assert!(h.store.view().submission_completed);
    assert_eq!(h.store.view().batch_id.as_deref(), Some("batch-5"));
}

#[tokio::test(start_paused = true)]
async fn completed_submission_suppresses_a_live_timer() {
    let h = Harness::new([Reply::Ok("never")]).await;
    h.start_countdown_with_elapsed(Duration::from_secs(60));
    h.controller.attach();
    settle().await;
    assert!(h.controller.has_pending_timer());

    // A manual submission lands without its cancel effect being forwarded,
    // so the timer stays armed and must suppress itself at fire time.
    h.dispatch_without_forwarding(Msg::SubmissionCompleted {
        batch_id: "manual-1".to_string(),
    });
    assert!(h.controller.has_pending_timer());

    time::advance(SUBMIT_COUNTDOWN).await;
    settle().await;
    assert_eq!(h.submitter.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn kill_switch_suppresses_at_fire_time() {
    let h = Harness::new([Reply::Ok("never")]).await;
    h.start_countdown_with_elapsed(Duration::ZERO);
    h.controller.attach();
    h.dispatch(Msg::AutoSubmitDisabledChanged(true));

    time::advance(SUBMIT_COUNTDOWN).await;
    settle().await;
    assert_eq!(h.submitter.calls(), 0);

    h.controller.leave_page_intent().await;
    assert_eq!(h.submitter.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn leave_page_without_countdown_never_submits() {
    let h = Harness::new([Reply::Ok("never")]).await;
    h.controller.attach();

    h.controller.leave_page_intent().await;
    settle().await;

    assert_eq!(h.submitter.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_attempts_suppress_new_triggers() {
    let h = Harness::new([Reply::Ok("never")]).await;
    h.start_countdown_with_elapsed(Duration::from_secs(60));
    h.controller.attach();
    for _ in 0..3 {
        h.dispatch_without_forwarding(Msg::AttemptFailed);
    }

    h.controller.leave_page_intent().await;
    settle().await;

    assert_eq!(h.submitter.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn teardown_suppresses_late_outcomes() {
    let h = Harness::new([Reply::Hang]).await;
    h.start_countdown_elapsed();
    h.controller.attach();
    settle().await;
    assert_eq!(h.submitter.calls(), 1);

    h.controller.teardown();
    h.controller.teardown();

    // Release the hung request; its outcome must go nowhere.
    time::advance(Duration::from_secs(24 * 3600)).await;
    settle().await;

    assert_eq!(h.store.view().attempts, 0);
    assert!(!h.store.view().submission_completed);
    assert!(h.received_events().is_empty());
    assert!(!h.controller.has_pending_timer());

    // New inputs after teardown are ignored.
    h.start_countdown_elapsed();
    h.controller.leave_page_intent().await;
    settle().await;
    assert_eq!(h.submitter.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_attach_keeps_a_single_timer() {
    let h = Harness::new([Reply::Ok("batch-6")]).await;
    h.start_countdown_with_elapsed(Duration::ZERO);
    h.controller.attach();
    h.controller.attach();
    h.controller.attach();
    settle().await;
    assert!(h.controller.has_pending_timer());

    time::advance(SUBMIT_COUNTDOWN).await;
    settle().await;
    assert_eq!(h.submitter.calls(), 1);

    time::advance(SUBMIT_COUNTDOWN).await;
    settle().await;
    assert_eq!(h.submitter.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn clearing_start_time_cancels_the_countdown() {
    let h = Harness::new([Reply::Ok("never")]).await;
    h.start_countdown_with_elapsed(Duration::ZERO);
    h.controller.attach();
    settle().await;
    assert!(h.controller.has_pending_timer());

    h.controller.countdown_start_changed(None);
    assert!(!h.controller.has_pending_timer());

    time::advance(SUBMIT_COUNTDOWN).await;
    settle().await;
    assert_eq!(h.submitter.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn hosts_without_analytics_submit_normally() {
    time::advance(Duration::from_secs(48 * 3600)).await;
    let store = SharedFunnelStore::new(draft());
    let submitter = ScriptedSubmitter::new([Reply::Ok("batch-7")]);
    let controller = AutoSubmitController::new(
        store.clone(),
        submitter.clone(),
        store.clone(),
        Arc::new(NullEventSink),
    );

    let at = time::Instant::now().into_std() - SUBMIT_COUNTDOWN - Duration::from_secs(1);
    apply_effects(&controller, store.dispatch(Msg::CountdownStarted { at }));
    controller.attach();
    settle().await;

    assert_eq!(submitter.calls(), 1);
    let view = store.view();
    assert!(view.submission_completed);
    assert_eq!(view.batch_id.as_deref(), Some("batch-7"));
}
