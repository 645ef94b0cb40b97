//! Auto-submit timing and suppression rules.
//!
//! All functions here are pure; the engine feeds them clock readings and
//! state snapshots and acts on the answers.

use std::fmt;
use std::time::{Duration, Instant};

use crate::AutoSubmitState;

/// Window after which an unsubmitted lead is auto-submitted.
pub const SUBMIT_COUNTDOWN: Duration = Duration::from_millis(25 * 60 * 1000);

/// Pause between a failed submission attempt and its retry.
pub const RETRY_DELAY: Duration = Duration::from_millis(5 * 1000);

/// Total submission attempts before the controller goes inert.
pub const MAX_ATTEMPTS: u32 = 3;

/// Why a fired trigger must not submit. Conditions are checked in declaration
/// order; the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    AlreadySubmitted,
    CountdownNotArmed,
    AttemptsExhausted,
    FeatureDisabled,
    BrowsingOnly,
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SuppressReason::AlreadySubmitted => "submission already completed",
            SuppressReason::CountdownNotArmed => "countdown never armed",
            SuppressReason::AttemptsExhausted => "attempts exhausted",
            SuppressReason::FeatureDisabled => "auto-submit disabled",
            SuppressReason::BrowsingOnly => "seeker is browsing only",
        };
        write!(f, "{text}")
    }
}

/// Decides whether a fired trigger must be swallowed instead of submitting.
pub fn suppression(state: &AutoSubmitState) -> Option<SuppressReason> {
    if state.submission_completed {
        return Some(SuppressReason::AlreadySubmitted);
    }
    if state.start_time.is_none() {
        return Some(SuppressReason::CountdownNotArmed);
    }
    if state.attempts >= MAX_ATTEMPTS {
        return Some(SuppressReason::AttemptsExhausted);
    }
    if state.auto_submit_disabled {
        return Some(SuppressReason::FeatureDisabled);
    }
    if state.browsing_only {
        return Some(SuppressReason::BrowsingOnly);
    }
    None
}

/// Remaining countdown delay, clamped at zero once the window has elapsed.
///
/// A `start_time` in the future is treated as starting now: the result is
/// the full window, never more.
pub fn countdown_remaining(start_time: Instant, now: Instant) -> Duration {
    SUBMIT_COUNTDOWN.saturating_sub(now.saturating_duration_since(start_time))
}

/// Delay before the next retry, or `None` once `attempts` leaves no budget
/// for another try.
pub fn retry_delay_after_failure(attempts: u32) -> Option<Duration> {
    (attempts < MAX_ATTEMPTS).then_some(RETRY_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_snapshot(start_time: Option<Instant>) -> AutoSubmitState {
        AutoSubmitState {
            start_time,
            submission_completed: false,
            attempts: 0,
            browsing_only: false,
            auto_submit_disabled: false,
        }
    }

    #[test]
    fn remaining_shrinks_with_elapsed_time() {
        let start = Instant::now();
        let now = start + Duration::from_secs(10 * 60);
        assert_eq!(
            countdown_remaining(start, now),
            Duration::from_secs(15 * 60)
        );
    }

    #[test]
    fn remaining_clamps_to_zero_after_window() {
        let start = Instant::now();
        let now = start + SUBMIT_COUNTDOWN + Duration::from_secs(1);
        assert_eq!(countdown_remaining(start, now), Duration::ZERO);
    }

    #[test]
    fn remaining_is_full_window_for_future_start() {
        let now = Instant::now();
        let start = now + Duration::from_secs(5);
        assert_eq!(countdown_remaining(start, now), SUBMIT_COUNTDOWN);
    }

    #[test]
    fn retry_delay_until_budget_is_gone() {
        assert_eq!(retry_delay_after_failure(0), Some(RETRY_DELAY));
        assert_eq!(retry_delay_after_failure(1), Some(RETRY_DELAY));
        assert_eq!(retry_delay_after_failure(2), Some(RETRY_DELAY));
        assert_eq!(retry_delay_after_failure(3), None);
        assert_eq!(retry_delay_after_failure(7), None);
    }

    #[test]
    fn clean_armed_snapshot_is_not_suppressed() {
        let snapshot = idle_snapshot(Some(Instant::now()));
        assert_eq!(suppression(&snapshot), None);
    }

    #[test]
    fn completed_wins_over_every_other_reason() {
        let snapshot = AutoSubmitState {
            start_time: None,
            submission_completed: true,
            attempts: MAX_ATTEMPTS,
            browsing_only: true,
            auto_submit_disabled: true,
        };
        assert_eq!(suppression(&snapshot), Some(SuppressReason::AlreadySubmitted));
    }

    #[test]
    fn unarmed_checked_before_attempt_budget() {
        let mut snapshot = idle_snapshot(None);
        snapshot.attempts = MAX_ATTEMPTS;
        assert_eq!(suppression(&snapshot), Some(SuppressReason::CountdownNotArmed));
    }

    #[test]
    fn disabled_checked_before_browsing_only() {
        let mut snapshot = idle_snapshot(Some(Instant::now()));
        snapshot.auto_submit_disabled = true;
        snapshot.browsing_only = true;
        assert_eq!(suppression(&snapshot), Some(SuppressReason::FeatureDisabled));
    }
}
