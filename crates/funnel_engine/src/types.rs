use std::fmt;

use serde::Serialize;

/// What caused a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// The enrollment countdown ran out.
    Countdown,
    /// The seeker is leaving the page.
    Close,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Countdown => "countdown",
            TriggerKind::Close => "close",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wire shape of a lead batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSubmissionRequest {
    pub seeker_id: String,
    pub service: String,
    pub zip_code: String,
    pub provider_ids: Vec<String>,
    pub contact: RequestContact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub trigger: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Confirmation returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub batch_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitError {
    pub kind: SubmitFailureKind,
    pub message: String,
}

impl SubmitError {
    pub fn new(kind: SubmitFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitFailureKind {
    Network,
    Timeout,
    HttpStatus(u16),
    Protocol,
    GraphQl,
    MissingConfirmation,
}

impl fmt::Display for SubmitFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitFailureKind::Network => write!(f, "network error"),
            SubmitFailureKind::Timeout => write!(f, "timeout"),
            SubmitFailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            SubmitFailureKind::Protocol => write!(f, "malformed response"),
            SubmitFailureKind::GraphQl => write!(f, "graphql error"),
            SubmitFailureKind::MissingConfirmation => write!(f, "missing confirmation id"),
        }
    }
}

/// Notifications the engine publishes for host-side analytics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunnelEvent {
    /// Emitted exactly once per successfully delivered lead batch.
    LeadSubmitted {
        trigger: TriggerKind,
        batch_id: String,
        /// Failed attempts that preceded this success.
        failed_attempts: u32,
    },
}
