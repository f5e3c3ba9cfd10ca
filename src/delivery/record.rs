use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Widest failure reason the error_message column can hold, in characters.
pub const ERROR_MESSAGE_MAX_LEN: usize = 1000;

/// Communication medium for a notification.
///
/// Persisted as a small fixed code (see [`Channel::as_i16`]) so storage and
/// query indexes stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Email,
    #[serde(rename = "SMS")]
    Sms,
    WhatsApp,
    Push,
}

impl Channel {
    pub fn as_i16(&self) -> i16 {
        match self {
            Channel::Email => 0,
            Channel::Sms => 1,
            Channel::WhatsApp => 2,
            Channel::Push => 3,
        }
    }

    pub fn from_i16(code: i16) -> Option<Self> {
        match code {
            0 => Some(Channel::Email),
            1 => Some(Channel::Sms),
            2 => Some(Channel::WhatsApp),
            3 => Some(Channel::Push),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Channel::Email => "Email",
            Channel::Sms => "SMS",
            Channel::WhatsApp => "WhatsApp",
            Channel::Push => "Push",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle status of a delivery record.
///
/// Legal transitions: `Pending -> Sent`, `Pending -> Failed`,
/// `Failed -> Pending` (operator retry). `Sent` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_i16(&self) -> i16 {
        match self {
            DeliveryStatus::Pending => 0,
            DeliveryStatus::Sent => 1,
            DeliveryStatus::Failed => 2,
        }
    }

    pub fn from_i16(code: i16) -> Option<Self> {
        match code {
            0 => Some(DeliveryStatus::Pending),
            1 => Some(DeliveryStatus::Sent),
            2 => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeliveryStatus::Pending => "Pending",
            DeliveryStatus::Sent => "Sent",
            DeliveryStatus::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

/// One persisted notification attempt and its current status.
///
/// Status fields are mutated only through the dispatcher's transition
/// operations; id, tenant, channel and created_at are immutable after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub recipient: String,
    pub channel: Channel,
    pub subject: String,
    pub body: String,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

impl DeliveryRecord {
    /// Create a new pending record.
    pub fn new(
        tenant_id: Uuid,
        recipient: impl Into<String>,
        channel: Channel,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            recipient: recipient.into(),
            channel,
            subject: subject.into(),
            body: body.into(),
            status: DeliveryStatus::Pending,
            created_at: Utc::now(),
            sent_at: None,
            error_message: None,
            retry_count: 0,
        }
    }

    /// Transition into `Sent`, stamping the send time.
    pub fn mark_sent(&mut self, at: DateTime<Utc>) {
        self.status = DeliveryStatus::Sent;
        self.sent_at = Some(at);
        self.error_message = None;
    }

    /// Transition into `Failed`, recording the reason and counting the attempt.
    ///
    /// Gateway responses can be arbitrarily long; the reason is truncated to
    /// the persisted column width so the transition can always be stored.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        let mut reason = reason.into();
        if reason.chars().count() > ERROR_MESSAGE_MAX_LEN {
            reason = reason.chars().take(ERROR_MESSAGE_MAX_LEN).collect();
        }
        self.status = DeliveryStatus::Failed;
        self.error_message = Some(reason);
        self.retry_count += 1;
    }

    /// Reset a failed record back to `Pending` for another attempt.
    pub fn reset_for_retry(&mut self) {
        self.status = DeliveryStatus::Pending;
        self.error_message = None;
    }
}

/// A status change the store applies under compare-and-set on the current
/// status, so concurrent readers never observe a half-applied transition.
#[derive(Debug, Clone)]
pub enum StatusChange {
    Sent { at: DateTime<Utc> },
    Failed { reason: String },
    PendingRetry,
}

impl StatusChange {
    /// The only status a record may be in for this change to apply.
    pub fn expected_status(&self) -> DeliveryStatus {
        match self {
            StatusChange::Sent { .. } | StatusChange::Failed { .. } => DeliveryStatus::Pending,
            StatusChange::PendingRetry => DeliveryStatus::Failed,
        }
    }

    /// Apply this change to a record already verified to be in the
    /// expected status.
    pub fn apply(&self, record: &mut DeliveryRecord) {
        match self {
            StatusChange::Sent { at } => record.mark_sent(*at),
            StatusChange::Failed { reason } => record.mark_failed(reason.clone()),
            StatusChange::PendingRetry => record.reset_for_retry(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_record() -> DeliveryRecord {
        DeliveryRecord::new(Uuid::new_v4(), "user@x.com", Channel::Email, "Hi", "there")
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = pending_record();
        assert_eq!(record.status, DeliveryStatus::Pending);
        assert!(record.sent_at.is_none());
        assert!(record.error_message.is_none());
        assert_eq!(record.retry_count, 0);
    }

    #[test]
    fn test_mark_sent_sets_sent_at() {
        let mut record = pending_record();
        let now = Utc::now();
        record.mark_sent(now);

        assert_eq!(record.status, DeliveryStatus::Sent);
        assert_eq!(record.sent_at, Some(now));
        assert!(record.error_message.is_none());
        assert!(record.created_at <= record.sent_at.unwrap());
    }

    #[test]
    fn test_mark_failed_counts_attempt() {
        let mut record = pending_record();
        record.mark_failed("smtp timeout");

        assert_eq!(record.status, DeliveryStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("smtp timeout"));
        assert_eq!(record.retry_count, 1);
        assert!(record.sent_at.is_none());

        record.reset_for_retry();
        record.mark_failed("smtp timeout");
        assert_eq!(record.retry_count, 2);
    }

    #[test]
    fn test_mark_failed_truncates_oversized_reason() {
        let mut record = pending_record();
        record.mark_failed("x".repeat(ERROR_MESSAGE_MAX_LEN + 500));

        let stored = record.error_message.as_deref().unwrap();
        assert_eq!(stored.chars().count(), ERROR_MESSAGE_MAX_LEN);

        // A reason at the bound is kept whole
        let mut record = pending_record();
        record.mark_failed("y".repeat(ERROR_MESSAGE_MAX_LEN));
        assert_eq!(
            record.error_message.as_deref().unwrap().chars().count(),
            ERROR_MESSAGE_MAX_LEN
        );
    }

    #[test]
    fn test_reset_for_retry_clears_error() {
        let mut record = pending_record();
        record.mark_failed("rejected");
        record.reset_for_retry();

        assert_eq!(record.status, DeliveryStatus::Pending);
        assert!(record.error_message.is_none());
        // Attempt history is preserved
        assert_eq!(record.retry_count, 1);
    }

    #[test]
    fn test_status_change_expected_status() {
        assert_eq!(
            StatusChange::Sent { at: Utc::now() }.expected_status(),
            DeliveryStatus::Pending
        );
        assert_eq!(
            StatusChange::Failed { reason: "x".into() }.expected_status(),
            DeliveryStatus::Pending
        );
        assert_eq!(
            StatusChange::PendingRetry.expected_status(),
            DeliveryStatus::Failed
        );
    }

    #[test]
    fn test_channel_codes_roundtrip() {
        for channel in [Channel::Email, Channel::Sms, Channel::WhatsApp, Channel::Push] {
            assert_eq!(Channel::from_i16(channel.as_i16()), Some(channel));
        }
        assert_eq!(Channel::from_i16(9), None);
    }

    #[test]
    fn test_channel_wire_names() {
        assert_eq!(serde_json::to_string(&Channel::Sms).unwrap(), "\"SMS\"");
        assert_eq!(
            serde_json::from_str::<Channel>("\"WhatsApp\"").unwrap(),
            Channel::WhatsApp
        );
        assert!(serde_json::from_str::<Channel>("\"Pigeon\"").is_err());
    }

    #[test]
    fn test_status_codes_roundtrip() {
        for status in [
            DeliveryStatus::Pending,
            DeliveryStatus::Sent,
            DeliveryStatus::Failed,
        ] {
            assert_eq!(DeliveryStatus::from_i16(status.as_i16()), Some(status));
        }
        assert_eq!(DeliveryStatus::from_i16(-1), None);
    }
}
