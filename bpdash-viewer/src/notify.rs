/*!
Timed, non-blocking notifications.

Every user-visible failure becomes a [`Notification`]. They expire after a
TTL, except the channel-closed one which stays until dismissed: the session
is dead and the user has to reload.
*/

use crate::error::{FetchError, ValidationError, ViewerError};
use bpdash_core::ProtocolError;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Fetch,
    Protocol,
    ChannelClosed,
    Validation,
    Unconfirmed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    /// Raw frame that caused a protocol error.
    pub payload: Option<String>,
    pub expires_at: Option<Instant>,
}

impl Notification {
    pub fn is_persistent(&self) -> bool {
        self.expires_at.is_none()
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

pub struct Notifier {
    ttl: Duration,
    next_id: u64,
    items: Vec<Notification>,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_id: 1,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, kind: NotificationKind, message: impl Into<String>, payload: Option<String>) -> u64 {
        self.push_at(Instant::now(), kind, message, payload)
    }

    pub fn push_at(
        &mut self,
        now: Instant,
        kind: NotificationKind,
        message: impl Into<String>,
        payload: Option<String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let expires_at = match kind {
            NotificationKind::ChannelClosed => None,
            _ => Some(now + self.ttl),
        };
        self.items.push(Notification {
            id,
            kind,
            message: message.into(),
            payload,
            expires_at,
        });
        id
    }

    pub fn fetch_failed(&mut self, err: &FetchError) -> u64 {
        self.push(NotificationKind::Fetch, err.to_string(), None)
    }

    pub fn protocol_error(&mut self, err: &ProtocolError, raw: &str) -> u64 {
        self.push(NotificationKind::Protocol, err.to_string(), Some(raw.to_string()))
    }

    pub fn invalid(&mut self, err: &ValidationError) -> u64 {
        self.push(NotificationKind::Validation, err.to_string(), None)
    }

    /// Files any viewer failure under its kind. A channel that could not be
    /// opened counts as closed.
    pub fn failed(&mut self, err: &ViewerError) -> u64 {
        match err {
            ViewerError::Fetch(e) => self.fetch_failed(e),
            ViewerError::Validation(e) => self.invalid(e),
            ViewerError::Connect { .. } => self.push(NotificationKind::ChannelClosed, err.to_string(), None),
        }
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    pub fn active(&self, now: Instant) -> Vec<&Notification> {
        self.items.iter().filter(|n| n.is_live(now)).collect()
    }

    /// Drops expired notifications, returns how many went away.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.items.len();
        self.items.retain(|n| n.is_live(now));
        before - self.items.len()
    }

    pub fn all(&self) -> &[Notification] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifications_expire_except_channel_closed() {
        let mut notifier = Notifier::new(Duration::from_secs(8));
        let t0 = Instant::now();
        notifier.push_at(t0, NotificationKind::Fetch, "hub unreachable", None);
        let closed = notifier.push_at(t0, NotificationKind::ChannelClosed, "channel closed", None);

        assert_eq!(notifier.active(t0 + Duration::from_secs(7)).len(), 2);
        let later = t0 + Duration::from_secs(9);
        let active = notifier.active(later);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, closed);
        assert!(active[0].is_persistent());

        assert_eq!(notifier.prune(later), 1);
        assert_eq!(notifier.all().len(), 1);
    }

    #[test]
    fn test_dismiss() {
        let mut notifier = Notifier::new(Duration::from_secs(8));
        let id = notifier.push(NotificationKind::ChannelClosed, "closed", None);
        assert!(notifier.dismiss(id));
        assert!(!notifier.dismiss(id));
        assert!(notifier.active(Instant::now()).is_empty());
    }

    #[test]
    fn test_protocol_error_keeps_payload() {
        let mut notifier = Notifier::new(Duration::from_secs(8));
        let raw = r#"{"host":"h","service":"s","attrs":{"mystery":true}}"#;
        let err = ProtocolError::UnknownField {
            field: "mystery".into(),
            payload: raw.into(),
        };
        notifier.protocol_error(&err, raw);
        let n = &notifier.all()[0];
        assert_eq!(n.kind, NotificationKind::Protocol);
        assert_eq!(n.payload.as_deref(), Some(raw));
        assert!(n.message.contains("mystery"));
    }

    #[test]
    fn test_validation_failure_is_a_timed_notification() {
        let mut notifier = Notifier::new(Duration::from_secs(8));
        let id = notifier.failed(&ViewerError::Validation(ValidationError::EmptyAnnotation));
        let n = &notifier.all()[0];
        assert_eq!(n.id, id);
        assert_eq!(n.kind, NotificationKind::Validation);
        assert!(!n.is_persistent());
        assert_eq!(n.message, "annotation must not be empty");
    }
}
