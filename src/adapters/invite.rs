//! Meeting invites.
//!
//! Delivery is mocked: [`MockInviteSender`] renders the iCalendar attachment
//! a real mailer would send, keeps the most recent invites in memory and
//! hands back a message id.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

const ICS_PRODID: &str = "-//yessir//voice intake//EN";
const ICS_UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const ICS_LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Invites the mock sender keeps before dropping the oldest
pub const DEFAULT_OUTBOX_CAPACITY: usize = 100;

#[derive(Debug, Error)]
pub enum InviteError {
    #[error("invite delivery failed: {0}")]
    Delivery(String),
}

/// A meeting invite to deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingInvite {
    pub recipient: String,
    pub sender: String,
    pub title: String,
    /// ISO-8601 start as produced by the classifier
    pub start_time: String,
    pub duration_minutes: u32,
    pub timezone: String,
}

impl MeetingInvite {
    /// Email subject line
    pub fn subject(&self) -> String {
        format!("Invitation: {}", self.title)
    }

    /// Render an iCalendar document, or `None` if the start time is unreadable
    pub fn to_ics(&self, uid: &str, stamp: DateTime<Utc>) -> Option<String> {
        let (dtstart, dtend) = self.ics_times()?;

        let lines = [
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            format!("PRODID:{}", ICS_PRODID),
            "METHOD:REQUEST".to_string(),
            "BEGIN:VEVENT".to_string(),
            format!("UID:{}", uid),
            format!("DTSTAMP:{}", stamp.format(ICS_UTC_FORMAT)),
            format!("SUMMARY:{}", escape_ics_text(&self.title)),
            format!("ORGANIZER:mailto:{}", self.sender),
            format!("ATTENDEE:mailto:{}", self.recipient),
            dtstart,
            dtend,
            "END:VEVENT".to_string(),
            "END:VCALENDAR".to_string(),
        ];

        let mut ics = lines.join("\r\n");
        ics.push_str("\r\n");
        Some(ics)
    }

    fn ics_times(&self) -> Option<(String, String)> {
        let length = Duration::minutes(i64::from(self.duration_minutes));
        let raw = self.start_time.trim();

        if let Ok(start) = DateTime::parse_from_rfc3339(raw) {
            let start = start.with_timezone(&Utc);
            let end = start + length;
            return Some((
                format!("DTSTART:{}", start.format(ICS_UTC_FORMAT)),
                format!("DTEND:{}", end.format(ICS_UTC_FORMAT)),
            ));
        }

        let start = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())?;
        let end = start + length;

        let tz = self.timezone.trim();
        if tz.is_empty() || tz.eq_ignore_ascii_case("UTC") {
            Some((
                format!("DTSTART:{}", start.format(ICS_UTC_FORMAT)),
                format!("DTEND:{}", end.format(ICS_UTC_FORMAT)),
            ))
        } else {
            Some((
                format!("DTSTART;TZID={}:{}", tz, start.format(ICS_LOCAL_FORMAT)),
                format!("DTEND;TZID={}:{}", tz, end.format(ICS_LOCAL_FORMAT)),
            ))
        }
    }
}

fn escape_ics_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Delivers meeting invites
#[async_trait]
pub trait InviteSender: Send + Sync {
    /// Send the invite, returning a message id
    async fn send_invite(&self, invite: &MeetingInvite) -> Result<String, InviteError>;
}

/// An invite the mock sender accepted
#[derive(Debug, Clone)]
pub struct SentInvite {
    pub message_id: String,
    pub invite: MeetingInvite,
    pub ics: Option<String>,
}

/// In-memory stand-in for the mail transport
#[derive(Debug)]
pub struct MockInviteSender {
    sent: Mutex<VecDeque<SentInvite>>,
    capacity: usize,
}

impl Default for MockInviteSender {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_OUTBOX_CAPACITY)
    }
}

impl MockInviteSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` invites (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Most recent invites, oldest first
    pub fn sent(&self) -> Vec<SentInvite> {
        self.sent
            .lock()
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InviteSender for MockInviteSender {
    async fn send_invite(&self, invite: &MeetingInvite) -> Result<String, InviteError> {
        let uid = Uuid::new_v4();
        let message_id = format!("mock-{}", uid);
        let ics = invite.to_ics(&uid.to_string(), Utc::now());

        if ics.is_none() {
            tracing::warn!(
                start_time = %invite.start_time,
                "Unreadable meeting start, sending invite without calendar attachment"
            );
        }

        tracing::info!(
            message_id = %message_id,
            recipient = %invite.recipient,
            subject = %invite.subject(),
            "Invite sent (mocked)"
        );

        let mut sent = self
            .sent
            .lock()
            .map_err(|_| InviteError::Delivery("outbox lock poisoned".to_string()))?;
        while sent.len() >= self.capacity {
            sent.pop_front();
        }
        sent.push_back(SentInvite {
            message_id: message_id.clone(),
            invite: invite.clone(),
            ics,
        });

        Ok(message_id)
    }
}
