//! Intent routing.
//!
//! One exhaustive match over [`ParsedIntent`]; each arm performs at most one
//! side effect and produces a success envelope.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::adapters::{InviteSender, MeetingInvite};
use crate::domain::{
    Command, NoteRecord, ParsedIntent, Priority, ResponseEnvelope, ResponseKind, TaskRecord,
    UNKNOWN_DESTINATION,
};
use crate::error::IntakeError;
use crate::store::{with_timeout, RecordStore};

/// Transit directions deep link; `{destination}` is form-encoded
const MAPS_TRANSIT_URL: &str =
    "https://www.google.com/maps/dir/?api=1&destination={destination}&travelmode=transit";

/// Transit directions link for a destination
pub fn transit_deeplink(destination: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(destination.as_bytes()).collect();
    MAPS_TRANSIT_URL.replace("{destination}", &encoded)
}

/// Serialize a record for the envelope `data` field
pub(crate) fn to_data<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Maps a classified intent to its handler
pub struct IntentRouter {
    store: Arc<dyn RecordStore>,
    invites: Arc<dyn InviteSender>,
    sender_email: String,
    store_timeout: Duration,
}

impl IntentRouter {
    pub fn new(
        store: Arc<dyn RecordStore>,
        invites: Arc<dyn InviteSender>,
        sender_email: impl Into<String>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            invites,
            sender_email: sender_email.into(),
            store_timeout,
        }
    }

    /// Run the handler for `intent`
    #[instrument(skip_all, fields(intent = intent.label()))]
    pub async fn route(
        &self,
        intent: ParsedIntent,
        command: &Command,
    ) -> Result<ResponseEnvelope, IntakeError> {
        info!("Dispatching intent");

        let envelope = match &intent {
            ParsedIntent::Meeting {
                title,
                start_time,
                duration_minutes,
            } => {
                self.handle_meeting(title, start_time, *duration_minutes, command)
                    .await?
            }
            ParsedIntent::Task { title, priority } => self.handle_task(title, priority).await?,
            ParsedIntent::Note { title } => self.handle_note(title).await?,
            ParsedIntent::Transport { destination } => handle_transport(destination),
        };

        Ok(envelope.with_intent(intent))
    }

    async fn handle_meeting(
        &self,
        title: &str,
        start_time: &str,
        duration_minutes: u32,
        command: &Command,
    ) -> Result<ResponseEnvelope, IntakeError> {
        let recipient = command
            .reply_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .ok_or(IntakeError::RecipientNotConfigured)?;

        let invite = MeetingInvite {
            recipient: recipient.to_string(),
            sender: self.sender_email.clone(),
            title: title.to_string(),
            start_time: start_time.to_string(),
            duration_minutes,
            timezone: command.timezone.clone(),
        };

        let message_id = self.invites.send_invite(&invite).await?;

        Ok(ResponseEnvelope::ok(ResponseKind::Meeting, "Invite sent (MOCKED)")
            .with_data(json!({ "messageId": message_id })))
    }

    async fn handle_task(
        &self,
        title: &str,
        priority: &Priority,
    ) -> Result<ResponseEnvelope, IntakeError> {
        let record = TaskRecord::new(title, priority.clone());
        with_timeout(self.store_timeout, self.store.save_task(&record)).await?;

        info!(id = %record.id, priority = %record.priority, "Task saved");
        Ok(ResponseEnvelope::ok(ResponseKind::Todo, "Task saved").with_data(to_data(&record)))
    }

    async fn handle_note(&self, title: &str) -> Result<ResponseEnvelope, IntakeError> {
        let record = NoteRecord::new(title);
        with_timeout(self.store_timeout, self.store.save_note(&record)).await?;

        info!(id = %record.id, "Note saved");
        Ok(ResponseEnvelope::ok(ResponseKind::Note, "Note saved").with_data(to_data(&record)))
    }
}

fn handle_transport(destination: &str) -> ResponseEnvelope {
    let destination = match destination.trim() {
        "" => UNKNOWN_DESTINATION,
        trimmed => trimmed,
    };
    let deeplink = transit_deeplink(destination);

    ResponseEnvelope::ok(ResponseKind::Transport, "Directions ready").with_data(json!({
        "destination": destination,
        "deeplink": deeplink,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockInviteSender;
    use crate::domain::RecordKind;
    use crate::store::MemoryStore;

    fn router(store: Arc<MemoryStore>, invites: Arc<MockInviteSender>) -> IntentRouter {
        IntentRouter::new(store, invites, "noreply@example.com", Duration::from_secs(1))
    }

    #[test]
    fn test_deeplink_is_form_encoded() {
        let link = transit_deeplink("Helsinki-Vantaa Airport");
        assert_eq!(
            link,
            "https://www.google.com/maps/dir/?api=1&destination=Helsinki-Vantaa+Airport&travelmode=transit"
        );
        assert!(transit_deeplink("Café & Bar").contains("destination=Caf%C3%A9+%26+Bar&"));
    }

    #[test]
    fn test_blank_destination_is_unknown() {
        let envelope = handle_transport("  ");
        let data = envelope.data.unwrap();
        assert_eq!(data["destination"], "Unknown");
        assert!(data["deeplink"]
            .as_str()
            .unwrap()
            .contains("destination=Unknown&"));
    }

    #[tokio::test]
    async fn test_meeting_without_recipient_fails() {
        let invites = Arc::new(MockInviteSender::new());
        let router = router(Arc::new(MemoryStore::new()), invites.clone());
        let intent = ParsedIntent::Meeting {
            title: "Standup".to_string(),
            start_time: "2024-05-02T09:00:00".to_string(),
            duration_minutes: 15,
        };

        let err = router
            .route(intent, &Command::text("standup tomorrow"))
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::RecipientNotConfigured));
        assert_eq!(err.status_code(), 500);
        assert!(invites.sent().is_empty());
    }

    #[tokio::test]
    async fn test_meeting_sends_invite() {
        let invites = Arc::new(MockInviteSender::new());
        let router = router(Arc::new(MemoryStore::new()), invites.clone());
        let command = Command::text("standup tomorrow")
            .with_timezone("Europe/Helsinki")
            .with_reply_email(Some("me@example.com".to_string()));
        let intent = ParsedIntent::Meeting {
            title: "Standup".to_string(),
            start_time: "2024-05-02T09:00:00".to_string(),
            duration_minutes: 15,
        };

        let envelope = router.route(intent, &command).await.unwrap();

        assert_eq!(envelope.kind, ResponseKind::Meeting);
        assert_eq!(envelope.message, "Invite sent (MOCKED)");
        let sent = invites.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].invite.recipient, "me@example.com");
        assert_eq!(sent[0].invite.timezone, "Europe/Helsinki");
        assert_eq!(
            envelope.data.unwrap()["messageId"],
            sent[0].message_id.as_str()
        );
    }

    #[tokio::test]
    async fn test_note_is_persisted() {
        let store = Arc::new(MemoryStore::new());
        let router = router(store.clone(), Arc::new(MockInviteSender::new()));

        let envelope = router
            .route(
                ParsedIntent::Note {
                    title: "Sauna is 80 degrees".to_string(),
                },
                &Command::text("note: sauna is 80 degrees"),
            )
            .await
            .unwrap();

        assert_eq!(envelope.kind, ResponseKind::Note);
        let stored = store.list(RecordKind::Note).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(envelope.data.unwrap()["id"], stored[0].id());
    }
}
