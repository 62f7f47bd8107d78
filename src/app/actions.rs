use std::fmt;

use thiserror::Error;

use crate::api::{mutation_route, Ack, ActionKind, ApiClient, ApiError};
use crate::model::{Record, RecordId, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordAction {
    pub section: Section,
    pub kind: ActionKind,
}

impl RecordAction {
    pub fn new(section: Section, kind: ActionKind) -> Self {
        Self { section, kind }
    }

    pub fn is_supported(&self) -> bool {
        mutation_route(self.section, self.kind).is_some()
    }

    /// Destructive actions ask for confirmation in the dashboard.
    pub fn is_destructive(&self) -> bool {
        matches!(self.kind, ActionKind::Reject | ActionKind::Delete)
    }

    pub fn success_text(&self) -> String {
        match (self.section, self.kind) {
            (Section::Appointments, ActionKind::Delete) => {
                "Appointment deleted successfully!".into()
            }
            (Section::Admins, ActionKind::Delete) => "Admin deleted successfully!".into(),
            (Section::Contractors, ActionKind::Accept) => {
                "Contractor verified successfully".into()
            }
            (section, kind) => format!("{} {} successfully", section.noun(), past_tense(kind)),
        }
    }

    pub fn failure_text(&self) -> String {
        match (self.section, self.kind) {
            (Section::Appointments, ActionKind::Delete) => {
                "Failed to delete the appointment".into()
            }
            (Section::Properties, ActionKind::Accept) => {
                "Accepting property failed, please try later".into()
            }
            (Section::Properties, ActionKind::Reject) => {
                "Rejecting property failed, please try later".into()
            }
            (Section::Contractors, ActionKind::Accept) => "Failed to verify contractor".into(),
            (section, kind) => format!("Failed to {kind} {}", section.noun().to_lowercase()),
        }
    }
}

impl fmt::Display for RecordAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.section)
    }
}

fn past_tense(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Accept => "accepted",
        ActionKind::Reject => "rejected",
        ActionKind::Delete => "deleted",
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("{section} does not support {kind}")]
    Unsupported { section: Section, kind: ActionKind },
    #[error("an action on {id} is already in progress")]
    Busy { id: RecordId },
    #[error("no record selected")]
    NoSelection,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub text: String,
}

impl Notification {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

/// Confirmed review transition of a pending record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub section: Section,
    pub id: RecordId,
    pub label: Option<String>,
    pub from: ReviewStatus,
    pub to: ReviewStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<R> {
    Applied {
        removed: Option<R>,
        decision: Option<Decision>,
        notification: Notification,
    },
    Failed {
        error: ActionError,
        notification: Notification,
    },
}

impl<R> MutationOutcome<R> {
    pub fn notification(&self) -> &Notification {
        match self {
            MutationOutcome::Applied { notification, .. }
            | MutationOutcome::Failed { notification, .. } => notification,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied { .. })
    }

    pub fn decision(&self) -> Option<&Decision> {
        match self {
            MutationOutcome::Applied { decision, .. } => decision.as_ref(),
            MutationOutcome::Failed { .. } => None,
        }
    }
}

/// Text shown when an action fails: the server's message when it sent one.
pub fn failure_notification(action: RecordAction, error: &ActionError) -> Notification {
    let text = match error {
        ActionError::Api(api) => match api.server_message() {
            Some(message) => message.to_string(),
            None if *api == ApiError::Auth => "No authorization token found".to_string(),
            None => action.failure_text(),
        },
        ActionError::Unsupported { .. } | ActionError::Busy { .. } | ActionError::NoSelection => {
            error.to_string()
        }
    };
    Notification::error(text)
}

/// Applies a settled remote call to the local collection. Nothing is removed
/// unless the call succeeded.
pub fn apply_confirmation<R: Record>(
    action: RecordAction,
    result: Result<Ack, ActionError>,
    collection: &mut Vec<R>,
    id: &RecordId,
) -> MutationOutcome<R> {
    match result {
        Ok(_) => {
            let removed = collection
                .iter()
                .position(|record| record.id() == id)
                .map(|index| collection.remove(index));
            let to = match action.kind {
                ActionKind::Accept => Some(ReviewStatus::Approved),
                ActionKind::Reject => Some(ReviewStatus::Rejected),
                ActionKind::Delete => None,
            };
            let decision = to.map(|to| Decision {
                section: action.section,
                id: id.clone(),
                label: removed.as_ref().map(|record| record.label()),
                from: ReviewStatus::Pending,
                to,
            });
            tracing::info!(
                action = %action,
                %id,
                removed = removed.is_some(),
                "action confirmed by server"
            );
            MutationOutcome::Applied {
                removed,
                decision,
                notification: Notification::success(action.success_text()),
            }
        }
        Err(error) => {
            tracing::warn!(action = %action, %id, %error, "action failed; collection unchanged");
            let notification = failure_notification(action, &error);
            MutationOutcome::Failed {
                error,
                notification,
            }
        }
    }
}

pub struct ActionDispatcher<'a> {
    api: &'a ApiClient,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Sends the action and waits for the server's verdict.
    pub async fn confirm(&self, action: RecordAction, id: &RecordId) -> Result<Ack, ActionError> {
        let route = mutation_route(action.section, action.kind).ok_or(
            ActionError::Unsupported {
                section: action.section,
                kind: action.kind,
            },
        )?;
        Ok(self.api.mutate(&route, id).await?)
    }

    pub async fn perform<R: Record>(
        &self,
        kind: ActionKind,
        collection: &mut Vec<R>,
        id: &RecordId,
    ) -> MutationOutcome<R> {
        let action = RecordAction::new(R::SECTION, kind);
        let result = self.confirm(action, id).await;
        apply_confirmation(action, result, collection, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedTransport;
    use crate::model::{Appointment, Contractor, PropertyListing};
    use assert_matches::assert_matches;

    fn property(id: &str) -> PropertyListing {
        PropertyListing {
            id: RecordId::new(id),
            title: format!("Listing {id}"),
            property_type: None,
            location: "Nashik".into(),
            price: Some(4_500_000.0),
            owner_name: None,
            owner_contact: None,
            description: None,
            images: Vec::new(),
            created_at: None,
        }
    }

    fn appointment(id: &str) -> Appointment {
        Appointment {
            id: RecordId::new(id),
            name: "Meera".into(),
            email: "meera@example.com".into(),
            phone: "12345".into(),
            date: None,
            time: None,
            message: None,
            created_at: None,
        }
    }

    fn ids(records: &[PropertyListing]) -> Vec<&str> {
        records.iter().map(|record| record.id.as_str()).collect()
    }

    #[tokio::test]
    async fn confirmed_accept_removes_exactly_one_record() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"success":true}"#);
        let api = ApiClient::new(transport.clone());
        let dispatcher = ActionDispatcher::new(&api);
        let mut collection = vec![property("p1"), property("p2"), property("p3")];
        let untouched = collection[2].clone();

        let outcome = dispatcher
            .perform(ActionKind::Accept, &mut collection, &RecordId::new("p2"))
            .await;

        assert_eq!(ids(&collection), vec!["p1", "p3"]);
        assert_eq!(collection[1], untouched);
        assert_eq!(outcome.notification().text, "Property accepted successfully");
        let decision = outcome.decision().expect("decision");
        assert_eq!(decision.to, ReviewStatus::Approved);
        assert_eq!(decision.label.as_deref(), Some("Listing p2 (Nashik)"));
    }

    #[tokio::test]
    async fn success_flag_false_keeps_collection_and_surfaces_message() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"success":false,"message":"locked"}"#);
        let api = ApiClient::new(transport.clone());
        let dispatcher = ActionDispatcher::new(&api);
        let mut collection = vec![property("p1"), property("p2")];
        let before = collection.clone();

        let outcome = dispatcher
            .perform(ActionKind::Reject, &mut collection, &RecordId::new("p1"))
            .await;

        assert_eq!(collection, before);
        assert!(!outcome.is_applied());
        assert!(outcome.notification().is_error());
        assert_eq!(outcome.notification().text, "locked");
    }

    #[tokio::test]
    async fn http_error_without_message_uses_fallback_text() {
        let transport = ScriptedTransport::new();
        transport.reply(500, "");
        let api = ApiClient::new(transport.clone());
        let dispatcher = ActionDispatcher::new(&api);
        let mut collection = vec![property("p1")];

        let outcome = dispatcher
            .perform(ActionKind::Accept, &mut collection, &RecordId::new("p1"))
            .await;

        assert_eq!(collection.len(), 1);
        assert_eq!(
            outcome.notification().text,
            "Accepting property failed, please try later"
        );
    }

    #[tokio::test]
    async fn success_for_absent_identifier_is_a_no_op() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"success":true}"#);
        let api = ApiClient::new(transport.clone());
        let dispatcher = ActionDispatcher::new(&api);
        let mut collection = vec![property("p1"), property("p2")];
        let before = collection.clone();

        let outcome = dispatcher
            .perform(ActionKind::Accept, &mut collection, &RecordId::new("Z"))
            .await;

        assert_eq!(collection, before);
        assert_matches!(outcome, MutationOutcome::Applied { removed: None, .. });
        assert!(!outcome.notification().is_error());
    }

    #[tokio::test]
    async fn protected_delete_without_token_fails_before_the_call() {
        let transport = ScriptedTransport::new();
        let api = ApiClient::new(transport.clone());
        let dispatcher = ActionDispatcher::new(&api);
        let mut collection = vec![appointment("a1")];

        let outcome = dispatcher
            .perform(ActionKind::Delete, &mut collection, &RecordId::new("a1"))
            .await;

        assert!(transport.requests().is_empty());
        assert_eq!(collection.len(), 1);
        assert_matches!(
            outcome,
            MutationOutcome::Failed { error: ActionError::Api(ApiError::Auth), .. }
        );
    }

    #[tokio::test]
    async fn contractor_rejection_sends_bearer_delete() {
        let transport = ScriptedTransport::new();
        transport.reply(200, r#"{"success":true,"message":"removed"}"#);
        let api = ApiClient::new(transport.clone()).with_token(Some("tok".into()));
        let dispatcher = ActionDispatcher::new(&api);
        let mut collection: Vec<Contractor> = Vec::new();

        let outcome = dispatcher
            .perform(ActionKind::Reject, &mut collection, &RecordId::new("c7"))
            .await;

        assert!(outcome.is_applied());
        assert_eq!(outcome.notification().text, "Contractor rejected successfully");
        let request = &transport.requests()[0];
        assert_eq!(request.path(), "/api/contractor/c7");
        assert_eq!(request.bearer.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn unsupported_action_never_reaches_transport() {
        let transport = ScriptedTransport::new();
        let api = ApiClient::new(transport.clone());
        let dispatcher = ActionDispatcher::new(&api);
        let mut collection = vec![appointment("a1")];

        let outcome = dispatcher
            .perform(ActionKind::Accept, &mut collection, &RecordId::new("a1"))
            .await;

        assert!(transport.requests().is_empty());
        assert_matches!(
            outcome,
            MutationOutcome::Failed { error: ActionError::Unsupported { .. }, .. }
        );
    }

    #[test]
    fn network_failure_leaves_collection_and_uses_fallback() {
        let action = RecordAction::new(Section::Properties, ActionKind::Reject);
        let mut collection = vec![property("p1")];
        let outcome = apply_confirmation(
            action,
            Err(ActionError::Api(ApiError::Network("connection refused".into()))),
            &mut collection,
            &RecordId::new("p1"),
        );
        assert_eq!(collection.len(), 1);
        assert_eq!(
            outcome.notification().text,
            "Rejecting property failed, please try later"
        );
    }

    #[test]
    fn repeated_confirmation_is_idempotent() {
        let action = RecordAction::new(Section::Properties, ActionKind::Accept);
        let mut collection = vec![property("p1"), property("p2")];
        let id = RecordId::new("p1");
        apply_confirmation(action, Ok(Ack::default()), &mut collection, &id);
        apply_confirmation(action, Ok(Ack::default()), &mut collection, &id);
        assert_eq!(ids(&collection), vec!["p2"]);
    }

    #[test]
    fn notification_texts_follow_section_and_kind() {
        let delete_admin = RecordAction::new(Section::Admins, ActionKind::Delete);
        assert_eq!(delete_admin.success_text(), "Admin deleted successfully!");
        assert_eq!(delete_admin.failure_text(), "Failed to delete admin");

        let delete_enquiry = RecordAction::new(Section::Enquiries, ActionKind::Delete);
        assert_eq!(delete_enquiry.success_text(), "Enquiry deleted successfully");
        assert_eq!(delete_enquiry.failure_text(), "Failed to delete enquiry");

        let reject_contractor = RecordAction::new(Section::Contractors, ActionKind::Reject);
        assert_eq!(reject_contractor.failure_text(), "Failed to reject contractor");
        assert!(reject_contractor.is_destructive());
        assert!(!RecordAction::new(Section::Reviews, ActionKind::Delete).is_supported());
    }
}
