//! In-app notifications for staff, mirrored by email.
//!
//! Notifications are inserted inside the caller's transaction. The matching emails are
//! returned as [`PendingEmails`] and only dispatched once that transaction has committed, so a
//! rolled-back request never emails anyone.

use sqlx::PgConnection;

use crate::AppState;
use crate::db::{
    errors::Result,
    handlers::{Notifications, Staff},
    models::{notifications::NotificationCreateDBRequest, staff::StaffContact},
};
use crate::types::{ConversationId, LeadId, TaskId};

/// Link every conversation notification points to
pub const MESSAGING_LINK: &str = "/admin/messaging";

/// Link to a lead's page in the admissions dashboard
pub fn lead_link(secure_token: &str) -> String {
    format!("/admin/admissions/leads/{secure_token}")
}

/// What a notification is about; decides `target_type`, `target_id` and `target_link`
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationTarget {
    Lead { id: LeadId, secure_token: String },
    /// Tasks link to the lead they belong to
    Task { id: TaskId, lead_secure_token: String },
    Conversation { id: ConversationId },
}

impl NotificationTarget {
    pub fn target_type(&self) -> &'static str {
        match self {
            NotificationTarget::Lead { .. } => "Lead",
            NotificationTarget::Task { .. } => "Task",
            NotificationTarget::Conversation { .. } => "Conversation",
        }
    }

    pub fn target_id(&self) -> i64 {
        match self {
            NotificationTarget::Lead { id, .. } | NotificationTarget::Task { id, .. } | NotificationTarget::Conversation { id } => *id,
        }
    }

    pub fn link(&self) -> String {
        match self {
            NotificationTarget::Lead { secure_token, .. } => lead_link(secure_token),
            NotificationTarget::Task { lead_secure_token, .. } => lead_link(lead_secure_token),
            NotificationTarget::Conversation { .. } => MESSAGING_LINK.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEmail {
    pub to_email: String,
    pub to_name: String,
    pub message: String,
    /// Path within the frontend
    pub link: String,
}

/// Emails owed for notifications created in a not-yet-committed transaction
#[derive(Debug, Default)]
#[must_use = "pending emails are only sent by calling dispatch after commit"]
pub struct PendingEmails(Vec<NotificationEmail>);

impl PendingEmails {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Send every email on its own task. Failures are logged and never reach the caller.
    pub fn dispatch(self, state: &AppState) {
        for email in self.0 {
            let service = state.email.clone();
            let link = state.config.frontend_link(&email.link);
            tokio::spawn(async move {
                if let Err(e) = service
                    .send_notification(&email.to_email, Some(&email.to_name), &email.message, &link)
                    .await
                {
                    tracing::warn!(to = %email.to_email, "Failed to send notification email: {}", e);
                }
            });
        }
    }
}

/// Notify each recipient once. Returns the emails to send after commit.
#[tracing::instrument(skip(conn, recipients, message), fields(recipients = recipients.len(), target = target.target_type()), err)]
pub async fn notify_staff(
    conn: &mut PgConnection,
    recipients: &[StaffContact],
    message: &str,
    target: &NotificationTarget,
) -> Result<PendingEmails> {
    let mut seen = std::collections::HashSet::new();
    let mut emails = Vec::new();
    let link = target.link();

    let mut repo = Notifications::new(conn);
    for recipient in recipients.iter().filter(|r| seen.insert(r.id)) {
        repo.create(&NotificationCreateDBRequest {
            staff_id: recipient.id,
            message: message.to_string(),
            target_type: Some(target.target_type().to_string()),
            target_id: Some(target.target_id()),
            target_link: Some(link.clone()),
        })
        .await?;
        emails.push(NotificationEmail {
            to_email: recipient.email.clone(),
            to_name: recipient.name.clone(),
            message: message.to_string(),
            link: link.clone(),
        });
    }

    Ok(PendingEmails(emails))
}

/// Notify every staff member of the named department
pub async fn notify_department(
    conn: &mut PgConnection,
    department_name: &str,
    message: &str,
    target: &NotificationTarget,
) -> Result<PendingEmails> {
    let recipients = Staff::new(&mut *conn).contacts_in_department_named(department_name).await?;
    if recipients.is_empty() {
        tracing::debug!(department = department_name, "No staff to notify");
    }
    notify_staff(conn, &recipients, message, target).await
}
