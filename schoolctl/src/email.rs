//! Email service for verification codes, notifications, invoices and enrollment invitations.
//!
//! Every outbound email is rendered from `templates/email/notification.html`: a greeting, a few
//! paragraphs and an optional call-to-action link.

use chrono::NaiveDate;
use lettre::{
    Address, AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use minijinja::{Environment, context};
use rust_decimal::Decimal;
use std::path::Path;

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
};

const NOTIFICATION_TEMPLATE: &str = "notification.html";

pub struct EmailService {
    transport: EmailTransport,
    templates: Environment<'static>,
    from_email: String,
    from_name: String,
    reply_to: Option<String>,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

/// Rendered content of a single email
struct EmailBody<'a> {
    subject: &'a str,
    recipient_name: Option<&'a str>,
    lines: Vec<String>,
    action: Option<(&'a str, &'a str)>,
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        let mut templates = Environment::new();
        templates
            .add_template(NOTIFICATION_TEMPLATE, include_str!("../templates/email/notification.html"))
            .map_err(|e| Error::Internal {
                operation: format!("load email template: {e}"),
            })?;

        Ok(Self {
            transport,
            templates,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            reply_to: email_config.reply_to.clone(),
        })
    }

    /// One-time code for super admin registration
    pub async fn send_verification_code(&self, to_email: &str, to_name: Option<&str>, otp: &str) -> Result<(), Error> {
        let subject = "Your Super Admin Verification Code";
        let body = self.render(EmailBody {
            subject,
            recipient_name: to_name,
            lines: vec![
                format!("Your verification code is: {otp}"),
                "This code is valid for 10 minutes.".to_string(),
            ],
            action: None,
        })?;

        self.send_email(to_email, to_name, subject, &body).await
    }

    /// Mirror of an in-app notification
    pub async fn send_notification(&self, to_email: &str, to_name: Option<&str>, message: &str, link: &str) -> Result<(), Error> {
        let subject = "You have a new notification";
        let body = self.render(EmailBody {
            subject,
            recipient_name: to_name,
            lines: vec![message.to_string()],
            action: Some(("View in dashboard", link)),
        })?;

        self.send_email(to_email, to_name, subject, &body).await
    }

    /// Alert that a conversation has new messages
    pub async fn send_message_alert(&self, to_email: &str, to_name: Option<&str>, sender_name: &str, link: &str) -> Result<(), Error> {
        let subject = "You have a new message";
        let body = self.render(EmailBody {
            subject,
            recipient_name: to_name,
            lines: vec![format!("You have a new message from {sender_name}.")],
            action: Some(("Open messages", link)),
        })?;

        self.send_email(to_email, to_name, subject, &body).await
    }

    /// Tuition invoice notice for a parent
    pub async fn send_invoice(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        student_name: &str,
        total: Decimal,
        due_date: NaiveDate,
        link: &str,
    ) -> Result<(), Error> {
        let subject = format!("New Tuition Invoice for {student_name}");
        let body = self.render(EmailBody {
            subject: &subject,
            recipient_name: to_name,
            lines: vec![invoice_message(student_name, total, due_date)],
            action: Some(("View invoice", link)),
        })?;

        self.send_email(to_email, to_name, &subject, &body).await
    }

    /// Invitation to fill in an enrollment form
    pub async fn send_enrollment_invitation(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        student_first_name: &str,
        link: &str,
    ) -> Result<(), Error> {
        let subject = format!("Complete Your Enrollment for {student_first_name}");
        let body = self.render(EmailBody {
            subject: &subject,
            recipient_name: to_name,
            lines: vec![format!(
                "Please complete the enrollment form for {student_first_name} using the link below."
            )],
            action: Some(("Complete enrollment", link)),
        })?;

        self.send_email(to_email, to_name, &subject, &body).await
    }

    fn render(&self, body: EmailBody<'_>) -> Result<String, Error> {
        let template = self.templates.get_template(NOTIFICATION_TEMPLATE).map_err(|e| Error::Internal {
            operation: format!("get email template: {e}"),
        })?;
        let (action_label, action_url) = body.action.unzip();

        template
            .render(context! {
                subject => body.subject,
                recipient_name => body.recipient_name,
                lines => body.lines,
                action_label => action_label,
                action_url => action_url,
                school_name => self.from_name,
            })
            .map_err(|e| Error::Internal {
                operation: format!("render email: {e}"),
            })
    }

    async fn send_email(&self, to_email: &str, to_name: Option<&str>, subject: &str, body: &str) -> Result<(), Error> {
        let from = mailbox(Some(&self.from_name), &self.from_email).map_err(|e| Error::Internal {
            operation: format!("parse from email: {e}"),
        })?;
        let to = mailbox(to_name, to_email).map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        let mut builder = Message::builder().from(from).to(to).subject(subject).header(ContentType::TEXT_HTML);
        if let Some(reply_to) = &self.reply_to {
            let reply_to = reply_to.parse::<Mailbox>().map_err(|e| Error::Internal {
                operation: format!("parse reply-to email: {e}"),
            })?;
            builder = builder.reply_to(reply_to);
        }

        let message = builder.body(body.to_string()).map_err(|e| Error::Internal {
            operation: format!("build email message: {e}"),
        })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }
}

/// Address with an optional display name; names are quoted as needed, so commas and quotes
/// in user-supplied names are fine
fn mailbox(name: Option<&str>, email: &str) -> Result<Mailbox, lettre::address::AddressError> {
    let address = email.trim().parse::<Address>()?;
    let name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
    Ok(Mailbox::new(name, address))
}

/// Body text of the recurring tuition invoice email
pub fn invoice_message(student_name: &str, total: Decimal, due_date: NaiveDate) -> String {
    format!(
        "A new tuition invoice for {student_name} is ready. The total amount is ${:.2} and is due on {}.",
        total,
        due_date.format("%B %d, %Y")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;

    fn file_config(dir: &Path) -> Config {
        let mut config = create_test_config();
        config.email.transport = EmailTransportConfig::File {
            path: dir.to_string_lossy().to_string(),
        };
        config
    }

    fn sent_emails(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "eml"))
            .map(|entry| std::fs::read_to_string(entry.path()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_email_service_creation() {
        let config = create_test_config();
        assert!(EmailService::new(&config).is_ok());
    }

    #[test]
    fn test_rendered_body_escapes_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();

        let body = service
            .render(EmailBody {
                subject: "You have a new notification",
                recipient_name: Some("Ada"),
                lines: vec!["<b>Alice</b> assigned you a task".to_string()],
                action: Some(("View in dashboard", "https://school.example/admin/messaging")),
            })
            .unwrap();

        assert!(body.contains("Hello Ada,"));
        // The HTML auto-escaper also escapes `/`
        assert!(body.contains("&lt;b&gt;Alice&lt;&#x2f;b&gt;"));
        assert!(!body.contains("<b>Alice"));
        assert!(body.contains("https:&#x2f;&#x2f;school.example&#x2f;admin&#x2f;messaging"));
    }

    #[test]
    fn test_mailbox_accepts_punctuated_names() {
        let mb = mailbox(Some("Smith, Jr."), "parent@family.test").unwrap();
        assert_eq!(mb.email.to_string(), "parent@family.test");
        assert_eq!(mb.name.as_deref(), Some("Smith, Jr."));

        let quoted = mailbox(Some("Pat \"PJ\" Parent"), "pj@family.test").unwrap();
        assert_eq!(quoted.name.as_deref(), Some("Pat \"PJ\" Parent"));

        assert_eq!(mailbox(Some("  "), "x@family.test").unwrap().name, None);
        assert!(mailbox(None, "not-an-address").is_err());
    }

    #[test]
    fn test_rendered_body_without_name_or_action() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();

        let body = service
            .render(EmailBody {
                subject: "Code",
                recipient_name: None,
                lines: vec!["Your verification code is: 012345".to_string()],
                action: None,
            })
            .unwrap();

        assert!(body.contains("Hello,"));
        assert!(body.contains("012345"));
        assert!(!body.contains("copy and paste this link"));
    }

    #[test]
    fn test_invoice_message_formats_amount_and_date() {
        let due = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(
            invoice_message("Sam Student", Decimal::new(125050, 2), due),
            "A new tuition invoice for Sam Student is ready. The total amount is $1250.50 and is due on March 05, 2025."
        );
    }

    #[tokio::test]
    async fn test_verification_code_written_to_file_transport() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();

        service
            .send_verification_code("principal@school.example", Some("Pat Principal"), "424242")
            .await
            .unwrap();

        let emails = sent_emails(dir.path());
        assert_eq!(emails.len(), 1);
        assert!(emails[0].contains("principal@school.example"));
        assert!(emails[0].contains("Your Super Admin Verification Code"));
    }
}
