//! Email service for delivering contact-form submissions.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;
use uuid::Uuid;

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    site_url: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

/// A contact-form submission to forward
#[derive(Debug, Clone)]
pub struct ContactEmail<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub message: &'a str,
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

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            site_url: config.public_url.to_string(),
        })
    }

    /// Forward a submission to `recipient` with `Reply-To` set to the visitor.
    ///
    /// Returns the `Message-ID` of the sent mail, which delivery events refer back to.
    #[tracing::instrument(skip_all, err)]
    pub async fn send_contact_message(&self, recipient: &str, contact: &ContactEmail<'_>) -> Result<String, Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;
        let to = recipient.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse contact recipient: {e}"),
        })?;
        let reply_to = Mailbox::new(
            Some(contact.name.to_string()),
            contact.email.parse().map_err(|e| Error::BadRequest {
                message: format!("Invalid email address: {e}"),
            })?,
        );

        let message_id = self.new_message_id();
        let message = Message::builder()
            .from(from)
            .to(to)
            .reply_to(reply_to)
            .message_id(Some(message_id.clone()))
            .subject(format!("Website enquiry from {}", contact.name))
            .header(ContentType::TEXT_PLAIN)
            .body(self.contact_body(contact))
            .map_err(|e| Error::Internal {
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

        Ok(message_id)
    }

    fn new_message_id(&self) -> String {
        let domain = self.from_email.rsplit_once('@').map(|(_, d)| d).unwrap_or("localhost");
        format!("<{}@{}>", Uuid::new_v4(), domain)
    }

    fn contact_body(&self, contact: &ContactEmail<'_>) -> String {
        let phone = contact.phone.map(|p| format!("Phone: {p}\n")).unwrap_or_default();
        format!(
            "New enquiry from the website contact form.\n\n\
             Name: {}\n\
             Email: {}\n\
             {phone}\n\
             {}\n\n\
             --\n\
             Reply to this email to answer {} directly.\n\
             Sent from {}\n",
            contact.name, contact.email, contact.message, contact.name, self.site_url
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;

    fn contact() -> ContactEmail<'static> {
        ContactEmail {
            name: "Sam Carter",
            email: "sam@example.com",
            phone: Some("07700 900123"),
            message: "Could you build fitted alcove shelving?",
        }
    }

    #[test]
    fn test_contact_body() {
        let config = create_test_config();
        let service = EmailService::new(&config).unwrap();

        let body = service.contact_body(&contact());
        assert!(body.contains("Name: Sam Carter"));
        assert!(body.contains("Phone: 07700 900123"));
        assert!(body.contains("fitted alcove shelving"));

        let without_phone = service.contact_body(&ContactEmail { phone: None, ..contact() });
        assert!(!without_phone.contains("Phone:"));
    }

    #[tokio::test]
    async fn test_send_writes_file_with_reply_to() {
        let config = create_test_config();
        let service = EmailService::new(&config).unwrap();

        let message_id = service.send_contact_message("owner@example.com", &contact()).await.unwrap();
        assert!(message_id.starts_with('<') && message_id.ends_with("@joinery.test>"));

        let EmailTransportConfig::File { path } = &config.email.transport else {
            panic!("test config uses the file transport");
        };
        let written: Vec<_> = std::fs::read_dir(path)
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        let email = written.iter().find(|e| e.contains(&message_id)).expect("email written");
        let reply_to = email.lines().find(|l| l.starts_with("Reply-To:")).expect("Reply-To header");
        assert!(reply_to.contains("<sam@example.com>"));
        assert!(email.lines().any(|l| l.starts_with("To:") && l.contains("owner@example.com")));
        assert!(email.contains("Subject: Website enquiry from Sam Carter"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_internal_error() {
        let config = create_test_config();
        let service = EmailService::new(&config).unwrap();

        let err = service.send_contact_message("not an address", &contact()).await.unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }
}
